//! The core: the circular instruction memory all warriors share.

use serde::{Deserialize, Serialize};

use crate::point::Point;
use crate::redcode::Instruction;

/// A dense `width × height` array of instructions, addressed by
/// [`Point`] with wraparound in both directions.
///
/// Every access normalises its coordinates first, so out-of-bounds is
/// definitionally impossible and negative coordinates are fine. Cells
/// start out as `DAT.F $0, $0`, the canonical dead cell.
#[derive(Clone, Serialize, Deserialize)]
pub struct Core {
    width: i32,
    height: i32,
    cells: Vec<Instruction>,
}

impl Core {
    /// Create a zeroed core.
    ///
    /// # Panics
    /// Panics if either extent is not positive; [`RoundConfig::validate`]
    /// guards this for engine-built cores.
    ///
    /// [`RoundConfig::validate`]: crate::mars::RoundConfig::validate
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "core extents must be positive ({width}x{height})");
        Self {
            width,
            height,
            cells: vec![Instruction::default(); (width * height) as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Number of cells.
    #[inline]
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Canonicalise a point against this core's extents.
    #[inline]
    pub fn normalize(&self, point: Point) -> Point {
        point.normalize(self.width, self.height)
    }

    /// Flattened index of a (normalised) point: `y * width + x`.
    #[inline]
    pub fn index_of(&self, point: Point) -> usize {
        let point = self.normalize(point);
        (point.y * self.width + point.x) as usize
    }

    /// Inverse of [`Core::index_of`] for in-range indices.
    #[inline]
    pub fn point_at(&self, index: usize) -> Point {
        let index = index as i32;
        Point::new(index % self.width, index / self.width)
    }

    #[inline]
    pub fn read(&self, point: Point) -> Instruction {
        self.cells[self.index_of(point)]
    }

    #[inline]
    pub fn write(&mut self, point: Point, instruction: Instruction) {
        let index = self.index_of(point);
        self.cells[index] = instruction;
    }

    /// The whole core, for observers. Row-major, y then x.
    pub fn snapshot(&self) -> &[Instruction] {
        &self.cells
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Listing 8000 DATs helps nobody; show occupancy instead.
        let live = self
            .cells
            .iter()
            .filter(|cell| **cell != Instruction::default())
            .count();
        f.debug_struct("Core")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("live_cells", &live)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redcode::{Modifier, Opcode, Operand, Stepping};

    fn imp() -> Instruction {
        Instruction::new(
            Opcode::Mov,
            Modifier::I,
            Stepping::D,
            Operand::direct(0),
            Operand::direct(1),
        )
    }

    #[test]
    fn test_starts_dead() {
        let core = Core::new(8, 4);
        assert_eq!(core.size(), 32);
        for index in 0..core.size() {
            assert_eq!(core.read(core.point_at(index)), Instruction::default());
        }
    }

    #[test]
    fn test_read_write_roundtrip() {
        let mut core = Core::new(8000, 1);
        core.write(Point::new(42, 0), imp());
        assert_eq!(core.read(Point::new(42, 0)), imp());
    }

    #[test]
    fn test_wrapping_access() {
        let mut core = Core::new(8000, 1);
        core.write(Point::new(-1, 0), imp());
        assert_eq!(core.read(Point::new(7999, 0)), imp());
        // y is pinned in a 1D core.
        assert_eq!(core.read(Point::new(7999, 3)), imp());
    }

    #[test]
    fn test_index_mapping() {
        let core = Core::new(10, 10);
        assert_eq!(core.index_of(Point::new(3, 4)), 43);
        assert_eq!(core.index_of(Point::new(-1, 0)), 9);
        assert_eq!(core.index_of(Point::new(0, -1)), 90);
        assert_eq!(core.point_at(43), Point::new(3, 4));
    }

    #[test]
    fn test_snapshot_is_row_major() {
        let mut core = Core::new(8, 4);
        core.write(Point::new(3, 2), imp());
        assert_eq!(core.snapshot()[2 * 8 + 3], imp());
    }
}
