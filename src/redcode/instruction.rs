//! The Redcode instruction model.
//!
//! An instruction is an opcode, a field modifier, a stepping direction
//! and two operands (addressing mode + value). This is both what the
//! parser produces and what every core cell stores.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::point::Point;

/// Redcode opcode, ICWS-88 subset.
///
/// `CMP` and `SEQ` execute identically (skip if equal) but are kept as
/// distinct opcodes: the ICWS-88 conversion table assigns them different
/// default modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Dat,
    Mov,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Jmp,
    Jmz,
    Jmn,
    Djn,
    Spl,
    Slt,
    Cmp,
    Seq,
    Sne,
    Nop,
}

impl Opcode {
    /// All opcodes, in ICWS order.
    pub const ALL: [Opcode; 17] = [
        Opcode::Dat,
        Opcode::Mov,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::Jmp,
        Opcode::Jmz,
        Opcode::Jmn,
        Opcode::Djn,
        Opcode::Spl,
        Opcode::Slt,
        Opcode::Cmp,
        Opcode::Seq,
        Opcode::Sne,
        Opcode::Nop,
    ];

    /// Look up an opcode from its (case-insensitive) mnemonic.
    pub fn from_mnemonic(token: &str) -> Option<Opcode> {
        let mnemonic = token.to_ascii_uppercase();
        Opcode::ALL.iter().copied().find(|op| op.mnemonic() == mnemonic)
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Dat => "DAT",
            Opcode::Mov => "MOV",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Jmp => "JMP",
            Opcode::Jmz => "JMZ",
            Opcode::Jmn => "JMN",
            Opcode::Djn => "DJN",
            Opcode::Spl => "SPL",
            Opcode::Slt => "SLT",
            Opcode::Cmp => "CMP",
            Opcode::Seq => "SEQ",
            Opcode::Sne => "SNE",
            Opcode::Nop => "NOP",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Field modifier: which A/B fields of source and destination take part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    /// S.A → D.A
    A,
    /// S.B → D.B
    B,
    /// S.A → D.B
    Ab,
    /// S.B → D.A
    Ba,
    /// Paired: S.A → D.A and S.B → D.B
    F,
    /// Crossed: S.A → D.B and S.B → D.A
    X,
    /// The entire instruction (MOV/CMP/SEQ/SNE; arithmetic treats it as F)
    I,
}

impl Modifier {
    pub fn from_token(token: &str) -> Option<Modifier> {
        match token.to_ascii_uppercase().as_str() {
            "A" => Some(Modifier::A),
            "B" => Some(Modifier::B),
            "AB" => Some(Modifier::Ab),
            "BA" => Some(Modifier::Ba),
            "F" => Some(Modifier::F),
            "X" => Some(Modifier::X),
            "I" => Some(Modifier::I),
            _ => None,
        }
    }

    pub const fn token(self) -> &'static str {
        match self {
            Modifier::A => "A",
            Modifier::B => "B",
            Modifier::Ab => "AB",
            Modifier::Ba => "BA",
            Modifier::F => "F",
            Modifier::X => "X",
            Modifier::I => "I",
        }
    }

    /// The ICWS-88 to ICWS-94 conversion table: the modifier an
    /// instruction gets when the source spells none.
    pub fn default_for(opcode: Opcode, a_mode: AddressMode, b_mode: AddressMode) -> Modifier {
        let a_immediate = a_mode == AddressMode::Immediate;
        let b_immediate = b_mode == AddressMode::Immediate;

        match opcode {
            Opcode::Dat | Opcode::Nop => Modifier::F,
            Opcode::Mov | Opcode::Cmp => match (a_immediate, b_immediate) {
                (true, _) => Modifier::Ab,
                (false, true) => Modifier::B,
                (false, false) => Modifier::I,
            },
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                match (a_immediate, b_immediate) {
                    (true, _) => Modifier::Ab,
                    (false, true) => Modifier::B,
                    (false, false) => Modifier::F,
                }
            }
            Opcode::Slt | Opcode::Seq | Opcode::Sne => {
                if a_immediate {
                    Modifier::Ab
                } else {
                    Modifier::B
                }
            }
            Opcode::Jmp | Opcode::Jmz | Opcode::Jmn | Opcode::Djn | Opcode::Spl => Modifier::B,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Stepping direction: where the "normal" successor PC lies in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Stepping {
    /// Forward, +(1, 0). The classical 1D default.
    #[default]
    D,
    /// Down, +(0, 1).
    S,
    /// Backward, +(−1, 0).
    Q,
    /// Up, +(0, −1).
    W,
}

impl Stepping {
    pub fn from_token(token: &str) -> Option<Stepping> {
        match token.to_ascii_uppercase().as_str() {
            "D" => Some(Stepping::D),
            "S" => Some(Stepping::S),
            "Q" => Some(Stepping::Q),
            "W" => Some(Stepping::W),
            _ => None,
        }
    }

    pub const fn token(self) -> &'static str {
        match self {
            Stepping::D => "D",
            Stepping::S => "S",
            Stepping::Q => "Q",
            Stepping::W => "W",
        }
    }

    /// The unit step vector for this direction.
    pub const fn vector(self) -> Point {
        match self {
            Stepping::D => Point::new(1, 0),
            Stepping::S => Point::new(0, 1),
            Stepping::Q => Point::new(-1, 0),
            Stepping::W => Point::new(0, -1),
        }
    }
}

impl fmt::Display for Stepping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Operand addressing mode. Indirection always goes through the B-field
/// of the pointed-at instruction (ICWS-88 subset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AddressMode {
    /// `#` — the operand value itself is the datum.
    Immediate,
    /// `$` — PC-relative address.
    #[default]
    Direct,
    /// `@` — indirect via the B-field at the PC-relative address.
    Indirect,
    /// `<` — decrement that B-field, then use it as with `@`.
    PreDecrement,
    /// `>` — as `@`, then increment the B-field afterwards.
    PostIncrement,
}

impl AddressMode {
    pub const fn from_sigil(sigil: char) -> Option<AddressMode> {
        match sigil {
            '#' => Some(AddressMode::Immediate),
            '$' => Some(AddressMode::Direct),
            '@' => Some(AddressMode::Indirect),
            '<' => Some(AddressMode::PreDecrement),
            '>' => Some(AddressMode::PostIncrement),
            _ => None,
        }
    }

    pub const fn sigil(self) -> char {
        match self {
            AddressMode::Immediate => '#',
            AddressMode::Direct => '$',
            AddressMode::Indirect => '@',
            AddressMode::PreDecrement => '<',
            AddressMode::PostIncrement => '>',
        }
    }
}

/// One operand: an addressing mode and a (possibly 2D) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Operand {
    pub mode: AddressMode,
    pub value: Point,
}

impl Operand {
    pub const fn new(mode: AddressMode, value: Point) -> Self {
        Self { mode, value }
    }

    /// `$value` — the most common operand.
    pub const fn direct(value: i32) -> Self {
        Self::new(AddressMode::Direct, Point::new(value, 0))
    }

    /// `#value`.
    pub const fn immediate(value: i32) -> Self {
        Self::new(AddressMode::Immediate, Point::new(value, 0))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.mode.sigil(), self.value)
    }
}

/// A complete Redcode instruction.
///
/// The `Default` value is `DAT.F $0, $0`, the canonical dead cell the
/// core is initialised with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub modifier: Modifier,
    pub stepping: Stepping,
    pub a: Operand,
    pub b: Operand,
}

impl Instruction {
    pub const fn new(
        opcode: Opcode,
        modifier: Modifier,
        stepping: Stepping,
        a: Operand,
        b: Operand,
    ) -> Self {
        Self { opcode, modifier, stepping, a, b }
    }
}

impl Default for Instruction {
    fn default() -> Self {
        Instruction::new(
            Opcode::Dat,
            Modifier::F,
            Stepping::D,
            Operand::direct(0),
            Operand::direct(0),
        )
    }
}

impl fmt::Display for Instruction {
    /// Canonical, re-parseable form, e.g. `MOV.I.S $0, $0:1`.
    /// The default stepping `.D` is left implicit.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.opcode, self.modifier)?;
        if self.stepping != Stepping::D {
            write!(f, ".{}", self.stepping)?;
        }
        write!(f, " {}, {}", self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonic_roundtrip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Opcode::from_mnemonic("mov"), Some(Opcode::Mov));
        assert_eq!(Opcode::from_mnemonic("XYZ"), None);
    }

    #[test]
    fn test_sigil_roundtrip() {
        for mode in [
            AddressMode::Immediate,
            AddressMode::Direct,
            AddressMode::Indirect,
            AddressMode::PreDecrement,
            AddressMode::PostIncrement,
        ] {
            assert_eq!(AddressMode::from_sigil(mode.sigil()), Some(mode));
        }
    }

    #[test]
    fn test_step_vectors() {
        assert_eq!(Stepping::D.vector(), Point::new(1, 0));
        assert_eq!(Stepping::S.vector(), Point::new(0, 1));
        assert_eq!(Stepping::Q.vector(), Point::new(-1, 0));
        assert_eq!(Stepping::W.vector(), Point::new(0, -1));
    }

    #[test]
    fn test_default_modifier_table() {
        use AddressMode::{Direct, Immediate};

        // DAT and NOP always get F.
        assert_eq!(Modifier::default_for(Opcode::Dat, Immediate, Immediate), Modifier::F);
        assert_eq!(Modifier::default_for(Opcode::Nop, Direct, Direct), Modifier::F);

        // MOV/CMP: immediate A → AB, immediate B → B, otherwise I.
        assert_eq!(Modifier::default_for(Opcode::Mov, Immediate, Direct), Modifier::Ab);
        assert_eq!(Modifier::default_for(Opcode::Mov, Direct, Immediate), Modifier::B);
        assert_eq!(Modifier::default_for(Opcode::Mov, Direct, Direct), Modifier::I);
        assert_eq!(Modifier::default_for(Opcode::Cmp, Direct, Direct), Modifier::I);

        // Arithmetic: as MOV but falls back to F.
        assert_eq!(Modifier::default_for(Opcode::Add, Immediate, Direct), Modifier::Ab);
        assert_eq!(Modifier::default_for(Opcode::Add, Direct, Immediate), Modifier::B);
        assert_eq!(Modifier::default_for(Opcode::Div, Direct, Direct), Modifier::F);

        // SLT/SEQ/SNE: immediate A → AB, otherwise B. SEQ differs from CMP here.
        assert_eq!(Modifier::default_for(Opcode::Slt, Immediate, Direct), Modifier::Ab);
        assert_eq!(Modifier::default_for(Opcode::Seq, Direct, Direct), Modifier::B);
        assert_eq!(Modifier::default_for(Opcode::Sne, Direct, Immediate), Modifier::B);

        // Control flow is always B.
        assert_eq!(Modifier::default_for(Opcode::Jmp, Direct, Direct), Modifier::B);
        assert_eq!(Modifier::default_for(Opcode::Spl, Immediate, Immediate), Modifier::B);
    }

    #[test]
    fn test_display_forms() {
        let imp = Instruction::new(
            Opcode::Mov,
            Modifier::I,
            Stepping::D,
            Operand::direct(0),
            Operand::direct(1),
        );
        assert_eq!(imp.to_string(), "MOV.I $0, $1");

        let vertical = Instruction::new(
            Opcode::Mov,
            Modifier::I,
            Stepping::S,
            Operand::direct(0),
            Operand::new(AddressMode::Direct, Point::new(0, 1)),
        );
        assert_eq!(vertical.to_string(), "MOV.I.S $0, $0:1");

        assert_eq!(Instruction::default().to_string(), "DAT.F $0, $0");
    }
}
