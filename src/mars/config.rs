//! Round configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameters for a round of Core War.
///
/// The defaults are the classical KOTH settings on a 1D core; raising
/// `core_height` above 1 turns on the 2D extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Core extent along x (`core_size_x`).
    pub core_width: i32,
    /// Core extent along y (`core_size_y`); 1 means classical 1D play.
    pub core_height: i32,
    /// Cycle cap: surviving warriors tie when it is reached.
    pub cycles: u32,
    /// Per-warrior process queue cap.
    pub max_processes: usize,
    /// Maximum warrior image length.
    pub max_length: usize,
    /// Minimum separation between placed images.
    pub min_distance: usize,
    /// Seed for placement; `None` draws from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            core_width: 8000,
            core_height: 1,
            cycles: 80_000,
            max_processes: 8000,
            max_length: 100,
            min_distance: 100,
            rng_seed: None,
        }
    }
}

impl RoundConfig {
    /// Total number of core cells.
    pub fn core_size(&self) -> usize {
        (self.core_width as i64 * self.core_height as i64) as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_width < 1 {
            return Err(ConfigError::NonPositiveCoreSize {
                axis: 'x',
                value: self.core_width,
            });
        }
        if self.core_height < 1 {
            return Err(ConfigError::NonPositiveCoreSize {
                axis: 'y',
                value: self.core_height,
            });
        }
        if self.core_width as i64 * self.core_height as i64 > i32::MAX as i64 {
            return Err(ConfigError::CoreTooLarge {
                cells: self.core_width as i64 * self.core_height as i64,
            });
        }
        if self.cycles == 0 {
            return Err(ConfigError::ZeroCount { name: "cycles" });
        }
        if self.max_processes == 0 {
            return Err(ConfigError::ZeroCount { name: "max_processes" });
        }
        if self.max_length == 0 {
            return Err(ConfigError::ZeroCount { name: "max_length" });
        }
        Ok(())
    }
}

/// Invalid numeric configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("core size along {axis} must be positive, got {value}")]
    NonPositiveCoreSize { axis: char, value: i32 },

    #[error("core of {cells} cells does not fit the address space")]
    CoreTooLarge { cells: i64 },

    #[error("{name} must be at least 1")]
    ZeroCount { name: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(RoundConfig::default().validate(), Ok(()));
        assert_eq!(RoundConfig::default().core_size(), 8000);
    }

    #[test]
    fn test_rejects_bad_extents() {
        let config = RoundConfig {
            core_width: 0,
            ..RoundConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositiveCoreSize { axis: 'x', value: 0 })
        );

        let config = RoundConfig {
            core_height: -4,
            ..RoundConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositiveCoreSize { axis: 'y', value: -4 })
        );
    }

    #[test]
    fn test_rejects_zero_counts() {
        let config = RoundConfig {
            max_processes: 0,
            ..RoundConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroCount { name: "max_processes" })
        );
    }
}
