//! A parsed Redcode warrior: the image a round loads into the core.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::redcode::instruction::Instruction;

/// A warrior image plus the metadata its source carried.
///
/// `start` is the index of the first instruction to execute, relative to
/// the image (set by `ORG`/`END`, default 0). It is normalised against
/// the core at load time, so out-of-image values are legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warrior {
    pub name: String,
    pub author: String,
    pub version: Option<String>,
    pub date: Option<String>,
    pub strategy: Option<String>,
    pub instructions: Vec<Instruction>,
    pub start: i32,
}

impl Warrior {
    /// A bare image with default metadata; mostly useful in tests and
    /// for embedders that build warriors programmatically.
    pub fn new(name: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        Self {
            name: name.into(),
            author: "Anonymous".to_string(),
            version: None,
            date: None,
            strategy: None,
            instructions,
            start: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for Warrior {
    /// The canonical listing: one instruction per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        Ok(())
    }
}
