//! Redcode: the instruction model and the source parser.

pub mod instruction;
pub mod parser;
pub mod warrior;

pub use instruction::{AddressMode, Instruction, Modifier, Opcode, Operand, Stepping};
pub use parser::{parse, ParseError};
pub use warrior::Warrior;
