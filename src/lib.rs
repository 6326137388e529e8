//! # MARS
//!
//! A Memory Array Redcode Simulator for playing Core War: warriors
//! written in Redcode are loaded into a shared cyclic core and fight
//! until one side's processes are all dead.
//!
//! The engine implements the ICWS-88 instruction subset and extends the
//! classical game along a second axis: the core is a `width × height`
//! torus, operand values are 2D points, and every instruction carries a
//! stepping direction that decides where its successor PC lies. With
//! `core_height = 1` (the default) all of that collapses back to
//! ordinary 1D Core War — `.S` and `.W` stepping become no-ops modulo a
//! height of one.
//!
//! ```
//! use mars::{parse, Outcome, Round, RoundConfig};
//!
//! let imp = parse("MOV.I $0, $1").unwrap();
//! let dwarf = parse(
//!     "ADD.AB #4, $3\n\
//!      MOV.I  $2, @2\n\
//!      JMP.B  $-2\n\
//!      DAT.F  #0, #0",
//! )
//! .unwrap();
//!
//! let config = RoundConfig {
//!     rng_seed: Some(1),
//!     ..RoundConfig::default()
//! };
//! let mut round = Round::new(config, &[imp, dwarf]).unwrap();
//! match round.run() {
//!     Outcome::Winner(id) => println!("{} wins", round.warrior_name(id)),
//!     Outcome::Tie => println!("tie"),
//! }
//! ```

pub mod mars;
pub mod point;
pub mod redcode;

// Re-export commonly used types
pub use mars::{
    ConfigError, Core, CycleResult, Event, EventKind, EventLog, EventSink, Outcome,
    PlacementError, Round, RoundConfig, RoundError,
};
pub use point::Point;
pub use redcode::{
    parse, AddressMode, Instruction, Modifier, Opcode, Operand, ParseError, Stepping, Warrior,
};
