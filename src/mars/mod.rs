//! MARS: the Memory Array Redcode Simulator.
//!
//! Everything a round needs lives here: the shared instruction core,
//! the configuration, the event stream and the execution engine.

pub mod config;
pub mod core;
pub mod event;
pub mod round;

pub use config::{ConfigError, RoundConfig};
pub use core::Core;
pub use event::{Event, EventKind, EventLog, EventSink};
pub use round::{CycleResult, Outcome, PlacementError, Round, RoundError};
