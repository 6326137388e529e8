//! Execution events.
//!
//! The engine narrates every observable action — instruction execution,
//! field reads and writes, queue changes — as a stream of events. The
//! REPL and graphics front-ends subscribe through [`EventSink`]; tests
//! and embedders that just want the record use [`EventLog`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::point::Point;

/// What happened. Field events name the instruction field involved
/// (A/B) or the whole instruction (I).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A process executed the instruction at `address`.
    Executed,
    /// A whole instruction was read (MOV.I source, CMP.I operands).
    IRead,
    /// A whole instruction was written.
    IWrite,
    ARead,
    AWrite,
    BRead,
    BWrite,
    /// A field was decremented (predecrement addressing, DJN).
    ADec,
    BDec,
    /// A field was incremented (postincrement addressing).
    AInc,
    BInc,
    /// A field received an arithmetic result.
    AArith,
    BArith,
    /// SPL queued a child process at `address`.
    ProcessSplit,
    /// A process died (DAT or division by zero) at `address`.
    ProcessKilled,
    /// A warrior's queue emptied; it is out of the round.
    WarriorKilled,
}

impl EventKind {
    /// Canonical wire name, e.g. `A_READ`.
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::Executed => "EXECUTED",
            EventKind::IRead => "I_READ",
            EventKind::IWrite => "I_WRITE",
            EventKind::ARead => "A_READ",
            EventKind::AWrite => "A_WRITE",
            EventKind::BRead => "B_READ",
            EventKind::BWrite => "B_WRITE",
            EventKind::ADec => "A_DEC",
            EventKind::BDec => "B_DEC",
            EventKind::AInc => "A_INC",
            EventKind::BInc => "B_INC",
            EventKind::AArith => "A_ARITH",
            EventKind::BArith => "B_ARITH",
            EventKind::ProcessSplit => "PROCESS_SPLIT",
            EventKind::ProcessKilled => "PROCESS_KILLED",
            EventKind::WarriorKilled => "WARRIOR_KILLED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One engine event: who did what, where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Index of the acting warrior in play order.
    pub warrior: usize,
    /// Program counter of the acting process.
    pub pc: Point,
    /// The cell the event concerns (equals `pc` for `EXECUTED`).
    pub address: Point,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} warrior={} pc={} addr={}", self.kind, self.warrior, self.pc, self.address)
    }
}

/// Receiver for engine events.
///
/// Delivery is synchronous, before the next process's slot begins; a
/// sink must not call back into the engine.
pub trait EventSink {
    fn emit(&mut self, event: &Event);
}

impl EventSink for Vec<Event> {
    fn emit(&mut self, event: &Event) {
        self.push(*event);
    }
}

/// A sink that records everything, sharable with the embedder after the
/// round takes ownership of its clone.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Drain the record.
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: &Event) {
        self.events.borrow_mut().push(*event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(EventKind::Executed.name(), "EXECUTED");
        assert_eq!(EventKind::AArith.name(), "A_ARITH");
        assert_eq!(EventKind::ProcessKilled.name(), "PROCESS_KILLED");
        assert_eq!(EventKind::WarriorKilled.to_string(), "WARRIOR_KILLED");
    }

    #[test]
    fn test_event_log_shares_the_record() {
        let log = EventLog::new();
        let mut sink = log.clone();
        let event = Event {
            kind: EventKind::Executed,
            warrior: 0,
            pc: Point::new(4, 0),
            address: Point::new(4, 0),
        };
        sink.emit(&event);
        assert_eq!(log.events(), vec![event]);
        assert_eq!(log.take().len(), 1);
        assert!(log.is_empty());
    }
}
