//! The round engine: warrior placement, operand resolution, opcode
//! execution and the round-robin process scheduler.

use std::collections::{BTreeMap, VecDeque};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mars::config::{ConfigError, RoundConfig};
use crate::mars::core::Core;
use crate::mars::event::{Event, EventKind, EventSink};
use crate::point::Point;
use crate::redcode::{AddressMode, Instruction, Modifier, Opcode, Operand, Stepping, Warrior};

/// Candidate draws per warrior before placement gives up.
const PLACEMENT_RETRY_BUDGET: usize = 1000;

/// Failure to construct a round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Placement(#[from] PlacementError),
}

/// Failure to fit the warriors into the core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("no warriors to load")]
    NoWarriors,

    #[error("warrior '{name}' has no instructions")]
    EmptyImage { name: String },

    #[error("warrior '{name}' is {len} instructions long (maximum {max})")]
    ImageTooLong { name: String, len: usize, max: usize },

    #[error("no room for warrior '{name}' after {attempts} attempts (minimum distance {min_distance})")]
    NoRoom {
        name: String,
        attempts: usize,
        min_distance: usize,
    },
}

/// How a finished round came out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The warrior with this index holds the field (or was the last to
    /// die).
    Winner(usize),
    /// Cycle cap reached, or every remaining warrior died on the same
    /// cycle.
    Tie,
}

/// Result of one call to [`Round::step`].
#[derive(Debug, Clone)]
pub struct CycleResult {
    /// Set once the round is over; repeated by later calls.
    pub outcome: Option<Outcome>,
    /// Events emitted during this cycle, in order.
    pub events: Vec<Event>,
}

/// A loaded warrior: its display name and its live process queue.
struct Combatant {
    name: String,
    queue: VecDeque<Point>,
}

/// One operand after addressing-mode resolution.
///
/// Predecrements have already been written through by the time this
/// exists; postincrements are deferred and recorded here for the
/// finalisation pass after the opcode body.
struct ResolvedOperand {
    /// Effective address (normalised). The PC itself for `#`.
    address: Point,
    /// The instruction at `address`, captured at resolution time.
    snapshot: Instruction,
    /// Cell whose B-field still owes an increment.
    post_increment: Option<Point>,
}

/// Which field of an instruction an action touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    A,
    B,
}

impl Field {
    const fn read_event(self) -> EventKind {
        match self {
            Field::A => EventKind::ARead,
            Field::B => EventKind::BRead,
        }
    }

    const fn write_event(self) -> EventKind {
        match self {
            Field::A => EventKind::AWrite,
            Field::B => EventKind::BWrite,
        }
    }

    const fn dec_event(self) -> EventKind {
        match self {
            Field::A => EventKind::ADec,
            Field::B => EventKind::BDec,
        }
    }

    const fn arith_event(self) -> EventKind {
        match self {
            Field::A => EventKind::AArith,
            Field::B => EventKind::BArith,
        }
    }
}

fn field_of(instruction: &Instruction, field: Field) -> Point {
    match field {
        Field::A => instruction.a.value,
        Field::B => instruction.b.value,
    }
}

fn set_field(instruction: &mut Instruction, field: Field, value: Point) {
    match field {
        Field::A => instruction.a.value = value,
        Field::B => instruction.b.value = value,
    }
}

/// (source field, destination field) pairs a modifier selects for copy,
/// arithmetic and comparison. `I` degrades to `F` here; MOV and the
/// equality comparisons special-case it to whole instructions.
const fn copy_pairs(modifier: Modifier) -> &'static [(Field, Field)] {
    match modifier {
        Modifier::A => &[(Field::A, Field::A)],
        Modifier::B => &[(Field::B, Field::B)],
        Modifier::Ab => &[(Field::A, Field::B)],
        Modifier::Ba => &[(Field::B, Field::A)],
        Modifier::F | Modifier::I => &[(Field::A, Field::A), (Field::B, Field::B)],
        Modifier::X => &[(Field::A, Field::B), (Field::B, Field::A)],
    }
}

/// Destination fields a modifier selects for the zero tests (JMZ, JMN,
/// DJN).
const fn test_fields(modifier: Modifier) -> &'static [Field] {
    match modifier {
        Modifier::A | Modifier::Ba => &[Field::A],
        Modifier::B | Modifier::Ab => &[Field::B],
        Modifier::F | Modifier::X | Modifier::I => &[Field::A, Field::B],
    }
}

/// A round in progress: the core, the warriors and their queues, and
/// the cycle counter. All engine state lives here; there are no
/// globals.
pub struct Round {
    config: RoundConfig,
    core: Core,
    combatants: Vec<Combatant>,
    cycle: u32,
    outcome: Option<Outcome>,
    pending: Vec<Event>,
    sink: Option<Box<dyn EventSink>>,
}

impl Round {
    /// Validate the configuration, place the warriors and seed one
    /// process per warrior at its entry point.
    pub fn new(config: RoundConfig, warriors: &[Warrior]) -> Result<Round, RoundError> {
        config.validate()?;
        if warriors.is_empty() {
            return Err(PlacementError::NoWarriors.into());
        }

        let core_size = config.core_size();
        let max_len = config.max_length.min(core_size);
        for warrior in warriors {
            if warrior.is_empty() {
                return Err(PlacementError::EmptyImage {
                    name: warrior.name.clone(),
                }
                .into());
            }
            if warrior.len() > max_len {
                return Err(PlacementError::ImageTooLong {
                    name: warrior.name.clone(),
                    len: warrior.len(),
                    max: max_len,
                }
                .into());
            }
        }

        let mut rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut core = Core::new(config.core_width, config.core_height);
        let mut placed: Vec<(usize, usize)> = Vec::with_capacity(warriors.len());
        let mut combatants = Vec::with_capacity(warriors.len());

        for warrior in warriors {
            let len = warrior.len();
            let origin_index = if placed.is_empty() {
                rng.gen_range(0..core_size)
            } else {
                (0..PLACEMENT_RETRY_BUDGET)
                    .map(|_| rng.gen_range(0..core_size))
                    .find(|&candidate| {
                        placed.iter().all(|&(start, placed_len)| {
                            separated(candidate, len, start, placed_len, config.min_distance, core_size)
                        })
                    })
                    .ok_or(PlacementError::NoRoom {
                        name: warrior.name.clone(),
                        attempts: PLACEMENT_RETRY_BUDGET,
                        min_distance: config.min_distance,
                    })?
            };
            placed.push((origin_index, len));

            let origin = core.point_at(origin_index);
            for (offset, instruction) in warrior.instructions.iter().enumerate() {
                let mut cell = *instruction;
                cell.a.value = core.normalize(cell.a.value);
                cell.b.value = core.normalize(cell.b.value);
                core.write(origin + offset as i32, cell);
            }

            let entry = core.normalize(origin + warrior.start);
            debug!("placed '{}' ({} cells) at {}, entry {}", warrior.name, len, origin, entry);
            combatants.push(Combatant {
                name: warrior.name.clone(),
                queue: VecDeque::from([entry]),
            });
        }

        Ok(Round {
            config,
            core,
            combatants,
            cycle: 0,
            outcome: None,
            pending: Vec::new(),
            sink: None,
        })
    }

    /// Run one cycle: one execution slot for every living warrior, in
    /// play order. Once the round is over, further calls return the
    /// final outcome and no events.
    pub fn step(&mut self) -> CycleResult {
        if self.outcome.is_some() {
            return CycleResult {
                outcome: self.outcome,
                events: Vec::new(),
            };
        }

        self.cycle += 1;
        let mut deaths = Vec::new();
        for id in 0..self.combatants.len() {
            let Some(pc) = self.combatants[id].queue.pop_front() else {
                continue;
            };
            self.execute_slot(id, pc);
            if self.combatants[id].queue.is_empty() {
                self.emit(EventKind::WarriorKilled, id, pc, pc);
                debug!("warrior '{}' eliminated on cycle {}", self.combatants[id].name, self.cycle);
                deaths.push(id);
            }
        }

        let living: Vec<usize> = (0..self.combatants.len())
            .filter(|&id| !self.combatants[id].queue.is_empty())
            .collect();
        // A solo warrior plays against the clock; otherwise the round
        // ends as soon as at most one side is standing.
        let threshold = usize::from(self.combatants.len() >= 2);
        if living.len() <= threshold {
            self.outcome = Some(match (living.first(), deaths.as_slice()) {
                (Some(&winner), _) => Outcome::Winner(winner),
                (None, &[last]) => Outcome::Winner(last),
                (None, _) => Outcome::Tie,
            });
        } else if self.cycle >= self.config.cycles {
            self.outcome = Some(Outcome::Tie);
        }
        if let Some(outcome) = self.outcome {
            debug!("round over after {} cycles: {:?}", self.cycle, outcome);
        }

        CycleResult {
            outcome: self.outcome,
            events: std::mem::take(&mut self.pending),
        }
    }

    /// Step until the round is decided.
    pub fn run(&mut self) -> Outcome {
        loop {
            if let Some(outcome) = self.step().outcome {
                return outcome;
            }
        }
    }

    /// Attach an event sink. Events reach it synchronously, in the
    /// order they would appear in [`CycleResult::events`].
    pub fn set_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sink = Some(sink);
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    /// The instruction at `point` (normalised).
    pub fn read_cell(&self, point: Point) -> Instruction {
        self.core.read(point)
    }

    pub fn warrior_name(&self, id: usize) -> &str {
        &self.combatants[id].name
    }

    /// Replace a warrior's queue with the single given PC. Debugger
    /// hook; revives a dead warrior.
    ///
    /// # Panics
    /// Panics if `id` is out of range.
    pub fn set_pc(&mut self, id: usize, point: Point) {
        let entry = self.core.normalize(point);
        self.combatants[id].queue = VecDeque::from([entry]);
    }

    /// Every warrior's process queue, head first.
    pub fn queues(&self) -> BTreeMap<usize, Vec<Point>> {
        self.combatants
            .iter()
            .enumerate()
            .map(|(id, combatant)| (id, combatant.queue.iter().copied().collect()))
            .collect()
    }

    // ==================== Instruction execution ====================

    fn execute_slot(&mut self, id: usize, pc: Point) {
        let ir = self.core.read(pc);
        let a = self.resolve_operand(id, pc, ir.a, ir.stepping);
        let b = self.resolve_operand(id, pc, ir.b, ir.stepping);
        self.emit(EventKind::Executed, id, pc, pc);

        let step = ir.stepping.vector();
        let next = self.core.normalize(pc + step);
        let skip = self.core.normalize(pc + step + step);

        match ir.opcode {
            Opcode::Dat => self.kill(id, pc),

            Opcode::Mov => {
                self.do_mov(id, pc, ir.modifier, &a, &b);
                self.enqueue(id, next);
            }

            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
                if self.do_arithmetic(id, pc, ir.opcode, ir.modifier, &a, &b) {
                    self.enqueue(id, next);
                } else {
                    self.kill(id, pc);
                }
            }

            Opcode::Jmp => {
                self.enqueue(id, a.address);
            }

            Opcode::Jmz => {
                let zero = self.test_zero(id, pc, ir.modifier, &b);
                self.enqueue(id, if zero { a.address } else { next });
            }

            Opcode::Jmn => {
                let zero = self.test_zero(id, pc, ir.modifier, &b);
                self.enqueue(id, if zero { next } else { a.address });
            }

            Opcode::Djn => {
                let nonzero = self.do_djn(id, pc, ir.modifier, &b);
                self.enqueue(id, if nonzero { a.address } else { next });
            }

            Opcode::Spl => {
                self.enqueue(id, next);
                if self.enqueue(id, a.address) {
                    self.emit(EventKind::ProcessSplit, id, pc, a.address);
                }
            }

            Opcode::Slt | Opcode::Cmp | Opcode::Seq | Opcode::Sne => {
                let taken = self.do_compare(id, pc, ir.opcode, ir.modifier, &a, &b);
                self.enqueue(id, if taken { skip } else { next });
            }

            Opcode::Nop => {
                self.enqueue(id, next);
            }
        }

        // Deferred postincrements, A-operand first.
        self.finish_operand(id, pc, ir.stepping, &a);
        self.finish_operand(id, pc, ir.stepping, &b);
    }

    /// Resolve one operand to an effective address, applying a
    /// predecrement write-through and noting a postincrement debt.
    fn resolve_operand(
        &mut self,
        id: usize,
        pc: Point,
        operand: Operand,
        stepping: Stepping,
    ) -> ResolvedOperand {
        match operand.mode {
            AddressMode::Immediate => ResolvedOperand {
                address: pc,
                snapshot: self.core.read(pc),
                post_increment: None,
            },

            AddressMode::Direct => {
                let address = self.core.normalize(pc + operand.value);
                ResolvedOperand {
                    address,
                    snapshot: self.core.read(address),
                    post_increment: None,
                }
            }

            AddressMode::Indirect | AddressMode::PostIncrement => {
                let cell = self.core.normalize(pc + operand.value);
                let pointer = self.core.read(cell).b.value;
                let address = self.core.normalize(pc + operand.value + pointer);
                ResolvedOperand {
                    address,
                    snapshot: self.core.read(address),
                    post_increment: (operand.mode == AddressMode::PostIncrement).then_some(cell),
                }
            }

            AddressMode::PreDecrement => {
                let cell = self.core.normalize(pc + operand.value);
                let mut through = self.core.read(cell);
                through.b.value = self.core.normalize(through.b.value - stepping.vector());
                self.core.write(cell, through);
                self.emit(EventKind::BDec, id, pc, cell);
                let address = self.core.normalize(pc + operand.value + through.b.value);
                ResolvedOperand {
                    address,
                    snapshot: self.core.read(address),
                    post_increment: None,
                }
            }
        }
    }

    /// Pay off a postincrement debt.
    fn finish_operand(&mut self, id: usize, pc: Point, stepping: Stepping, operand: &ResolvedOperand) {
        if let Some(cell) = operand.post_increment {
            let mut through = self.core.read(cell);
            through.b.value = self.core.normalize(through.b.value + stepping.vector());
            self.core.write(cell, through);
            self.emit(EventKind::BInc, id, pc, cell);
        }
    }

    fn do_mov(&mut self, id: usize, pc: Point, modifier: Modifier, a: &ResolvedOperand, b: &ResolvedOperand) {
        if modifier == Modifier::I {
            self.emit(EventKind::IRead, id, pc, a.address);
            self.core.write(b.address, a.snapshot);
            self.emit(EventKind::IWrite, id, pc, b.address);
            return;
        }

        let mut target = self.core.read(b.address);
        for &(src, dst) in copy_pairs(modifier) {
            self.emit(src.read_event(), id, pc, a.address);
            set_field(&mut target, dst, field_of(&a.snapshot, src));
            self.emit(dst.write_event(), id, pc, b.address);
        }
        self.core.write(b.address, target);
    }

    /// Returns false when a zero divisor kills the process. Divisors
    /// are checked for every selected field pair before anything is
    /// written, so a kill never leaves a partial result.
    fn do_arithmetic(
        &mut self,
        id: usize,
        pc: Point,
        opcode: Opcode,
        modifier: Modifier,
        a: &ResolvedOperand,
        b: &ResolvedOperand,
    ) -> bool {
        let pairs = copy_pairs(modifier);

        if matches!(opcode, Opcode::Div | Opcode::Mod) {
            for &(src, _) in pairs {
                if field_of(&a.snapshot, src).x == 0 {
                    return false;
                }
            }
        }

        let mut target = self.core.read(b.address);
        for &(src, dst) in pairs {
            let rhs = field_of(&a.snapshot, src);
            let lhs = field_of(&b.snapshot, dst);
            let value = match opcode {
                Opcode::Add => lhs + rhs,
                Opcode::Sub => lhs - rhs,
                Opcode::Mul => lhs * rhs,
                Opcode::Div => lhs / rhs,
                Opcode::Mod => lhs % rhs,
                _ => unreachable!("not an arithmetic opcode: {opcode}"),
            };
            self.emit(src.read_event(), id, pc, a.address);
            self.emit(dst.read_event(), id, pc, b.address);
            set_field(&mut target, dst, self.core.normalize(value));
            self.emit(dst.arith_event(), id, pc, b.address);
        }
        self.core.write(b.address, target);
        true
    }

    /// JMZ/JMN predicate: are the selected fields of the B-target all
    /// zero?
    fn test_zero(&mut self, id: usize, pc: Point, modifier: Modifier, b: &ResolvedOperand) -> bool {
        let mut zero = true;
        for &field in test_fields(modifier) {
            self.emit(field.read_event(), id, pc, b.address);
            zero &= field_of(&b.snapshot, field).is_zero();
        }
        zero
    }

    /// DJN: decrement the selected fields at the B-target, write
    /// through, and report whether any of them is still non-zero.
    fn do_djn(&mut self, id: usize, pc: Point, modifier: Modifier, b: &ResolvedOperand) -> bool {
        let mut target = self.core.read(b.address);
        let mut nonzero = false;
        for &field in test_fields(modifier) {
            let value = self.core.normalize(field_of(&target, field) - 1);
            set_field(&mut target, field, value);
            nonzero |= !value.is_zero();
            self.emit(field.read_event(), id, pc, b.address);
            self.emit(field.dec_event(), id, pc, b.address);
        }
        self.core.write(b.address, target);
        nonzero
    }

    /// SLT/CMP/SEQ/SNE predicate over the selected field pairs.
    fn do_compare(
        &mut self,
        id: usize,
        pc: Point,
        opcode: Opcode,
        modifier: Modifier,
        a: &ResolvedOperand,
        b: &ResolvedOperand,
    ) -> bool {
        if modifier == Modifier::I && opcode != Opcode::Slt {
            self.emit(EventKind::IRead, id, pc, a.address);
            self.emit(EventKind::IRead, id, pc, b.address);
            let equal = a.snapshot == b.snapshot;
            return if opcode == Opcode::Sne { !equal } else { equal };
        }

        // SLT has no whole-instruction ordering; .I compares as .F.
        let mut taken = true;
        for &(src, dst) in copy_pairs(modifier) {
            self.emit(src.read_event(), id, pc, a.address);
            self.emit(dst.read_event(), id, pc, b.address);
            let lhs = field_of(&a.snapshot, src);
            let rhs = field_of(&b.snapshot, dst);
            taken &= match opcode {
                // Ordering between fields is on x alone; the full
                // lexicographic Point order is display-only.
                Opcode::Slt => lhs.x < rhs.x,
                Opcode::Sne => lhs != rhs,
                _ => lhs == rhs,
            };
        }
        taken
    }

    /// Push a PC onto a warrior's queue unless it is at the process
    /// cap. Returns whether the push happened.
    fn enqueue(&mut self, id: usize, point: Point) -> bool {
        let combatant = &mut self.combatants[id];
        if combatant.queue.len() >= self.config.max_processes {
            return false;
        }
        let point = self.core.normalize(point);
        combatant.queue.push_back(point);
        true
    }

    fn kill(&mut self, id: usize, pc: Point) {
        self.emit(EventKind::ProcessKilled, id, pc, pc);
    }

    fn emit(&mut self, kind: EventKind, warrior: usize, pc: Point, address: Point) {
        let event = Event {
            kind,
            warrior,
            pc,
            address,
        };
        if let Some(sink) = self.sink.as_mut() {
            sink.emit(&event);
        }
        self.pending.push(event);
    }
}

/// True when two circular index intervals of the given lengths keep at
/// least `min_distance` clear on both sides.
fn separated(
    a_start: usize,
    a_len: usize,
    b_start: usize,
    b_len: usize,
    min_distance: usize,
    core_size: usize,
) -> bool {
    let forward = (b_start + core_size - a_start) % core_size;
    forward >= a_len.saturating_add(min_distance)
        && core_size - forward >= b_len.saturating_add(min_distance)
}
