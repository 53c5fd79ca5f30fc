//! Tick buffer: the barrier's shared state.
//!
//! Only ever touched with the barrier mutex held.

use contracts::{
    HandObservation, HazardObservation, Observation, SourceId, Stamped, TickSnapshot,
};

/// One producer slot
#[derive(Debug)]
struct Slot<T> {
    ready: bool,
    retired: bool,
    value: Option<Stamped<T>>,
}

impl<T: Clone + Default> Slot<T> {
    fn new() -> Self {
        Self {
            ready: false,
            retired: false,
            value: None,
        }
    }

    fn store(&mut self, tick: u64, value: T) {
        self.value = Some(Stamped { tick, value });
        self.ready = true;
    }

    fn satisfied(&self) -> bool {
        self.ready || self.retired
    }

    /// Stamped value for `tick`; retired or missing slots yield the empty sentinel
    fn stamped(&self, tick: u64) -> Stamped<T> {
        match &self.value {
            Some(stamped) if self.ready => stamped.clone(),
            _ => Stamped {
                tick,
                value: T::default(),
            },
        }
    }

    fn clear(&mut self) {
        self.ready = false;
        self.value = None;
    }
}

/// Shared tick state of the two-producer/one-consumer barrier
#[derive(Debug)]
pub struct TickBuffer {
    tick: u64,
    hand: Slot<HandObservation>,
    hazard: Slot<HazardObservation>,
    consumed: bool,
    shutdown: bool,
}

impl Default for TickBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TickBuffer {
    pub fn new() -> Self {
        Self {
            tick: 0,
            hand: Slot::new(),
            hazard: Slot::new(),
            consumed: false,
            shutdown: false,
        }
    }

    /// Current (unreleased) tick
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// The previous tick was released and nothing was published since
    pub fn consumed(&self) -> bool {
        self.consumed
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    pub(crate) fn set_shutdown(&mut self) {
        self.shutdown = true;
    }

    pub fn is_ready(&self, source: SourceId) -> bool {
        match source {
            SourceId::Visual => self.hand.ready,
            SourceId::Thermal => self.hazard.ready,
        }
    }

    pub fn is_retired(&self, source: SourceId) -> bool {
        match source {
            SourceId::Visual => self.hand.retired,
            SourceId::Thermal => self.hazard.retired,
        }
    }

    /// Both slots ready or retired
    pub fn is_complete(&self) -> bool {
        self.hand.satisfied() && self.hazard.satisfied()
    }

    pub fn is_exhausted(&self) -> bool {
        self.hand.retired && self.hazard.retired
    }

    /// Stamp and store an observation in its slot, returns the tick
    pub(crate) fn store(&mut self, observation: Observation) -> u64 {
        let tick = self.tick;
        match observation {
            Observation::Hand(hand) => self.hand.store(tick, hand),
            Observation::Hazard(hazard) => self.hazard.store(tick, hazard),
        }
        self.consumed = false;
        tick
    }

    pub(crate) fn retire(&mut self, source: SourceId) {
        match source {
            SourceId::Visual => {
                self.hand.retired = true;
                self.hand.clear();
            }
            SourceId::Thermal => {
                self.hazard.retired = true;
                self.hazard.clear();
            }
        }
    }

    /// Matched pair of the current tick
    pub(crate) fn snapshot(&self) -> TickSnapshot {
        TickSnapshot {
            tick: self.tick,
            hand: self.hand.stamped(self.tick),
            hazard: self.hazard.stamped(self.tick),
        }
    }

    /// Clear both slots and advance to the next tick
    pub(crate) fn release(&mut self) {
        self.hand.clear();
        self.hazard.clear();
        self.consumed = true;
        self.tick += 1;
    }
}
