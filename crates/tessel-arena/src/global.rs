//! Shared mutable counter exported alongside a pool's memories.

use std::cell::Cell;
use std::rc::Rc;

/// A shared `u32` cell, the counterpart of an exported mutable global.
///
/// Clones observe the same value. A pool publishes its materialized slot
/// count through one of these so an external consumer of the raw memories
/// knows how many records are valid.
#[derive(Clone, Debug, Default)]
pub struct Global(Rc<Cell<u32>>);

impl Global {
    /// Create a counter with an initial value.
    pub fn new(value: u32) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    /// Current value.
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    /// Overwrite the value.
    pub fn set(&self, value: u32) {
        self.0.set(value);
    }

    /// Add one, returning the previous value.
    pub fn increment(&self) -> u32 {
        let previous = self.0.get();
        self.0.set(previous.wrapping_add(1));
        previous
    }
}
