//! Test utilities for Tessel development.
//!
//! Provides the fixture schemas shared across test suites and a
//! [`DirtyRecorder`] that captures every dirty notification a proxy
//! class raises.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::RefCell;
use std::rc::Rc;

use tessel_proxy::{Proxy, Tracking};

/// Records `(bit, root)` pairs from a [`Tracking::Notify`] callback.
///
/// Clones share the same log, so keep one and hand
/// [`tracking`](DirtyRecorder::tracking) to the code under test.
#[derive(Clone, Default)]
pub struct DirtyRecorder {
    events: Rc<RefCell<Vec<(usize, Proxy)>>>,
}

impl DirtyRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracking mode that appends every notification to this recorder.
    pub fn tracking(&self) -> Tracking {
        let events = Rc::clone(&self.events);
        Tracking::notify(move |bit, proxy| events.borrow_mut().push((bit, proxy.clone())))
    }

    /// Number of notifications so far.
    pub fn count(&self) -> usize {
        self.events.borrow().len()
    }

    /// Reported bits (or indices) in arrival order.
    pub fn bits(&self) -> Vec<usize> {
        self.events.borrow().iter().map(|(bit, _)| *bit).collect()
    }

    /// Reported bits, sorted.
    pub fn sorted_bits(&self) -> Vec<usize> {
        let mut bits = self.bits();
        bits.sort_unstable();
        bits
    }

    /// The root instance of the most recent notification.
    pub fn last_root(&self) -> Option<Proxy> {
        self.events.borrow().last().map(|(_, proxy)| proxy.clone())
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}
