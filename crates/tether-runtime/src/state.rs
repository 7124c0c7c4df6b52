//! Single-slot application state
//!
//! The dispatcher is the only writer. Applications see the state as the
//! previous-value argument of their update function, or as a cloned
//! snapshot, never through a mutable reference.

use parking_lot::Mutex;
use tether_core::StateVersion;

/// A state value together with the number of updates that produced it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<S> {
    pub version: StateVersion,
    pub value: S,
}

/// Exclusive-access state slot.
///
/// `update` serialises writers on a gate lock but does not hold the slot
/// lock while the update function runs, so `read` stays usable from
/// inside it.
#[derive(Debug)]
pub struct StateContainer<S> {
    gate: Mutex<()>,
    slot: Mutex<Versioned<S>>,
}

impl<S: Clone> StateContainer<S> {
    pub fn new(initial: S) -> Self {
        StateContainer {
            gate: Mutex::new(()),
            slot: Mutex::new(Versioned {
                version: StateVersion::INITIAL,
                value: initial,
            }),
        }
    }

    /// Clone of the current value
    pub fn read(&self) -> S {
        self.slot.lock().value.clone()
    }

    pub fn version(&self) -> StateVersion {
        self.slot.lock().version
    }

    pub fn snapshot(&self) -> Versioned<S> {
        self.slot.lock().clone()
    }

    /// Replace the value with `f(previous)`.
    ///
    /// If `f` panics the slot keeps its previous value and version.
    pub fn update(&self, f: impl FnOnce(S) -> S) -> StateVersion {
        let _gate = self.gate.lock();
        let previous = self.read();
        let next = f(previous);

        let mut slot = self.slot.lock();
        slot.version = slot.version.next();
        slot.value = next;
        slot.version
    }
}
