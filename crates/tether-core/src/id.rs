//! Identity types
//!
//! Ids mirror the integer widths the foreign protocol uses on the wire:
//! global object ids are 32-bit, sync markers are signed 32-bit.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-side object id, as announced by the registry
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// The core object itself. Sync markers are always issued against it.
    pub const CORE: ObjectId = ObjectId(0);

    #[inline]
    pub fn new(id: u32) -> Self {
        ObjectId(id)
    }

    #[inline]
    pub fn is_core(self) -> bool {
        self == Self::CORE
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Marker correlation id returned by a sync request.
///
/// Only equality is meaningful: the foreign side may wrap or reuse values.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SequenceId(pub i32);

impl SequenceId {
    #[inline]
    pub fn new(seq: i32) -> Self {
        SequenceId(seq)
    }

    #[inline]
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Debug for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of updates applied to a state slot
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct StateVersion(pub u64);

impl StateVersion {
    pub const INITIAL: StateVersion = StateVersion(0);

    #[inline]
    pub fn next(self) -> Self {
        StateVersion(self.0.wrapping_add(1))
    }
}

impl fmt::Debug for StateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
