//! What the fake backend observed

use tether_core::HandleKind;

/// One foreign call, in the order it was made
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalEntry {
    Init,
    Deinit,
    Construct { kind: HandleKind, serial: usize },
    Destroy { kind: HandleKind, serial: usize },
    Attach { owner: HandleKind, serial: usize },
    Detach { owner: HandleKind, serial: usize },
    Bind { id: u32 },
    Sync { seq: i32 },
    Run,
    Quit,
}

/// A breach of the foreign library's usage contract.
///
/// A real library would crash or corrupt memory on any of these; the fake
/// records them so tests can assert there are none.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// An owner was destroyed while hooks were still linked to it
    DestroyedWithHooks {
        kind: HandleKind,
        serial: usize,
        hooks: usize,
    },
    /// A destructor was called on an unknown or already destroyed pointer
    DoubleDestroy { kind: HandleKind },
    /// A parent was destroyed before one of its children
    ParentDestroyedFirst {
        parent: HandleKind,
        child: HandleKind,
    },
    /// A constructor ran before library init or after deinit
    ConstructOutsideInit { kind: HandleKind },
    /// Deinit ran with objects still alive
    DeinitWithLiveObjects { live: usize },
    /// Init and deinit calls did not pair up
    UnbalancedInit,
    /// The loop was pumped from inside its own pump call
    ReentrantRun,
    /// A call received a pointer the backend never handed out
    UnknownPointer { call: &'static str },
}
