//! Per-instance shared state and the loop entry points
//!
//! A [`Session`] is what the foreign callbacks see: their `data` pointer
//! is the boxed session. It holds the state slot, the error list, the
//! pending sync marker and the bound node proxies, together with
//! non-owning views of the handles the [`crate::Instance`] owns.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::ffi::c_void;
use std::fmt;
use std::panic;
use std::rc::Rc;

use parking_lot::Mutex;
use tether_core::{
    CoreError, ObjectId, RegistryEvent, SequenceId, StateVersion, TetherError, TetherResult,
};
use tether_ffi::sys::{CoreEvents, NodeEvents, RegistryEvents};
use tether_ffi::{check, Backend, Borrowed, Core, MainLoop, Registry};

use crate::config::InstanceConfig;
use crate::dispatch::{self, NodeBinding};
use crate::errors::ErrorAggregator;
use crate::state::{StateContainer, Versioned};

/// Application update function: `(session, event, previous) -> next`.
///
/// It runs inside the foreign loop's callback context, so it must not
/// block and must not pump the loop itself.
pub type UpdateFn<S> = Box<dyn FnMut(&Session<S>, RegistryEvent, S) -> S>;

pub struct Session<S> {
    pub(crate) backend: Rc<dyn Backend>,
    pub(crate) main_loop: Borrowed<MainLoop>,
    pub(crate) core: Borrowed<Core>,
    pub(crate) registry: Borrowed<Registry>,
    pub(crate) config: InstanceConfig,
    state: StateContainer<S>,
    pub(crate) errors: ErrorAggregator,
    pub(crate) pending: Cell<Option<SequenceId>>,
    pumping: Cell<bool>,
    pub(crate) nodes: RefCell<BTreeMap<ObjectId, NodeBinding>>,
    update: Mutex<UpdateFn<S>>,
    pub(crate) panic: RefCell<Option<Box<dyn Any + Send>>>,
    pub(crate) core_events: CoreEvents,
    pub(crate) registry_events: RegistryEvents,
    pub(crate) node_events: NodeEvents,
}

impl<S: Clone> Session<S> {
    pub(crate) fn new(
        backend: Rc<dyn Backend>,
        main_loop: Borrowed<MainLoop>,
        core: Borrowed<Core>,
        registry: Borrowed<Registry>,
        config: InstanceConfig,
        initial: S,
        update: UpdateFn<S>,
    ) -> Self {
        Session {
            backend,
            main_loop,
            core,
            registry,
            config,
            state: StateContainer::new(initial),
            errors: ErrorAggregator::new(),
            pending: Cell::new(None),
            pumping: Cell::new(false),
            nodes: RefCell::new(BTreeMap::new()),
            update: Mutex::new(update),
            panic: RefCell::new(None),
            core_events: dispatch::core_events::<S>(),
            registry_events: dispatch::registry_events::<S>(),
            node_events: dispatch::node_events::<S>(),
        }
    }

    /// Pointer handed to the foreign side as callback data
    pub(crate) fn as_data(&self) -> *mut c_void {
        self as *const Session<S> as *mut c_void
    }

    /// Feed one event through the update function
    pub(crate) fn apply(&self, event: RegistryEvent) {
        tracing::debug!(event = event.name(), id = %event.id(), "applying registry event");
        let mut update = self.update.lock();
        let update = &mut *update;
        self.state.update(|previous| update(self, event, previous));
    }

    /// Pump the foreign loop until quit is requested.
    ///
    /// Fails with [`TetherError::Reentrant`] when called from inside a
    /// callback of this session.
    pub fn run(&self) -> TetherResult<()> {
        self.pump()
    }

    /// Ask the loop to return. Safe to call from the update function and
    /// safe to call repeatedly.
    pub fn quit(&self) {
        let res = unsafe { self.backend.main_loop_quit(self.main_loop.as_ptr()) };
        if res < 0 {
            tracing::warn!(res, "loop quit reported an error");
        }
    }

    /// Drain every event caused by requests issued so far and return the
    /// resulting state.
    ///
    /// Issues a sync marker and pumps until the server completes it. Errors
    /// reported by the server while pumping come back as
    /// [`TetherError::Core`]. If the loop returns before the marker is
    /// completed, e.g. because the update function called [`Session::quit`],
    /// the result is [`TetherError::Interrupted`] and buffered errors stay
    /// buffered for the next barrier. There is no timeout: if the server
    /// never answers, this blocks.
    pub fn sync_state(&self) -> TetherResult<S> {
        if self.pumping.get() {
            return Err(TetherError::Reentrant);
        }

        let raw = unsafe {
            self.backend
                .core_sync(self.core.as_ptr(), ObjectId::CORE.0, 0)
        };
        let seq = SequenceId::new(check("core_sync", raw)?);
        self.pending.set(Some(seq));
        tracing::debug!(%seq, "waiting for sync marker");

        let pumped = self.pump();
        let interrupted = self.pending.take().is_some();
        pumped?;
        if interrupted {
            tracing::debug!(%seq, "loop returned before the sync marker completed");
            return Err(TetherError::Interrupted { seq });
        }

        let errors = self.errors.drain(self.config.error_retention);
        if errors.is_empty() {
            Ok(self.state.read())
        } else {
            Err(TetherError::Core(errors))
        }
    }

    /// Like [`Session::sync_state`], but any failure is fatal: it is
    /// logged, reported on stderr and the process exits with status 1.
    pub fn sync_state_strict(&self) -> S {
        match self.sync_state() {
            Ok(state) => state,
            Err(err) => {
                for error in err.core_errors().unwrap_or_default() {
                    tracing::error!(id = %error.id, seq = %error.seq, code = error.code, "{}", error.message);
                }
                tracing::error!(%err, "state synchronisation failed");
                eprintln!("tether: {err}");
                std::process::exit(1);
            }
        }
    }

    /// Current state
    pub fn state(&self) -> S {
        self.state.read()
    }

    pub fn state_version(&self) -> StateVersion {
        self.state.version()
    }

    pub fn snapshot(&self) -> Versioned<S> {
        self.state.snapshot()
    }

    /// Errors buffered since the last drain
    pub fn errors(&self) -> Vec<CoreError> {
        self.errors.snapshot()
    }

    /// Sync marker currently being waited for
    pub fn pending_sequence(&self) -> Option<SequenceId> {
        self.pending.get()
    }

    /// Whether the loop is being pumped right now
    pub fn is_pumping(&self) -> bool {
        self.pumping.get()
    }

    /// Ids of objects with a bound proxy and info hook
    pub fn bound_nodes(&self) -> Vec<ObjectId> {
        self.nodes.borrow().keys().copied().collect()
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    fn pump(&self) -> TetherResult<()> {
        if self.pumping.replace(true) {
            return Err(TetherError::Reentrant);
        }
        let res = unsafe { self.backend.main_loop_run(self.main_loop.as_ptr()) };
        self.pumping.set(false);

        if let Some(payload) = self.panic.borrow_mut().take() {
            panic::resume_unwind(payload);
        }
        check("main_loop_run", res)?;
        Ok(())
    }
}

impl<S> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("pending", &self.pending.get())
            .field("pumping", &self.pumping.get())
            .field("errors", &self.errors.len())
            .field("bound_nodes", &self.nodes.borrow().len())
            .finish()
    }
}
