//! Listener hooks
//!
//! A [`Hook`] owns the foreign listener record for one callback table
//! attached to one owner. The record lives on the heap so its address is
//! stable while the foreign side has it linked into the owner's list.
//!
//! Hooks must be detached before their owner is destroyed. Owners in this
//! workspace keep their hooks in a [`HookTable`] declared before the owning
//! handle, so field drop order does it.

use std::ffi::c_void;
use std::fmt;
use std::rc::Rc;

use tether_core::HandleKind;

use crate::backend::Backend;
use crate::handle::{Borrowed, Core, ForeignKind, Handle, Node, Registry};
use crate::sys::*;

/// A foreign kind that accepts listeners
pub trait Listenable: ForeignKind {
    type Events;

    /// # Safety
    ///
    /// `owner` must be live, and `hook`, `events` and `data` must stay
    /// valid until the hook is removed.
    unsafe fn add_listener(
        backend: &dyn Backend,
        owner: *mut Self::Raw,
        hook: *mut RawHook,
        events: *const Self::Events,
        data: *mut c_void,
    );
}

impl Listenable for Core {
    type Events = CoreEvents;

    unsafe fn add_listener(
        backend: &dyn Backend,
        owner: *mut RawCore,
        hook: *mut RawHook,
        events: *const CoreEvents,
        data: *mut c_void,
    ) {
        backend.core_add_listener(owner, hook, events, data);
    }
}

impl Listenable for Registry {
    type Events = RegistryEvents;

    unsafe fn add_listener(
        backend: &dyn Backend,
        owner: *mut RawRegistry,
        hook: *mut RawHook,
        events: *const RegistryEvents,
        data: *mut c_void,
    ) {
        backend.registry_add_listener(owner, hook, events, data);
    }
}

impl Listenable for Node {
    type Events = NodeEvents;

    unsafe fn add_listener(
        backend: &dyn Backend,
        owner: *mut RawProxy,
        hook: *mut RawHook,
        events: *const NodeEvents,
        data: *mut c_void,
    ) {
        backend.node_add_listener(owner, hook, events, data);
    }
}

/// A callback table attached to an owner
pub struct Hook {
    raw: Box<RawHook>,
    backend: Rc<dyn Backend>,
    owner: HandleKind,
    attached: bool,
}

impl Hook {
    /// Attach `events` to `owner`, passing `data` to every callback.
    ///
    /// # Safety
    ///
    /// `owner` must outlive the returned hook, and `events` and `data`
    /// must stay valid until it is detached.
    pub unsafe fn attach<K: Listenable>(
        backend: &Rc<dyn Backend>,
        owner: Borrowed<K>,
        events: *const K::Events,
        data: *mut c_void,
    ) -> Hook {
        let mut raw = Box::new(RawHook::zeroed());
        K::add_listener(backend.as_ref(), owner.as_ptr(), &mut *raw, events, data);
        tracing::trace!(owner = %K::KIND, hook = ?(&*raw as *const RawHook), "attached hook");
        Hook {
            raw,
            backend: Rc::clone(backend),
            owner: K::KIND,
            attached: true,
        }
    }

    /// Unlink from the owner. Detaching twice is a no-op.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        tracing::trace!(owner = %self.owner, hook = ?self.as_ptr(), "detaching hook");
        unsafe { self.backend.hook_remove(&mut *self.raw) };
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Kind of the object this hook listens on
    pub fn owner_kind(&self) -> HandleKind {
        self.owner
    }

    pub fn as_ptr(&self) -> *const RawHook {
        &*self.raw
    }
}

impl Drop for Hook {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("owner", &self.owner)
            .field("attached", &self.attached)
            .finish()
    }
}

impl<K: Listenable> Handle<K> {
    /// Attach a listener to this handle.
    ///
    /// # Safety
    ///
    /// Same contract as [`Hook::attach`]; the returned hook must be
    /// dropped before `self`.
    pub unsafe fn attach(&self, events: *const K::Events, data: *mut c_void) -> Hook {
        Hook::attach(self.backend(), self.borrow(), events, data)
    }
}

/// Hooks for one owner, detached newest first
#[derive(Debug, Default)]
pub struct HookTable {
    hooks: Vec<Hook>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Detach and drop every hook, most recently attached first
    pub fn clear(&mut self) {
        while let Some(mut hook) = self.hooks.pop() {
            hook.detach();
        }
    }
}

impl Drop for HookTable {
    fn drop(&mut self) {
        self.clear();
    }
}
