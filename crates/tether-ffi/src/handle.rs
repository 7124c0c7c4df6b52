//! Owned foreign handles
//!
//! A [`Handle`] is the single owner of one foreign object. It is
//! move-only and calls the matching destructor exactly once, when dropped
//! or when [`Handle::release`] consumes it. A [`Borrowed`] view can be
//! copied freely but has no release path at all.
//!
//! The construction chain is loop → context → core → registry → node.
//! Constructors take the parent handle by reference, and every owner in
//! this workspace declares its handles newest-first so the compiler drops
//! them in reverse construction order.

use std::ffi::CString;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::rc::Rc;

use tether_core::{HandleKind, ObjectId, TetherError, TetherResult};

use crate::backend::Backend;
use crate::library::Library;
use crate::sys::*;

/// A kind of foreign object together with its destructor
pub trait ForeignKind: 'static {
    type Raw;
    const KIND: HandleKind;

    /// # Safety
    ///
    /// `raw` must be live and owned by the caller; it is dangling afterwards.
    unsafe fn destroy(backend: &dyn Backend, raw: *mut Self::Raw);
}

/// Event loop kind
pub enum MainLoop {}
/// Context kind
pub enum Context {}
/// Server connection kind
pub enum Core {}
/// Registry proxy kind
pub enum Registry {}
/// Bound node proxy kind
pub enum Node {}

impl ForeignKind for MainLoop {
    type Raw = RawMainLoop;
    const KIND: HandleKind = HandleKind::MainLoop;

    unsafe fn destroy(backend: &dyn Backend, raw: *mut RawMainLoop) {
        backend.main_loop_destroy(raw);
    }
}

impl ForeignKind for Context {
    type Raw = RawContext;
    const KIND: HandleKind = HandleKind::Context;

    unsafe fn destroy(backend: &dyn Backend, raw: *mut RawContext) {
        backend.context_destroy(raw);
    }
}

impl ForeignKind for Core {
    type Raw = RawCore;
    const KIND: HandleKind = HandleKind::Core;

    unsafe fn destroy(backend: &dyn Backend, raw: *mut RawCore) {
        let res = backend.core_disconnect(raw);
        if res < 0 {
            tracing::warn!(res, "core disconnect reported an error");
        }
    }
}

impl ForeignKind for Registry {
    type Raw = RawRegistry;
    const KIND: HandleKind = HandleKind::Registry;

    unsafe fn destroy(backend: &dyn Backend, raw: *mut RawRegistry) {
        backend.registry_destroy(raw);
    }
}

impl ForeignKind for Node {
    type Raw = RawProxy;
    const KIND: HandleKind = HandleKind::Node;

    unsafe fn destroy(backend: &dyn Backend, raw: *mut RawProxy) {
        backend.proxy_destroy(raw);
    }
}

/// Owning handle to a foreign object of kind `K`
pub struct Handle<K: ForeignKind> {
    raw: NonNull<K::Raw>,
    backend: Rc<dyn Backend>,
    _kind: PhantomData<K>,
}

impl<K: ForeignKind> Handle<K> {
    /// Take ownership of a pointer fresh out of a foreign constructor.
    ///
    /// # Safety
    ///
    /// `raw` must be null or a live object of kind `K` created by `backend`
    /// that nothing else owns.
    pub unsafe fn from_raw(backend: Rc<dyn Backend>, raw: *mut K::Raw) -> TetherResult<Self> {
        let Some(raw) = NonNull::new(raw) else {
            tracing::debug!(kind = %K::KIND, "foreign constructor returned null");
            return Err(TetherError::ForeignConstruction { kind: K::KIND });
        };
        tracing::trace!(kind = %K::KIND, ptr = ?raw, "acquired handle");
        Ok(Handle {
            raw,
            backend,
            _kind: PhantomData,
        })
    }

    pub fn as_ptr(&self) -> *mut K::Raw {
        self.raw.as_ptr()
    }

    /// Non-owning view of this handle
    pub fn borrow(&self) -> Borrowed<K> {
        Borrowed {
            raw: self.raw,
            _kind: PhantomData,
        }
    }

    pub fn backend(&self) -> &Rc<dyn Backend> {
        &self.backend
    }

    pub fn kind(&self) -> HandleKind {
        K::KIND
    }

    /// Destroy the foreign object now
    pub fn release(self) {
        drop(self);
    }
}

impl<K: ForeignKind> Drop for Handle<K> {
    fn drop(&mut self) {
        tracing::trace!(kind = %K::KIND, ptr = ?self.raw, "releasing handle");
        unsafe { K::destroy(self.backend.as_ref(), self.raw.as_ptr()) };
    }
}

impl<K: ForeignKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle<{}>({:p})", K::KIND, self.raw)
    }
}

impl Handle<MainLoop> {
    /// Create the event loop, the root of the chain.
    ///
    /// Fails with [`TetherError::NotInitialized`] unless a [`Library`] is
    /// alive, so no chain can start before init.
    pub fn new(backend: Rc<dyn Backend>) -> TetherResult<Self> {
        if !Library::is_initialized() {
            return Err(TetherError::NotInitialized);
        }
        let raw = unsafe { backend.main_loop_new() };
        unsafe { Self::from_raw(backend, raw) }
    }
}

impl Handle<Context> {
    /// Create a context driven by `main_loop`
    pub fn new(main_loop: &Handle<MainLoop>) -> TetherResult<Self> {
        let backend = Rc::clone(main_loop.backend());
        let raw = unsafe { backend.context_new(main_loop.as_ptr()) };
        unsafe { Self::from_raw(backend, raw) }
    }
}

impl Handle<Core> {
    /// Connect to the server through `context`.
    ///
    /// `remote_name` selects a server other than the default one.
    pub fn connect(context: &Handle<Context>, remote_name: Option<&str>) -> TetherResult<Self> {
        let remote = remote_name
            .map(CString::new)
            .transpose()
            .map_err(|_| TetherError::Config("remote name contains a NUL byte".into()))?;
        let remote_ptr = remote.as_ref().map_or(std::ptr::null(), |r| r.as_ptr());

        let backend = Rc::clone(context.backend());
        let raw = unsafe { backend.context_connect(context.as_ptr(), remote_ptr) };
        let core = unsafe { Self::from_raw(backend, raw)? };
        tracing::info!(remote = remote_name.unwrap_or("default"), "connected to server");
        Ok(core)
    }
}

impl Handle<Registry> {
    /// Obtain the registry proxy of `core`
    pub fn new(core: &Handle<Core>, version: u32) -> TetherResult<Self> {
        let backend = Rc::clone(core.backend());
        let raw = unsafe { backend.core_get_registry(core.as_ptr(), version) };
        unsafe { Self::from_raw(backend, raw) }
    }
}

impl Handle<Node> {
    /// Bind a proxy to the global `id` announced on `registry`.
    ///
    /// The registry is passed borrowed: the binding is made from inside
    /// registry callbacks, where only a non-owning view is available.
    pub fn bind(
        backend: &Rc<dyn Backend>,
        registry: Borrowed<Registry>,
        id: ObjectId,
        type_name: &str,
        version: u32,
    ) -> TetherResult<Self> {
        let type_name = CString::new(type_name)
            .map_err(|_| TetherError::Config("interface type contains a NUL byte".into()))?;
        let raw = unsafe {
            backend.registry_bind(registry.as_ptr(), id.0, type_name.as_ptr(), version)
        };
        unsafe { Self::from_raw(Rc::clone(backend), raw) }
    }
}

/// Non-owning view of a foreign object.
///
/// Valid only while the owning [`Handle`] is alive; that is a caller
/// contract, not something the type tracks.
pub struct Borrowed<K: ForeignKind> {
    raw: NonNull<K::Raw>,
    _kind: PhantomData<K>,
}

impl<K: ForeignKind> Borrowed<K> {
    pub fn as_ptr(self) -> *mut K::Raw {
        self.raw.as_ptr()
    }
}

impl<K: ForeignKind> Clone for Borrowed<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: ForeignKind> Copy for Borrowed<K> {}

impl<K: ForeignKind> PartialEq for Borrowed<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K: ForeignKind> Eq for Borrowed<K> {}

impl<K: ForeignKind> fmt::Debug for Borrowed<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Borrowed<{}>({:p})", K::KIND, self.raw)
    }
}
