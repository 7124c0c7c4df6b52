//! The foreign library seam
//!
//! [`Backend`] is the complete set of foreign entry points the binding
//! calls. A binding to a concrete C library implements it with direct
//! `extern "C"` calls; the test harness implements it with a scripted
//! fake. The method signatures keep the C shape (raw pointers, integer
//! return codes) so that an implementation is a thin forwarding layer.
//!
//! # Safety
//!
//! Every pointer argument must have come from the matching constructor on
//! the same backend and must not have been destroyed yet. Callbacks fire
//! only from inside [`Backend::main_loop_run`], on the calling thread.

use std::ffi::{c_char, c_int, c_void};

use crate::sys::*;

pub trait Backend {
    /// Library-wide initialisation. Called once before any constructor.
    fn init(&self);

    /// Library-wide teardown. Called once after every handle is released.
    fn deinit(&self);

    /// Version string of the headers the backend was compiled against
    fn headers_version(&self) -> *const c_char;

    /// Version string of the library loaded at runtime
    fn library_version(&self) -> *const c_char;

    // Main loop

    unsafe fn main_loop_new(&self) -> *mut RawMainLoop;
    unsafe fn main_loop_destroy(&self, main_loop: *mut RawMainLoop);

    /// Pump the loop until [`Backend::main_loop_quit`] is called
    unsafe fn main_loop_run(&self, main_loop: *mut RawMainLoop) -> c_int;

    /// Ask a running loop to return. Calling it repeatedly is harmless.
    unsafe fn main_loop_quit(&self, main_loop: *mut RawMainLoop) -> c_int;

    // Context and connection

    unsafe fn context_new(&self, main_loop: *mut RawMainLoop) -> *mut RawContext;
    unsafe fn context_destroy(&self, context: *mut RawContext);

    /// Connect to the server. `remote_name` may be null for the default.
    unsafe fn context_connect(
        &self,
        context: *mut RawContext,
        remote_name: *const c_char,
    ) -> *mut RawCore;
    unsafe fn core_disconnect(&self, core: *mut RawCore) -> c_int;

    /// Issue a sync marker. Returns the sequence number of the marker, or
    /// a negative error code.
    unsafe fn core_sync(&self, core: *mut RawCore, id: u32, seq: c_int) -> c_int;

    unsafe fn core_add_listener(
        &self,
        core: *mut RawCore,
        hook: *mut RawHook,
        events: *const CoreEvents,
        data: *mut c_void,
    );

    // Registry and bound proxies

    unsafe fn core_get_registry(&self, core: *mut RawCore, version: u32) -> *mut RawRegistry;
    unsafe fn registry_destroy(&self, registry: *mut RawRegistry);

    unsafe fn registry_add_listener(
        &self,
        registry: *mut RawRegistry,
        hook: *mut RawHook,
        events: *const RegistryEvents,
        data: *mut c_void,
    );

    /// Bind a proxy to global `id`. Returns null on failure.
    unsafe fn registry_bind(
        &self,
        registry: *mut RawRegistry,
        id: u32,
        type_: *const c_char,
        version: u32,
    ) -> *mut RawProxy;
    unsafe fn proxy_destroy(&self, proxy: *mut RawProxy);

    unsafe fn node_add_listener(
        &self,
        node: *mut RawProxy,
        hook: *mut RawHook,
        events: *const NodeEvents,
        data: *mut c_void,
    );

    // Hooks

    /// Unlink a hook from whatever list it is on. No-op when unlinked.
    unsafe fn hook_remove(&self, hook: *mut RawHook);
}
