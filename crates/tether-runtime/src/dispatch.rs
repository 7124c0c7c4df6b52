//! Event dispatcher
//!
//! The foreign loop calls these trampolines synchronously from inside
//! its pump call. Each one copies what it needs out of the callback frame,
//! then routes it:
//! - registry `global` / `global_remove` become `Added` / `Removed`, and
//!   manage the node binding for interfaces the config asks for
//! - node `info` becomes `Updated`
//! - core `done` completes the pending sync marker
//! - core `error` goes to the error list
//!
//! Panics are caught here: unwinding across the foreign frame is not
//! allowed. The payload is parked on the session, the loop is asked to
//! quit, and the pump call re-raises it.

use std::ffi::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};

use tether_core::{CoreError, ObjectId, PropertyDictionary, RegistryEvent, SequenceId};
use tether_ffi::sys::*;
use tether_ffi::{copy_dict, copy_string, Handle, HookTable, Node};

use crate::session::Session;

/// A bound node proxy and the hooks listening on it
pub struct NodeBinding {
    hooks: HookTable,
    proxy: Handle<Node>,
}

impl NodeBinding {
    pub fn proxy(&self) -> &Handle<Node> {
        &self.proxy
    }

    pub fn hooks(&self) -> usize {
        self.hooks.len()
    }
}

pub(crate) fn core_events<S: Clone>() -> CoreEvents {
    CoreEvents {
        version: EVENTS_VERSION,
        done: Some(on_core_done::<S>),
        error: Some(on_core_error::<S>),
    }
}

pub(crate) fn registry_events<S: Clone>() -> RegistryEvents {
    RegistryEvents {
        version: EVENTS_VERSION,
        global: Some(on_global::<S>),
        global_remove: Some(on_global_remove::<S>),
    }
}

pub(crate) fn node_events<S: Clone>() -> NodeEvents {
    NodeEvents {
        version: EVENTS_VERSION,
        info: Some(on_node_info::<S>),
    }
}

unsafe fn session_from<'a, S>(data: *mut c_void) -> &'a Session<S> {
    &*(data as *const Session<S>)
}

unsafe extern "C" fn on_global<S: Clone>(
    data: *mut c_void,
    id: u32,
    _permissions: u32,
    type_: *const c_char,
    version: u32,
    props: *const RawDict,
) {
    let session = session_from::<S>(data);
    let type_name = copy_string(type_).unwrap_or_default();
    let props = copy_dict(props);
    session.guarded(|| session.global_added(ObjectId(id), type_name, version, props));
}

unsafe extern "C" fn on_global_remove<S: Clone>(data: *mut c_void, id: u32) {
    let session = session_from::<S>(data);
    session.guarded(|| session.global_removed(ObjectId(id)));
}

unsafe extern "C" fn on_node_info<S: Clone>(data: *mut c_void, info: *const RawNodeInfo) {
    let session = session_from::<S>(data);
    let Some(info) = info.as_ref() else {
        return;
    };
    if info.change_mask & (NODE_CHANGE_MASK_PROPS | NODE_CHANGE_MASK_PARAMS) == 0 {
        tracing::trace!(id = info.id, mask = info.change_mask, "node info without property change");
        return;
    }
    let id = ObjectId(info.id);
    let props = copy_dict(info.props);
    session.guarded(|| session.apply(RegistryEvent::Updated { id, props }));
}

unsafe extern "C" fn on_core_done<S: Clone>(data: *mut c_void, id: u32, seq: c_int) {
    let session = session_from::<S>(data);
    session.guarded(|| session.marker_done(ObjectId(id), SequenceId(seq)));
}

unsafe extern "C" fn on_core_error<S: Clone>(
    data: *mut c_void,
    id: u32,
    seq: c_int,
    res: c_int,
    message: *const c_char,
) {
    let session = session_from::<S>(data);
    let error = CoreError {
        id: ObjectId(id),
        seq: SequenceId(seq),
        code: res,
        message: copy_string(message).unwrap_or_default(),
    };
    session.guarded(|| session.core_error(error));
}

impl<S: Clone> Session<S> {
    /// Run `f`, parking any panic until the pump returns
    fn guarded(&self, f: impl FnOnce()) {
        if self.panic.borrow().is_some() {
            return;
        }
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
            tracing::error!("event handler panicked; stopping the loop");
            *self.panic.borrow_mut() = Some(payload);
            self.quit();
        }
    }

    fn global_added(
        &self,
        id: ObjectId,
        type_name: String,
        version: u32,
        props: PropertyDictionary,
    ) {
        let bind = self.config.binds(&type_name);
        self.apply(RegistryEvent::Added {
            id,
            type_name: type_name.clone(),
            props,
        });
        if bind {
            self.bind_node(id, &type_name, version);
        }
    }

    fn bind_node(&self, id: ObjectId, type_name: &str, announced: u32) {
        let version = announced.min(self.config.node_version);
        let proxy = match Handle::<Node>::bind(&self.backend, self.registry, id, type_name, version)
        {
            Ok(proxy) => proxy,
            Err(err) => {
                tracing::warn!(%id, %err, "could not bind node; it will not report updates");
                return;
            }
        };

        let mut hooks = HookTable::new();
        hooks.push(unsafe { proxy.attach(&self.node_events, self.as_data()) });
        tracing::debug!(%id, "bound node");
        self.nodes
            .borrow_mut()
            .insert(id, NodeBinding { hooks, proxy });
    }

    fn global_removed(&self, id: ObjectId) {
        let binding = self.nodes.borrow_mut().remove(&id);
        if binding.is_some() {
            tracing::debug!(%id, "releasing node binding");
        }
        drop(binding);
        self.apply(RegistryEvent::Removed { id });
    }

    fn marker_done(&self, id: ObjectId, seq: SequenceId) {
        if id.is_core() && self.pending.get() == Some(seq) {
            tracing::debug!(%seq, "sync marker completed");
            self.pending.set(None);
            self.quit();
        } else {
            tracing::debug!(%id, %seq, pending = ?self.pending.get(), "ignoring stale completion");
        }
    }

    fn core_error(&self, error: CoreError) {
        tracing::warn!(id = %error.id, seq = %error.seq, code = error.code, "server error: {}", error.message);
        self.errors.push(error);
    }
}
