//! Raw C-ABI types shared with the foreign library
//!
//! These mirror the layout the foreign headers declare. Nothing in this
//! module owns memory; ownership lives in [`crate::handle`] and
//! [`crate::hook`].

use std::ffi::{c_char, c_int, c_void};

macro_rules! opaque {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[repr(C)]
            pub struct $name {
                _private: [u8; 0],
            }
        )*
    };
}

opaque! {
    /// Foreign main loop
    RawMainLoop,
    /// Foreign library context
    RawContext,
    /// Foreign core proxy (the server connection)
    RawCore,
    /// Foreign registry proxy
    RawRegistry,
    /// Any other foreign proxy (bound objects)
    RawProxy,
}

/// Caller-allocated listener record.
///
/// The foreign library links this into the owner's listener list, so it
/// must not move while attached.
#[repr(C)]
pub struct RawHook {
    pub link: [*mut c_void; 2],
    pub cb: [*const c_void; 2],
    pub removed: Option<unsafe extern "C" fn(hook: *mut RawHook)>,
    pub priv_: *mut c_void,
}

impl RawHook {
    pub fn zeroed() -> Self {
        RawHook {
            link: [std::ptr::null_mut(); 2],
            cb: [std::ptr::null(); 2],
            removed: None,
            priv_: std::ptr::null_mut(),
        }
    }
}

/// One key/value pair of a foreign dictionary
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawDictItem {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// Foreign dictionary, valid only for the duration of the callback
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawDict {
    pub flags: u32,
    pub n_items: u32,
    pub items: *const RawDictItem,
}

/// Node info change mask bits
pub const NODE_CHANGE_MASK_INPUT_PORTS: u64 = 1 << 0;
pub const NODE_CHANGE_MASK_OUTPUT_PORTS: u64 = 1 << 1;
pub const NODE_CHANGE_MASK_STATE: u64 = 1 << 2;
pub const NODE_CHANGE_MASK_PROPS: u64 = 1 << 3;
pub const NODE_CHANGE_MASK_PARAMS: u64 = 1 << 4;

/// Node info as delivered by the node info event
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawNodeInfo {
    pub id: u32,
    pub max_input_ports: u32,
    pub max_output_ports: u32,
    pub change_mask: u64,
    pub n_input_ports: u32,
    pub n_output_ports: u32,
    pub state: c_int,
    pub error: *const c_char,
    pub props: *const RawDict,
}

/// Current version of the event tables below
pub const EVENTS_VERSION: u32 = 0;

/// Callback for a new global on the registry
pub type GlobalCallback = unsafe extern "C" fn(
    data: *mut c_void,
    id: u32,
    permissions: u32,
    type_: *const c_char,
    version: u32,
    props: *const RawDict,
);

/// Callback for a removed global
pub type GlobalRemoveCallback = unsafe extern "C" fn(data: *mut c_void, id: u32);

/// Callback for a completed sync marker
pub type DoneCallback = unsafe extern "C" fn(data: *mut c_void, id: u32, seq: c_int);

/// Callback for a server-reported error
pub type ErrorCallback = unsafe extern "C" fn(
    data: *mut c_void,
    id: u32,
    seq: c_int,
    res: c_int,
    message: *const c_char,
);

/// Callback for node info changes
pub type NodeInfoCallback = unsafe extern "C" fn(data: *mut c_void, info: *const RawNodeInfo);

/// Registry event table
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RegistryEvents {
    pub version: u32,
    pub global: Option<GlobalCallback>,
    pub global_remove: Option<GlobalRemoveCallback>,
}

/// Core event table
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CoreEvents {
    pub version: u32,
    pub done: Option<DoneCallback>,
    pub error: Option<ErrorCallback>,
}

/// Node event table
#[repr(C)]
#[derive(Clone, Copy)]
pub struct NodeEvents {
    pub version: u32,
    pub info: Option<NodeInfoCallback>,
}
