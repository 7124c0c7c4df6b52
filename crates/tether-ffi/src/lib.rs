#![allow(clippy::missing_safety_doc)]
//! Tether FFI - Foreign handle lifecycle
//!
//! Ownership-tracked wrappers over the raw objects of an event-loop based
//! C library: the loop, context, server connection, registry and bound
//! proxies, plus the listener hooks attached to them. All foreign calls go
//! through the [`Backend`] trait.

pub mod backend;
pub mod dict;
pub mod error;
pub mod handle;
pub mod hook;
pub mod library;
pub mod sys;

pub use backend::Backend;
pub use dict::copy_dict;
pub use error::{check, copy_string};
pub use handle::*;
pub use hook::{Hook, HookTable, Listenable};
pub use library::Library;
