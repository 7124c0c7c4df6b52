//! Tether Core - Fundamental types shared by the binding crates
//!
//! This crate defines the types that cross the boundary between the
//! foreign library and the host application:
//! - Identifiers (ObjectId, SequenceId, StateVersion)
//! - Registry events and copied-out property dictionaries
//! - Handle kinds and the error taxonomy

pub mod error;
pub mod event;
pub mod id;
pub mod kind;
pub mod props;

pub use error::*;
pub use event::*;
pub use id::*;
pub use kind::*;
pub use props::*;
