//! Tether Runtime - Event dispatch and synchronisation
//!
//! This crate turns the foreign loop's callback stream into something an
//! application can reason about:
//! 1. Build the handle chain (loop, context, core, registry)
//! 2. Install dispatcher hooks on the core and registry
//! 3. Translate each callback into a registry event or a control event
//! 4. Fold registry events into a single state slot via the update function
//! 5. Buffer server errors
//! 6. Offer a barrier that drains the stream and returns a consistent snapshot

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod instance;
pub mod logging;
pub mod session;
pub mod state;

pub use config::*;
pub use errors::*;
pub use instance::*;
pub use session::*;
pub use state::*;
