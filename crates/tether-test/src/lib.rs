//! Tether Test Harness - Fake foreign library and protocol checks
//!
//! This crate provides:
//! - A scripted fake backend standing in for the foreign library
//! - A journal of every foreign call, in order
//! - Detection of lifecycle violations (dangling hooks, out-of-order
//!   destruction, double destroy, unbalanced init)

pub mod fake;
pub mod journal;

#[cfg(test)]
mod lifecycle;

pub use fake::*;
pub use journal::*;
