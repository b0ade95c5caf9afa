//! Core types and trait definitions for the Hangar AD/SB reconciliation
//! engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the pure pieces of the engine (reference matching, recurrence, comparison)
//! and the traits through which the engine talks to storage and to the
//! external catalog, registry, and evidence collaborators.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod alert;
pub mod audit;
pub mod compare;
pub mod error;
pub mod evidence;
pub mod knowledge;
pub mod recurrence;
pub mod reference;
pub mod requirement;
pub mod source;
pub mod store;

pub use error::{Error, Result};
