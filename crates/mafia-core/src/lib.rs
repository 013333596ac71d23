//! Core types and trait definitions for the mafia rules engine.
//!
//! This crate is deliberately free of async runtime dependencies. It holds the
//! role catalog, the roster, the stateless vote validator, the phase logs and
//! the narrow interfaces (message sinks, rename provider, storage) the engine
//! calls but does not implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod channel;
pub mod config;
pub mod error;
pub mod log;
pub mod player;
pub mod role;
pub mod roster;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod timing;
pub mod vote;

pub use error::{Error, Result};
