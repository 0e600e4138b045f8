//! # sync-core
//!
//! Pure logic for setpoint-sync (no I/O, instant tests).
//!
//! This crate implements the thermostat state store, the coalescing
//! command queue and the retry policy without any network or clock I/O,
//! enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (talking to the remote authority) is performed by
//! `sync-client`, which decides which [`Action`]s to apply and when.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod queue;
pub mod retry;
pub mod state;

pub use queue::CommandQueue;
pub use retry::RetryPolicy;
pub use state::{Action, ThermostatState, INITIAL_TEMP};
