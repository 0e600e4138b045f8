//! # sync-types
//!
//! Shared types for setpoint-sync, the offline-first device-control client.
//!
//! This crate provides the foundational types used across all setpoint-sync crates:
//! - [`CommandId`], [`now_millis`] - Identity and timing
//! - [`Command`], [`CommandKind`] - Queued user intents
//! - [`SetTargetAck`], [`RemoteState`] - Remote authority responses
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod command;
mod error;
mod ids;
mod messages;

pub use command::{Command, CommandKind};
pub use error::SyncError;
pub use ids::{now_millis, CommandId};
pub use messages::{RemoteState, SetTargetAck};
