//! # sync-client
//!
//! Offline-first sync engine for setpoint-sync.
//!
//! This is the library that applications use to control a device setpoint
//! through an unreliable link.
//!
//! ## Features
//!
//! - **Optimistic Updates**: The requested value is visible before any I/O
//! - **Coalescing Queue**: Only the latest pending setpoint is ever sent
//! - **Client-Wins Reconciliation**: Divergent acknowledgements are counted, never applied
//! - **Authority Abstraction**: Pluggable remote authority (simulated, mock)
//! - **Pure State Store**: Uses sync-core for side-effect-free transitions
//!
//! ## Example
//!
//! ```ignore
//! use setpoint_sync_client::{EngineConfig, SimulatedAuthority, SimulatorConfig, SyncEngine};
//!
//! let engine = SyncEngine::new(
//!     EngineConfig::default(),
//!     SimulatedAuthority::new(SimulatorConfig::default()),
//! );
//!
//! // Works offline too; the command waits in the queue
//! engine.set_connectivity(true).await;
//! engine.request_target(21.0).await;
//!
//! // Reconnect flushes the queue
//! engine.set_connectivity(false).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod authority;
pub mod engine;
pub mod retry;

pub use authority::{
    AuthorityError, MockAuthority, RemoteAuthority, SetTargetCall, SimulatedAuthority,
    SimulatorConfig, FORCED_CONFLICT_OFFSET,
};
pub use engine::{DispatchOutcome, EngineConfig, FlushOutcome, RequestOutcome, SyncEngine};
pub use retry::spawn_retry_task;
pub use setpoint_sync_core::{RetryPolicy, ThermostatState};
