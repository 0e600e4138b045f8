//! Remote authority abstraction for setpoint-sync.
//!
//! The remote authority is the service that owns the device's real
//! setpoint. The engine only depends on its contract:
//! - `set_target()` transmits one command and returns an acknowledgement
//! - `fetch_state()` reads the authoritative sensor state
//!
//! Latency and failure are the implementation's business. The engine
//! treats every error uniformly as "transport error, command stays queued".
//!
//! # Example
//!
//! ```ignore
//! let authority = MockAuthority::new();
//! authority.force_conflict_once();
//! let ack = authority.set_target(24.0, now_millis()).await?;
//! assert_eq!(ack.target, 26.0);
//! ```

mod mock;
mod simulated;

pub use mock::{MockAuthority, SetTargetCall};
pub use simulated::{SimulatedAuthority, SimulatorConfig};

use async_trait::async_trait;
use setpoint_sync_types::{RemoteState, SetTargetAck};
use thiserror::Error;

/// Offset the test doubles add to the requested target when forcing a conflict.
pub const FORCED_CONFLICT_OFFSET: f64 = 2.0;

/// Remote authority errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// The request did not reach the authority or no reply came back.
    #[error("network error: {0}")]
    Network(String),

    /// The authority replied but did not accept the command.
    #[error("rejected by authority: {0}")]
    Rejected(String),

    /// No reply within the configured request timeout.
    #[error("request timed out")]
    Timeout,
}

/// Contract of the service that owns the device's setpoint.
///
/// Implementations handle the underlying call mechanism
/// (HTTP, device link, simulation, mock).
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Ask the authority to adopt `target`.
    ///
    /// `client_ts` is the command's creation time, for server-side
    /// tie-breaking.
    async fn set_target(&self, target: f64, client_ts: u64) -> Result<SetTargetAck, AuthorityError>;

    /// Read the authoritative device state.
    async fn fetch_state(&self) -> Result<RemoteState, AuthorityError>;
}
