//! Request/response shapes exchanged with the remote authority.
//!
//! The authority is a single async call per operation; these are the
//! values those calls return. Field names follow the authority's
//! camelCase contract.

use serde::{Deserialize, Serialize};

/// Acknowledgement of a `setTarget` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTargetAck {
    /// Whether the authority accepted the command.
    pub success: bool,
    /// The target the authority now holds.
    pub target: f64,
    /// Authority clock at acknowledgement (Unix ms).
    pub server_ts: u64,
    /// Set when the authority flagged a conflict explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<bool>,
}

impl SetTargetAck {
    /// Build a clean acknowledgement echoing `target`.
    pub fn accepted(target: f64, server_ts: u64) -> Self {
        Self {
            success: true,
            target,
            server_ts,
            conflict: None,
        }
    }

    /// Whether this acknowledgement disagrees with what was requested.
    ///
    /// Either the authority said so, or the value it holds differs from
    /// the requested one.
    pub fn diverges_from(&self, requested: f64) -> bool {
        self.conflict == Some(true) || self.target != requested
    }
}

/// Authoritative device state returned by `fetchState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteState {
    /// Measured temperature.
    pub current_temp: f64,
    /// Target the authority holds. Informational only on the client.
    pub target_temp: f64,
    /// When the reading was taken (Unix ms).
    pub last_updated: u64,
}
