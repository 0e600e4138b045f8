//! Commands queued for delivery to the remote authority.

use serde::{Deserialize, Serialize};

use crate::CommandId;

/// The kind of a queued command.
///
/// Only setpoint changes exist today; the tag is kept so coalescing and
/// flush ordering can be expressed per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    /// Change the device's target setpoint.
    SetTarget,
}

impl CommandKind {
    /// Whether a newer command of this kind replaces a queued one.
    ///
    /// For `SetTarget` only the latest intent matters, so at most one is
    /// ever queued.
    pub fn coalesces(&self) -> bool {
        match self {
            CommandKind::SetTarget => true,
        }
    }
}

/// A user intent waiting to be acknowledged by the remote authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Unique per command instance.
    pub id: CommandId,
    /// What the command does.
    #[serde(rename = "type")]
    pub kind: CommandKind,
    /// The intended target value.
    pub payload: f64,
    /// Creation time in Unix milliseconds. The authority uses it for
    /// tie-breaking; the client never does.
    pub client_timestamp: u64,
    /// Failed delivery attempts so far.
    pub attempts: u32,
}

impl Command {
    /// Create a `SetTarget` command with a fresh id and zero attempts.
    pub fn set_target(value: f64, client_timestamp: u64) -> Self {
        Self {
            id: CommandId::new(),
            kind: CommandKind::SetTarget,
            payload: value,
            client_timestamp,
            attempts: 0,
        }
    }
}
