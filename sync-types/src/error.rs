//! Error types for setpoint-sync types.

use thiserror::Error;

/// Errors produced when building or parsing setpoint-sync values.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A string could not be parsed as a command id
    #[error("invalid command id: {0}")]
    InvalidCommandId(String),
}
