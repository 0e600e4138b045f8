//! Thermostat state store for setpoint-sync.
//!
//! This module provides a pure, side-effect-free reducer over the single
//! thermostat state snapshot. Each [`Action`] names one transition; the
//! reducer takes the previous state and an action and produces the next
//! state.
//!
//! Nothing here talks to the remote authority. The sync engine in
//! sync-client decides which actions to apply and when.

use serde::{Deserialize, Serialize};
use setpoint_sync_types::{Command, CommandId};

use crate::queue::CommandQueue;

/// Initial measured and target temperature at process start.
pub const INITIAL_TEMP: f64 = 22.0;

/// The thermostat snapshot - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatState {
    /// Last measured value, only updated by successful state fetches.
    pub current_temp: f64,
    /// The user's most recent requested setpoint.
    pub target_temp: f64,
    /// Connectivity mode, toggled by the user/operator only.
    pub is_offline: bool,
    /// True while a command is in flight to the authority.
    pub is_syncing: bool,
    /// Commands not yet acknowledged, in insertion order.
    pub command_queue: CommandQueue,
    /// Last transport failure, cleared when a command is delivered.
    pub last_sync_error: Option<String>,
    /// Acknowledgements that disagreed with the requested value.
    pub conflict_count: u64,
}

impl ThermostatState {
    /// Create the process-start state.
    pub fn new() -> Self {
        Self {
            current_temp: INITIAL_TEMP,
            target_temp: INITIAL_TEMP,
            is_offline: false,
            is_syncing: false,
            command_queue: CommandQueue::new(),
            last_sync_error: None,
            conflict_count: 0,
        }
    }

    /// Apply an action and return the new state.
    ///
    /// This is a pure function - no side effects. Actions that refer to a
    /// command no longer in the queue leave the state unchanged.
    pub fn reduce(mut self, action: Action) -> Self {
        match action {
            Action::SetTargetTemp(value) => self.target_temp = value,
            Action::SetCurrentTemp(value) => self.current_temp = value,
            Action::SetOffline(offline) => self.is_offline = offline,
            Action::SetSyncing(syncing) => self.is_syncing = syncing,
            Action::Enqueue(command) => self.command_queue.enqueue(command),
            Action::Dequeue(id) => {
                self.command_queue.remove(&id);
            }
            Action::RecordAttempt(id) => {
                self.command_queue.record_attempt(&id);
            }
            Action::SetLastError(error) => self.last_sync_error = error,
            Action::IncrementConflictCount => {
                self.conflict_count = self.conflict_count.saturating_add(1)
            }
            Action::ClearQueue => self.command_queue.clear(),
        }
        self
    }

    /// Apply several actions in order.
    pub fn reduce_all(self, actions: impl IntoIterator<Item = Action>) -> Self {
        actions.into_iter().fold(self, Self::reduce)
    }

    /// Number of commands waiting for acknowledgement.
    pub fn pending_count(&self) -> usize {
        self.command_queue.len()
    }

    /// Check if there is anything to flush.
    pub fn has_pending(&self) -> bool {
        !self.command_queue.is_empty()
    }
}

impl Default for ThermostatState {
    fn default() -> Self {
        Self::new()
    }
}

/// Transitions of the state store.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Record the user's requested setpoint.
    SetTargetTemp(f64),
    /// Record a measured temperature from the authority.
    SetCurrentTemp(f64),
    /// Switch connectivity mode.
    SetOffline(bool),
    /// Mark a dispatch as started or settled.
    SetSyncing(bool),
    /// Queue a command, coalescing by kind.
    Enqueue(Command),
    /// Drop an acknowledged or abandoned command.
    Dequeue(CommandId),
    /// Count a failed delivery attempt.
    RecordAttempt(CommandId),
    /// Set or clear the surfaced sync error.
    SetLastError(Option<String>),
    /// Count a divergent acknowledgement.
    IncrementConflictCount,
    /// Drop every queued command.
    ClearQueue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_initial_values() {
        let state = ThermostatState::new();

        assert_eq!(state.current_temp, 22.0);
        assert_eq!(state.target_temp, 22.0);
        assert!(!state.is_offline);
        assert!(!state.is_syncing);
        assert!(state.command_queue.is_empty());
        assert!(state.last_sync_error.is_none());
        assert_eq!(state.conflict_count, 0);
    }

    #[test]
    fn set_target_only_touches_target() {
        let state = ThermostatState::new().reduce(Action::SetTargetTemp(25.0));

        assert_eq!(state.target_temp, 25.0);
        assert_eq!(state.current_temp, 22.0);
    }

    #[test]
    fn set_current_only_touches_current() {
        let state = ThermostatState::new()
            .reduce(Action::SetTargetTemp(25.0))
            .reduce(Action::SetCurrentTemp(19.5));

        assert_eq!(state.current_temp, 19.5);
        assert_eq!(state.target_temp, 25.0);
    }

    #[test]
    fn flags_toggle() {
        let state = ThermostatState::new()
            .reduce(Action::SetOffline(true))
            .reduce(Action::SetSyncing(true));
        assert!(state.is_offline);
        assert!(state.is_syncing);

        let state = state
            .reduce(Action::SetOffline(false))
            .reduce(Action::SetSyncing(false));
        assert!(!state.is_offline);
        assert!(!state.is_syncing);
    }

    #[test]
    fn enqueue_coalesces_set_target() {
        let state = ThermostatState::new().reduce_all([
            Action::Enqueue(Command::set_target(21.0, 1)),
            Action::Enqueue(Command::set_target(23.0, 2)),
        ]);

        assert_eq!(state.pending_count(), 1);
        assert_eq!(state.command_queue.iter().next().unwrap().payload, 23.0);
    }

    #[test]
    fn dequeue_removes_by_id() {
        let cmd = Command::set_target(21.0, 1);
        let id = cmd.id;

        let state = ThermostatState::new()
            .reduce(Action::Enqueue(cmd))
            .reduce(Action::Dequeue(id));

        assert!(!state.has_pending());
    }

    #[test]
    fn dequeue_unknown_id_is_no_op() {
        let before = ThermostatState::new().reduce(Action::Enqueue(Command::set_target(21.0, 1)));
        let after = before.clone().reduce(Action::Dequeue(CommandId::new()));

        assert_eq!(before, after);
    }

    #[test]
    fn record_attempt_bumps_queued_command() {
        let cmd = Command::set_target(21.0, 1);
        let id = cmd.id;

        let state = ThermostatState::new().reduce_all([
            Action::Enqueue(cmd),
            Action::RecordAttempt(id),
            Action::RecordAttempt(id),
        ]);

        assert_eq!(state.command_queue.get(&id).unwrap().attempts, 2);
    }

    #[test]
    fn last_error_sets_and_clears() {
        let state = ThermostatState::new().reduce(Action::SetLastError(Some("boom".into())));
        assert_eq!(state.last_sync_error.as_deref(), Some("boom"));

        let state = state.reduce(Action::SetLastError(None));
        assert!(state.last_sync_error.is_none());
    }

    #[test]
    fn conflict_count_increments_by_one() {
        let state = ThermostatState::new()
            .reduce(Action::IncrementConflictCount)
            .reduce(Action::IncrementConflictCount);

        assert_eq!(state.conflict_count, 2);
    }

    #[test]
    fn clear_queue_empties_queue_only() {
        let state = ThermostatState::new().reduce_all([
            Action::SetTargetTemp(24.0),
            Action::Enqueue(Command::set_target(24.0, 1)),
            Action::ClearQueue,
        ]);

        assert!(!state.has_pending());
        assert_eq!(state.target_temp, 24.0);
    }

    #[test]
    fn reducer_is_deterministic() {
        let cmd = Command::set_target(21.0, 1);
        let actions = vec![
            Action::SetTargetTemp(21.0),
            Action::Enqueue(cmd),
            Action::SetSyncing(true),
            Action::IncrementConflictCount,
        ];

        let a = ThermostatState::new().reduce_all(actions.clone());
        let b = ThermostatState::new().reduce_all(actions);

        assert_eq!(a, b);
    }

    #[test]
    fn snapshot_serializes_with_camel_case_fields() {
        let json = serde_json::to_value(ThermostatState::new()).unwrap();

        assert_eq!(json["targetTemp"], 22.0);
        assert_eq!(json["isOffline"], false);
        assert!(json["commandQueue"].is_array());
        assert!(json["lastSyncError"].is_null());
    }
}
