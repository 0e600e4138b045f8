//! Render the thermostat state.

use anyhow::{Context, Result};
use setpoint_sync_core::ThermostatState;

/// Render a snapshot as human-readable lines.
pub fn render(state: &ThermostatState) -> String {
    let mut lines = vec![
        format!("Current: {:.1}°C", state.current_temp),
        format!("Target:  {:.1}°C", state.target_temp),
        format!(
            "Mode:    {}{}",
            if state.is_offline { "OFFLINE" } else { "ONLINE" },
            if state.is_syncing { " (syncing...)" } else { "" }
        ),
    ];

    if state.has_pending() {
        let payloads: Vec<String> = state
            .command_queue
            .iter()
            .map(|command| format!("{:.1} (attempts: {})", command.payload, command.attempts))
            .collect();
        lines.push(format!(
            "Pending: {} [{}]",
            state.pending_count(),
            payloads.join(", ")
        ));
    } else {
        lines.push("Pending: none".to_string());
    }

    if let Some(error) = &state.last_sync_error {
        lines.push(format!("Error:   {} (type 'retry' to try again)", error));
    }
    if state.conflict_count > 0 {
        lines.push(format!("Conflicts resolved: {}", state.conflict_count));
    }

    lines.join("\n")
}

/// Render a snapshot as a single JSON line.
pub fn render_json(state: &ThermostatState) -> Result<String> {
    serde_json::to_string(state).context("Failed to serialize state")
}

/// Render in the selected format.
pub fn render_as(state: &ThermostatState, json: bool) -> Result<String> {
    if json {
        render_json(state)
    } else {
        Ok(render(state))
    }
}
