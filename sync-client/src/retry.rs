//! Background retry task for failed commands.
//!
//! Waits until the engine is online and idle with a failed command still
//! queued, backs off, then flushes the queue.

use crate::authority::RemoteAuthority;
use crate::engine::SyncEngine;
use setpoint_sync_core::ThermostatState;
use std::sync::Arc;

/// Spawn a background retry task.
///
/// Does nothing unless `auto_retry` is enabled in the engine config.
/// Returns a handle that can be used to abort the task.
pub fn spawn_retry_task<A>(engine: Arc<SyncEngine<A>>) -> tokio::task::JoinHandle<()>
where
    A: RemoteAuthority + 'static,
{
    tokio::spawn(async move {
        if !engine.config().auto_retry {
            tracing::info!("Retry task disabled");
            return;
        }

        let policy = engine.config().retry.clone();
        tracing::info!(
            "Retry task started (base delay: {:?}, max attempts: {:?})",
            policy.base_delay,
            policy.max_attempts
        );

        let mut updates = engine.subscribe();
        let mut attempt: u32 = 0;

        loop {
            let open = updates.wait_for(needs_retry).await.is_ok();
            if !open {
                break;
            }

            attempt = attempt.saturating_add(1);
            let delay = policy.backoff(attempt);
            tracing::debug!("Retry {} in {:?}", attempt, delay);
            tokio::time::sleep(delay).await;

            // Gone offline or already flushed while we slept
            if !needs_retry(&engine.snapshot()) {
                attempt = 0;
                continue;
            }

            let outcome = engine.flush_queue().await;
            if outcome.is_drained() {
                tracing::info!("Retry: queue drained after {} attempt(s)", attempt);
                attempt = 0;
            }
        }
    })
}

fn needs_retry(state: &ThermostatState) -> bool {
    !state.is_offline && !state.is_syncing && state.has_pending() && state.last_sync_error.is_some()
}
