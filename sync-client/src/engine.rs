//! SyncEngine - the main interface for setpoint-sync.
//!
//! This module provides [`SyncEngine`], which applies user intent
//! optimistically, queues it, delivers it to the remote authority and
//! reconciles the acknowledgement.
//!
//! # Architecture
//!
//! SyncEngine keeps the thermostat snapshot from sync-core behind a
//! `watch` channel and only ever changes it through the pure reducer. The
//! I/O happens here, via the [`RemoteAuthority`] trait.
//!
//! ```text
//! Presentation → SyncEngine → RemoteAuthority → Network
//!      ↑              ↓
//!      └──── sync-core (pure state store)
//! ```
//!
//! Dispatches are serialized by a single gate, so at most one command is
//! in flight and `is_syncing` reflects exactly that one.
//!
//! # Example
//!
//! ```ignore
//! use setpoint_sync_client::{EngineConfig, MockAuthority, SyncEngine};
//!
//! let engine = SyncEngine::new(EngineConfig::default(), MockAuthority::new());
//!
//! let pending = engine.request_target(24.0);
//! assert_eq!(engine.snapshot().target_temp, 24.0); // before any await
//! pending.await;
//! ```

use setpoint_sync_core::{Action, RetryPolicy, ThermostatState};
use setpoint_sync_types::{now_millis, Command, CommandKind, RemoteState, SetTargetAck};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

use crate::authority::{AuthorityError, RemoteAuthority};

/// Configuration for SyncEngine.
///
/// The default has no request timeout, never abandons a command and does
/// not retry on its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on a single authority call. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// When to give up on a command and how long to back off.
    pub retry: RetryPolicy,
    /// Whether [`spawn_retry_task`](crate::spawn_retry_task) should flush
    /// failed commands automatically.
    pub auto_retry: bool,
}

impl EngineConfig {
    /// Set the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enable or disable automatic retry.
    pub fn with_auto_retry(mut self, enabled: bool) -> Self {
        self.auto_retry = enabled;
        self
    }
}

/// How a single dispatch settled.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Delivered; the authority holds the requested value.
    Acknowledged,
    /// Delivered, but the authority reported a different value. The
    /// requested value stays authoritative locally.
    Conflict {
        /// What the client asked for.
        requested: f64,
        /// What the authority acknowledged.
        acknowledged: f64,
    },
    /// Not delivered; the command stays queued.
    Failed {
        /// Why the call failed.
        error: AuthorityError,
        /// Failed attempts so far, including this one.
        attempts: u32,
    },
    /// Not delivered, and the retry policy gave up; the command was dropped.
    Abandoned {
        /// Why the last call failed.
        error: AuthorityError,
        /// Failed attempts in total.
        attempts: u32,
    },
    /// The command was no longer queued (replaced by a newer one or
    /// already delivered), so nothing was sent.
    Superseded,
}

impl DispatchOutcome {
    /// Whether the authority acknowledged the command.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Acknowledged | Self::Conflict { .. })
    }
}

/// What [`SyncEngine::request_target`] did after the optimistic update.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// Offline: the command waits in the queue for the next flush.
    Queued,
    /// Online: the command was dispatched immediately.
    Dispatched(DispatchOutcome),
}

/// Summary of one [`SyncEngine::flush_queue`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Commands the authority acknowledged (conflicts included).
    pub acknowledged: usize,
    /// Commands that failed and stayed queued.
    pub failed: usize,
    /// Commands dropped by the retry policy.
    pub abandoned: usize,
    /// Commands not sent: superseded, or behind a failed command of the same kind.
    pub skipped: usize,
    /// Queue length after the flush.
    pub remaining: usize,
}

impl FlushOutcome {
    /// Whether the queue was empty when the flush finished.
    pub fn is_drained(&self) -> bool {
        self.remaining == 0
    }
}

/// The offline-first sync engine.
///
/// Owns the state store, the remote authority handle and the dispatch gate.
pub struct SyncEngine<A: RemoteAuthority> {
    config: EngineConfig,
    authority: A,
    state: watch::Sender<ThermostatState>,
    dispatch_gate: Mutex<()>,
}

impl<A: RemoteAuthority> SyncEngine<A> {
    /// Create a new SyncEngine with the process-start state.
    pub fn new(config: EngineConfig, authority: A) -> Self {
        let (state, _) = watch::channel(ThermostatState::new());
        Self {
            config,
            authority,
            state,
            dispatch_gate: Mutex::new(()),
        }
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> ThermostatState {
        self.state.borrow().clone()
    }

    /// Receive every state change, for re-rendering.
    pub fn subscribe(&self) -> watch::Receiver<ThermostatState> {
        self.state.subscribe()
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get a reference to the remote authority (for testing).
    pub fn authority(&self) -> &A {
        &self.authority
    }

    /// Apply actions as one atomic store update and return a value read
    /// from the resulting state.
    fn update<R: Default>(
        &self,
        actions: impl IntoIterator<Item = Action>,
        read: impl FnOnce(&ThermostatState) -> R,
    ) -> R {
        let mut result = R::default();
        self.state.send_modify(|state| {
            *state = std::mem::take(state).reduce_all(actions);
            result = read(state);
        });
        result
    }

    fn apply(&self, actions: impl IntoIterator<Item = Action>) {
        self.update(actions, |_| ());
    }

    /// Request a new target setpoint.
    ///
    /// The optimistic update happens when this method is called, before
    /// the returned future is polled: `target_temp` is set and the command
    /// is queued (replacing any pending setpoint change) in one store
    /// update. The future then dispatches the command if online.
    ///
    /// A failure never rolls `target_temp` back.
    pub fn request_target(&self, value: f64) -> impl Future<Output = RequestOutcome> + '_ {
        let command = Command::set_target(value, now_millis());
        let offline = self.update(
            [Action::SetTargetTemp(value), Action::Enqueue(command.clone())],
            |state| state.is_offline,
        );

        tracing::debug!(
            "Target {} requested (command {}, offline: {})",
            value,
            command.id,
            offline
        );

        async move {
            if offline {
                return RequestOutcome::Queued;
            }
            RequestOutcome::Dispatched(self.dispatch(command).await)
        }
    }

    /// Send one command to the authority and reconcile the result.
    ///
    /// Waits for any in-flight dispatch to settle first. The command is
    /// re-read from the queue under the gate; if it is gone, nothing is sent.
    pub async fn dispatch(&self, command: Command) -> DispatchOutcome {
        let _gate = self.dispatch_gate.lock().await;

        let queued = self.state.borrow().command_queue.get(&command.id).cloned();
        let Some(command) = queued else {
            tracing::debug!("Command {} no longer queued, not sending", command.id);
            return DispatchOutcome::Superseded;
        };

        self.apply([Action::SetSyncing(true)]);

        let (outcome, mut actions) = match self.send(&command).await {
            Ok(ack) => reconcile(&command, &ack),
            Err(error) => self.settle_failure(&command, error),
        };

        actions.push(Action::SetSyncing(false));
        self.apply(actions);
        outcome
    }

    async fn send(&self, command: &Command) -> Result<SetTargetAck, AuthorityError> {
        let ack = self
            .with_timeout(
                self.authority
                    .set_target(command.payload, command.client_timestamp),
            )
            .await?;

        if !ack.success {
            return Err(AuthorityError::Rejected(format!(
                "target {} not accepted",
                command.payload
            )));
        }
        Ok(ack)
    }

    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = Result<T, AuthorityError>>,
    ) -> Result<T, AuthorityError> {
        match self.config.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| AuthorityError::Timeout)?,
            None => call.await,
        }
    }

    fn settle_failure(
        &self,
        command: &Command,
        error: AuthorityError,
    ) -> (DispatchOutcome, Vec<Action>) {
        let attempts = command.attempts.saturating_add(1);

        if self.config.retry.is_exhausted(attempts) {
            tracing::warn!(
                "Abandoning command {} after {} attempts: {}",
                command.id,
                attempts,
                error
            );
            let message = format!("abandoned after {} attempts: {}", attempts, error);
            return (
                DispatchOutcome::Abandoned { error, attempts },
                vec![
                    Action::Dequeue(command.id),
                    Action::SetLastError(Some(message)),
                ],
            );
        }

        tracing::warn!(
            "Failed to deliver command {} (attempt {}): {}",
            command.id,
            attempts,
            error
        );
        let message = error.to_string();
        (
            DispatchOutcome::Failed { error, attempts },
            vec![
                Action::RecordAttempt(command.id),
                Action::SetLastError(Some(message)),
            ],
        )
    }

    /// Dispatch every queued command, in insertion order, one at a time.
    ///
    /// A failed command stays queued and holds back later commands of the
    /// same kind; commands of other kinds still go out.
    pub async fn flush_queue(&self) -> FlushOutcome {
        let queued: Vec<Command> = self.state.borrow().command_queue.iter().cloned().collect();
        let mut outcome = FlushOutcome::default();

        if queued.is_empty() {
            return outcome;
        }

        tracing::info!("Flushing {} queued command(s)", queued.len());

        let mut halted: HashSet<CommandKind> = HashSet::new();
        for command in queued {
            if halted.contains(&command.kind) {
                outcome.skipped += 1;
                continue;
            }
            let kind = command.kind;
            match self.dispatch(command).await {
                settled if settled.is_delivered() => outcome.acknowledged += 1,
                DispatchOutcome::Superseded => outcome.skipped += 1,
                DispatchOutcome::Abandoned { .. } => outcome.abandoned += 1,
                _ => {
                    outcome.failed += 1;
                    halted.insert(kind);
                }
            }
        }

        outcome.remaining = self.state.borrow().pending_count();
        tracing::info!(
            "Flush finished: {} acknowledged, {} failed, {} remaining",
            outcome.acknowledged,
            outcome.failed,
            outcome.remaining
        );
        outcome
    }

    /// Read the authoritative sensor state.
    ///
    /// Only `current_temp` is taken from the reply. The authority's target
    /// is never applied, so a stale read cannot undo a newer user request.
    pub async fn fetch_remote_state(&self) -> Result<RemoteState, AuthorityError> {
        match self.with_timeout(self.authority.fetch_state()).await {
            Ok(remote) => {
                tracing::debug!("Fetched current temperature {}", remote.current_temp);
                self.apply([Action::SetCurrentTemp(remote.current_temp)]);
                Ok(remote)
            }
            Err(error) => {
                tracing::warn!("Failed to fetch state: {}", error);
                self.apply([Action::SetLastError(Some(error.to_string()))]);
                Err(error)
            }
        }
    }

    /// Switch connectivity mode.
    ///
    /// The flag flips when this method is called. Going online with
    /// commands queued flushes them; the returned future performs that
    /// flush and yields its summary.
    pub fn set_connectivity(
        &self,
        offline: bool,
    ) -> impl Future<Output = Option<FlushOutcome>> + '_ {
        let pending = self.update([Action::SetOffline(offline)], |state| state.has_pending());

        tracing::info!(
            "Connectivity set to {} ({} pending)",
            if offline { "offline" } else { "online" },
            pending
        );

        async move {
            if offline || !pending {
                return None;
            }
            Some(self.flush_queue().await)
        }
    }

    /// Drop every queued command without sending it.
    ///
    /// `target_temp` keeps the last requested value.
    pub fn clear_queue(&self) {
        tracing::info!("Discarding {} queued command(s)", self.state.borrow().pending_count());
        self.apply([Action::ClearQueue, Action::SetLastError(None)]);
    }
}

/// Actions for an acknowledged command.
///
/// Client wins: the acknowledged value is never written to `target_temp`.
/// A divergent acknowledgement is only counted.
fn reconcile(command: &Command, ack: &SetTargetAck) -> (DispatchOutcome, Vec<Action>) {
    let mut actions = vec![Action::Dequeue(command.id), Action::SetLastError(None)];

    if ack.diverges_from(command.payload) {
        tracing::warn!(
            "Conflict detected: requested {}, authority returned {}. Keeping client value.",
            command.payload,
            ack.target
        );
        actions.push(Action::IncrementConflictCount);
        return (
            DispatchOutcome::Conflict {
                requested: command.payload,
                acknowledged: ack.target,
            },
            actions,
        );
    }

    tracing::debug!("Command {} acknowledged", command.id);
    (DispatchOutcome::Acknowledged, actions)
}
