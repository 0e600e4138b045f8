//! Mock authority for testing.
//!
//! Allows queueing acknowledgements, injecting failures and conflicts,
//! holding calls in flight, and capturing calls for verification.

use super::{AuthorityError, RemoteAuthority, FORCED_CONFLICT_OFFSET};
use async_trait::async_trait;
use setpoint_sync_core::INITIAL_TEMP;
use setpoint_sync_types::{RemoteState, SetTargetAck};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// One recorded `set_target` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetTargetCall {
    /// Requested target.
    pub target: f64,
    /// Client timestamp sent with the request.
    pub client_ts: u64,
}

/// Mock authority for testing.
///
/// Clones share state, so a test can keep one handle while the engine
/// owns another.
#[derive(Debug, Clone)]
pub struct MockAuthority {
    inner: Arc<Mutex<MockAuthorityInner>>,
    held: Arc<watch::Sender<bool>>,
}

#[derive(Debug)]
struct MockAuthorityInner {
    set_target_calls: Vec<SetTargetCall>,
    fetch_calls: usize,
    ack_queue: VecDeque<SetTargetAck>,
    fail_next_set_target: Option<String>,
    fail_next_fetch: Option<String>,
    unreachable: bool,
    force_conflict: bool,
    current_temp: f64,
    server_target: f64,
    clock: u64,
}

impl Default for MockAuthorityInner {
    fn default() -> Self {
        Self {
            set_target_calls: Vec::new(),
            fetch_calls: 0,
            ack_queue: VecDeque::new(),
            fail_next_set_target: None,
            fail_next_fetch: None,
            unreachable: false,
            force_conflict: false,
            current_temp: INITIAL_TEMP,
            server_target: INITIAL_TEMP,
            clock: 0,
        }
    }
}

impl MockAuthorityInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

impl Default for MockAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthority {
    /// Create a new mock authority that accepts everything.
    pub fn new() -> Self {
        let (held, _) = watch::channel(false);
        Self {
            inner: Arc::new(Mutex::new(MockAuthorityInner::default())),
            held: Arc::new(held),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockAuthorityInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an acknowledgement to be returned by the next `set_target()` call.
    pub fn queue_ack(&self, ack: SetTargetAck) {
        self.lock().ack_queue.push_back(ack);
    }

    /// Get all `set_target()` calls received so far.
    pub fn set_target_calls(&self) -> Vec<SetTargetCall> {
        self.lock().set_target_calls.clone()
    }

    /// Get the last `set_target()` call.
    pub fn last_set_target(&self) -> Option<SetTargetCall> {
        self.lock().set_target_calls.last().copied()
    }

    /// Number of `fetch_state()` calls received so far.
    pub fn fetch_calls(&self) -> usize {
        self.lock().fetch_calls
    }

    /// Cause the next `set_target()` to fail with the given error.
    pub fn fail_next_set_target(&self, error: &str) {
        self.lock().fail_next_set_target = Some(error.to_string());
    }

    /// Cause the next `fetch_state()` to fail with the given error.
    pub fn fail_next_fetch(&self, error: &str) {
        self.lock().fail_next_fetch = Some(error.to_string());
    }

    /// Make every call fail until switched back.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Answer the next `set_target()` with a divergent target and the
    /// conflict flag set.
    pub fn force_conflict_once(&self) {
        self.lock().force_conflict = true;
    }

    /// Set the temperature reported by `fetch_state()`.
    pub fn set_current_temp(&self, temp: f64) {
        self.lock().current_temp = temp;
    }

    /// Target the authority currently holds.
    pub fn server_target(&self) -> f64 {
        self.lock().server_target
    }

    /// Keep subsequent calls in flight until [`release`](Self::release).
    pub fn hold(&self) {
        self.held.send_replace(true);
    }

    /// Let held calls complete.
    pub fn release(&self) {
        self.held.send_replace(false);
    }

    async fn wait_while_held(&self) {
        let mut held = self.held.subscribe();
        // The sender lives in self, so this only ends when released.
        let _ = held.wait_for(|held| !*held).await;
    }

    /// Clear all state (calls, queued acks, injected failures).
    pub fn reset(&self) {
        *self.lock() = MockAuthorityInner::default();
        self.release();
    }
}

#[async_trait]
impl RemoteAuthority for MockAuthority {
    async fn set_target(&self, target: f64, client_ts: u64) -> Result<SetTargetAck, AuthorityError> {
        self.lock()
            .set_target_calls
            .push(SetTargetCall { target, client_ts });

        self.wait_while_held().await;

        let mut inner = self.lock();

        // Check for forced failure
        if inner.unreachable {
            return Err(AuthorityError::Network("authority unreachable".into()));
        }
        if let Some(error) = inner.fail_next_set_target.take() {
            return Err(AuthorityError::Network(error));
        }

        let ack = if let Some(ack) = inner.ack_queue.pop_front() {
            ack
        } else if std::mem::take(&mut inner.force_conflict) {
            SetTargetAck {
                conflict: Some(true),
                ..SetTargetAck::accepted(target + FORCED_CONFLICT_OFFSET, inner.tick())
            }
        } else {
            SetTargetAck::accepted(target, inner.tick())
        };

        if ack.success {
            inner.server_target = ack.target;
        }
        Ok(ack)
    }

    async fn fetch_state(&self) -> Result<RemoteState, AuthorityError> {
        let mut inner = self.lock();
        inner.fetch_calls += 1;

        if inner.unreachable {
            return Err(AuthorityError::Network("authority unreachable".into()));
        }
        if let Some(error) = inner.fail_next_fetch.take() {
            return Err(AuthorityError::Network(error));
        }

        Ok(RemoteState {
            current_temp: inner.current_temp,
            target_temp: inner.server_target,
            last_updated: inner.tick(),
        })
    }
}
