//! Simulated authority for demos.
//!
//! Behaves like a flaky remote thermostat service: every call sleeps for
//! a random latency and fails with a configurable probability. Used by
//! the CLI when there is no real device to talk to.

use super::{AuthorityError, RemoteAuthority, FORCED_CONFLICT_OFFSET};
use async_trait::async_trait;
use rand::Rng;
use setpoint_sync_core::INITIAL_TEMP;
use setpoint_sync_types::{now_millis, RemoteState, SetTargetAck};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Latency, failure and sensor settings for [`SimulatedAuthority`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Latency of `set_target` calls.
    pub set_latency: RangeInclusive<Duration>,
    /// Latency of `fetch_state` calls.
    pub fetch_latency: RangeInclusive<Duration>,
    /// Probability (0.0-1.0) that a `set_target` call fails.
    pub set_failure_rate: f64,
    /// Probability (0.0-1.0) that a `fetch_state` call fails.
    pub fetch_failure_rate: f64,
    /// Range the reported current temperature is drawn from.
    pub current_temp: RangeInclusive<f64>,
    /// Target reported by `fetch_state`.
    pub reported_target: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            set_latency: Duration::from_millis(500)..=Duration::from_millis(2000),
            fetch_latency: Duration::from_millis(300)..=Duration::from_millis(1000),
            set_failure_rate: 0.1,
            fetch_failure_rate: 0.05,
            current_temp: 20.0..=25.0,
            reported_target: INITIAL_TEMP,
        }
    }
}

impl SimulatorConfig {
    /// A simulator that answers instantly and never fails.
    pub fn reliable() -> Self {
        Self {
            set_latency: Duration::ZERO..=Duration::ZERO,
            fetch_latency: Duration::ZERO..=Duration::ZERO,
            set_failure_rate: 0.0,
            fetch_failure_rate: 0.0,
            ..Self::default()
        }
    }
}

/// A remote authority with random latency and failures.
#[derive(Debug, Default)]
pub struct SimulatedAuthority {
    config: SimulatorConfig,
    force_conflict: AtomicBool,
}

/// Outcome of one simulated call, drawn before sleeping.
struct Draw {
    latency: Duration,
    fails: bool,
}

impl SimulatedAuthority {
    /// Create a simulator with the given settings.
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            force_conflict: AtomicBool::new(false),
        }
    }

    /// The simulator's settings.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Answer the next `set_target()` with a divergent target and the
    /// conflict flag set.
    pub fn force_conflict_once(&self) {
        self.force_conflict.store(true, Ordering::SeqCst);
    }

    fn draw(latency: &RangeInclusive<Duration>, failure_rate: f64) -> Draw {
        let mut rng = rand::thread_rng();
        let (low, high) = (*latency.start(), *latency.end());
        let latency = if high > low {
            rng.gen_range(low..=high)
        } else {
            low
        };
        Draw {
            latency,
            fails: rng.gen_bool(failure_rate.clamp(0.0, 1.0)),
        }
    }

    fn read_sensor(&self) -> f64 {
        let (low, high) = (*self.config.current_temp.start(), *self.config.current_temp.end());
        if high > low {
            rand::thread_rng().gen_range(low..=high)
        } else {
            low
        }
    }
}

#[async_trait]
impl RemoteAuthority for SimulatedAuthority {
    async fn set_target(&self, target: f64, _client_ts: u64) -> Result<SetTargetAck, AuthorityError> {
        let draw = Self::draw(&self.config.set_latency, self.config.set_failure_rate);
        tokio::time::sleep(draw.latency).await;

        if draw.fails {
            return Err(AuthorityError::Network(
                "failed to set target temperature".into(),
            ));
        }

        if self.force_conflict.swap(false, Ordering::SeqCst) {
            return Ok(SetTargetAck {
                conflict: Some(true),
                ..SetTargetAck::accepted(target + FORCED_CONFLICT_OFFSET, now_millis())
            });
        }

        Ok(SetTargetAck::accepted(target, now_millis()))
    }

    async fn fetch_state(&self) -> Result<RemoteState, AuthorityError> {
        let draw = Self::draw(&self.config.fetch_latency, self.config.fetch_failure_rate);
        tokio::time::sleep(draw.latency).await;

        if draw.fails {
            return Err(AuthorityError::Network("failed to fetch state".into()));
        }

        Ok(RemoteState {
            current_temp: self.read_sensor(),
            target_temp: self.config.reported_target,
            last_updated: now_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_failing() -> SimulatorConfig {
        SimulatorConfig {
            set_failure_rate: 1.0,
            fetch_failure_rate: 1.0,
            ..SimulatorConfig::reliable()
        }
    }

    #[test]
    fn default_config_matches_demo_service() {
        let config = SimulatorConfig::default();
        assert_eq!(*config.set_latency.start(), Duration::from_millis(500));
        assert_eq!(*config.set_latency.end(), Duration::from_millis(2000));
        assert_eq!(config.set_failure_rate, 0.1);
        assert_eq!(config.fetch_failure_rate, 0.05);
    }

    #[tokio::test]
    async fn reliable_simulator_echoes_target() {
        let authority = SimulatedAuthority::new(SimulatorConfig::reliable());

        let ack = authority.set_target(23.5, 1).await.unwrap();

        assert!(ack.success);
        assert_eq!(ack.target, 23.5);
        assert!(!ack.diverges_from(23.5));
    }

    #[tokio::test]
    async fn forced_conflict_returns_offset_target_once() {
        let authority = SimulatedAuthority::new(SimulatorConfig::reliable());
        authority.force_conflict_once();

        let ack = authority.set_target(24.0, 1).await.unwrap();
        assert_eq!(ack.target, 26.0);
        assert_eq!(ack.conflict, Some(true));

        let ack = authority.set_target(24.0, 2).await.unwrap();
        assert_eq!(ack.target, 24.0);
    }

    #[tokio::test]
    async fn fetch_reads_sensor_within_range() {
        let authority = SimulatedAuthority::new(SimulatorConfig::reliable());

        for _ in 0..20 {
            let state = authority.fetch_state().await.unwrap();
            assert!((20.0..=25.0).contains(&state.current_temp));
            assert_eq!(state.target_temp, INITIAL_TEMP);
        }
    }

    #[tokio::test]
    async fn full_failure_rate_always_fails() {
        let authority = SimulatedAuthority::new(always_failing());

        assert!(matches!(
            authority.set_target(24.0, 1).await,
            Err(AuthorityError::Network(_))
        ));
        assert!(authority.fetch_state().await.is_err());
    }

    #[tokio::test]
    async fn failure_does_not_consume_forced_conflict() {
        let authority = SimulatedAuthority::new(always_failing());
        authority.force_conflict_once();
        let _ = authority.set_target(24.0, 1).await;

        assert!(authority.force_conflict.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn latency_is_applied() {
        let config = SimulatorConfig {
            set_latency: Duration::from_millis(500)..=Duration::from_millis(500),
            ..SimulatorConfig::reliable()
        };
        let authority = SimulatedAuthority::new(config);

        let started = tokio::time::Instant::now();
        authority.set_target(21.0, 1).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[test]
    fn out_of_range_failure_rate_is_clamped() {
        let draw = SimulatedAuthority::draw(&(Duration::ZERO..=Duration::ZERO), 7.0);
        assert!(draw.fails);
        let draw = SimulatedAuthority::draw(&(Duration::ZERO..=Duration::ZERO), -1.0);
        assert!(!draw.fails);
    }
}
