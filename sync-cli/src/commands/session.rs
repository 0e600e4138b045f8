//! Interactive thermostat session.
//!
//! Reads one command per line and drives the sync engine with it. The
//! optimistic target is printed before the dispatch completes, so the
//! latency of the simulated device is visible.

use anyhow::{Context, Result};
use setpoint_sync_client::{DispatchOutcome, FlushOutcome, RequestOutcome};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::status;
use super::Engine;

/// Setpoint change applied by `up` and `down`.
pub const STEP: f64 = 1.0;

const HELP: &str = "\
Commands:
  set <value>   request a target temperature
  up | down     change the target by one degree
  offline       simulate losing connectivity (changes are queued)
  online        restore connectivity and flush the queue
  retry         flush queued commands now
  fetch         read the current temperature from the device
  conflict      make the next acknowledgement disagree
  discard       drop queued commands without sending them
  status        show the current state
  help          show this help
  quit          leave the session";

/// One parsed session line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionCommand {
    /// Request a specific target.
    Set(f64),
    /// Raise the target by [`STEP`].
    Up,
    /// Lower the target by [`STEP`].
    Down,
    /// Switch to offline mode.
    Offline,
    /// Switch to online mode.
    Online,
    /// Flush the queue.
    Retry,
    /// Fetch remote state.
    Fetch,
    /// Force a conflict on the next acknowledgement.
    Conflict,
    /// Clear the queue.
    Discard,
    /// Print the state.
    Status,
    /// Print help.
    Help,
    /// End the session.
    Quit,
}

/// Line parse errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// Unrecognized command word.
    #[error("unknown command '{0}' (type 'help' for a list)")]
    Unknown(String),
    /// `set` without a value.
    #[error("'set' needs a temperature, e.g. 'set 21.5'")]
    MissingValue,
    /// `set` with something that is not a finite number.
    #[error("invalid temperature '{0}'")]
    InvalidValue(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<SessionCommand>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "set" => {
            let raw = words.next().ok_or(ParseError::MissingValue)?;
            match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => SessionCommand::Set(value),
                _ => return Err(ParseError::InvalidValue(raw.to_string())),
            }
        }
        "up" | "+" => SessionCommand::Up,
        "down" | "-" => SessionCommand::Down,
        "offline" => SessionCommand::Offline,
        "online" => SessionCommand::Online,
        "retry" => SessionCommand::Retry,
        "fetch" => SessionCommand::Fetch,
        "conflict" => SessionCommand::Conflict,
        "discard" => SessionCommand::Discard,
        "status" => SessionCommand::Status,
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Whether the session should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Stop.
    Quit,
}

/// A session bound to one engine.
pub struct Session {
    engine: Arc<Engine>,
    json: bool,
}

impl Session {
    /// Create a session. `json` selects the status format.
    pub fn new(engine: Arc<Engine>, json: bool) -> Self {
        Self { engine, json }
    }

    /// The engine this session drives.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Execute one command, writing feedback to `out`.
    pub async fn execute<W>(&self, command: SessionCommand, out: &mut W) -> Result<Flow>
    where
        W: AsyncWrite + Unpin,
    {
        match command {
            SessionCommand::Set(value) => self.request(value, out).await?,
            SessionCommand::Up => {
                let value = self.engine.snapshot().target_temp + STEP;
                self.request(value, out).await?
            }
            SessionCommand::Down => {
                let value = self.engine.snapshot().target_temp - STEP;
                self.request(value, out).await?
            }
            SessionCommand::Offline => {
                self.engine.set_connectivity(true).await;
                say(out, "Offline: changes will be queued").await?;
            }
            SessionCommand::Online => {
                let flush = self.engine.set_connectivity(false).await;
                say(out, "Online").await?;
                if let Some(flush) = flush {
                    say(out, &describe_flush(&flush)).await?;
                }
            }
            SessionCommand::Retry => {
                if self.engine.snapshot().has_pending() {
                    let flush = self.engine.flush_queue().await;
                    say(out, &describe_flush(&flush)).await?;
                } else {
                    say(out, "Nothing to retry").await?;
                }
            }
            SessionCommand::Fetch => match self.engine.fetch_remote_state().await {
                Ok(remote) => {
                    say(out, &format!("Current temperature {:.1}°C", remote.current_temp)).await?
                }
                Err(error) => say(out, &format!("Fetch failed: {}", error)).await?,
            },
            SessionCommand::Conflict => {
                self.engine.authority().force_conflict_once();
                say(out, "Next acknowledgement will report a different target").await?;
            }
            SessionCommand::Discard => {
                let dropped = self.engine.snapshot().pending_count();
                self.engine.clear_queue();
                say(out, &format!("Discarded {} queued command(s)", dropped)).await?;
            }
            SessionCommand::Status => {
                let rendered = status::render_as(&self.engine.snapshot(), self.json)?;
                say(out, &rendered).await?;
            }
            SessionCommand::Help => say(out, HELP).await?,
            SessionCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn request<W>(&self, value: f64, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let pending = self.engine.request_target(value);
        say(out, &format!("Target {:.1}°C", self.engine.snapshot().target_temp)).await?;

        let outcome = pending.await;
        say(out, &describe_request(value, &outcome, self.engine.snapshot().pending_count())).await
    }
}

/// Run the session until `quit` or end of input.
pub async fn run_with<R, W>(session: &Session, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        out.write_all(b"> ").await?;
        out.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                say(out, &error.to_string()).await?;
                continue;
            }
        };

        if session.execute(command, out).await? == Flow::Quit {
            break;
        }
    }
    Ok(())
}

/// Run an interactive session on stdin/stdout.
pub async fn run(engine: Arc<Engine>, json: bool) -> Result<()> {
    let session = Session::new(engine, json);
    let retry_task = setpoint_sync_client::spawn_retry_task(session.engine().clone());

    let mut stdout = tokio::io::stdout();
    say(&mut stdout, "Thermostat session. Type 'help' for commands.").await?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let result = run_with(&session, stdin, &mut stdout).await;

    retry_task.abort();
    result
}

pub(crate) async fn say<W>(out: &mut W, message: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(message.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

fn describe_request(value: f64, outcome: &RequestOutcome, pending: usize) -> String {
    match outcome {
        RequestOutcome::Queued => {
            format!("Queued {:.1}°C while offline ({} pending)", value, pending)
        }
        RequestOutcome::Dispatched(dispatch) => describe_dispatch(value, dispatch),
    }
}

fn describe_dispatch(value: f64, outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Acknowledged => format!("Synced {:.1}°C", value),
        DispatchOutcome::Conflict {
            requested,
            acknowledged,
        } => format!(
            "Conflict: device reported {:.1}°C, keeping {:.1}°C",
            acknowledged, requested
        ),
        DispatchOutcome::Failed { error, attempts } => format!(
            "Sync failed (attempt {}): {}. Kept in queue, type 'retry'",
            attempts, error
        ),
        DispatchOutcome::Abandoned { error, attempts } => {
            format!("Gave up after {} attempts: {}", attempts, error)
        }
        DispatchOutcome::Superseded => "Replaced by a newer setpoint".to_string(),
    }
}

fn describe_flush(flush: &FlushOutcome) -> String {
    let mut summary = format!(
        "Flushed: {} synced, {} failed, {} pending",
        flush.acknowledged, flush.failed, flush.remaining
    );
    if flush.abandoned > 0 {
        summary.push_str(&format!(", {} abandoned", flush.abandoned));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use setpoint_sync_client::{EngineConfig, SimulatedAuthority, SimulatorConfig, SyncEngine};

    fn session_with(simulator: SimulatorConfig) -> Session {
        let engine = SyncEngine::new(EngineConfig::default(), SimulatedAuthority::new(simulator));
        Session::new(Arc::new(engine), false)
    }

    fn reliable_session() -> Session {
        session_with(SimulatorConfig::reliable())
    }

    async fn run_script(session: &Session, script: &str) -> String {
        let mut out = Vec::new();
        run_with(session, script.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    // ===========================================
    // Parsing Tests
    // ===========================================

    #[test]
    fn parses_commands() {
        assert_eq!(parse_line("set 21.5"), Ok(Some(SessionCommand::Set(21.5))));
        assert_eq!(parse_line("  UP "), Ok(Some(SessionCommand::Up)));
        assert_eq!(parse_line("-"), Ok(Some(SessionCommand::Down)));
        assert_eq!(parse_line("offline"), Ok(Some(SessionCommand::Offline)));
        assert_eq!(parse_line("exit"), Ok(Some(SessionCommand::Quit)));
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   "), Ok(None));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse_line("set"), Err(ParseError::MissingValue));
        assert_eq!(
            parse_line("set warm"),
            Err(ParseError::InvalidValue("warm".into()))
        );
        assert_eq!(
            parse_line("set NaN"),
            Err(ParseError::InvalidValue("NaN".into()))
        );
        assert_eq!(
            parse_line("heat"),
            Err(ParseError::Unknown("heat".into()))
        );
    }

    // ===========================================
    // Session Tests
    // ===========================================

    #[tokio::test]
    async fn set_syncs_target() {
        let session = reliable_session();

        let output = run_script(&session, "set 24\n").await;

        assert!(output.contains("Target 24.0°C"));
        assert!(output.contains("Synced 24.0°C"));
        assert_eq!(session.engine().snapshot().target_temp, 24.0);
    }

    #[tokio::test]
    async fn up_and_down_step_from_target() {
        let session = reliable_session();

        run_script(&session, "up\nup\ndown\n").await;

        assert_eq!(session.engine().snapshot().target_temp, 22.0 + STEP);
    }

    #[tokio::test]
    async fn offline_changes_flush_on_reconnect() {
        let session = reliable_session();

        let output = run_script(&session, "offline\nset 21\nset 23\nonline\n").await;

        assert!(output.contains("Queued 23.0°C while offline (1 pending)"));
        assert!(output.contains("Flushed: 1 synced, 0 failed, 0 pending"));
        let state = session.engine().snapshot();
        assert!(!state.has_pending());
        assert_eq!(state.target_temp, 23.0);
    }

    #[tokio::test]
    async fn conflict_keeps_requested_value() {
        let session = reliable_session();

        let output = run_script(&session, "conflict\nset 24\n").await;

        assert!(output.contains("Conflict: device reported 26.0°C, keeping 24.0°C"));
        let state = session.engine().snapshot();
        assert_eq!(state.target_temp, 24.0);
        assert_eq!(state.conflict_count, 1);
    }

    #[tokio::test]
    async fn failure_is_reported_and_queued() {
        let session = session_with(SimulatorConfig {
            set_failure_rate: 1.0,
            ..SimulatorConfig::reliable()
        });

        let output = run_script(&session, "set 24\nretry\n").await;

        assert!(output.contains("Sync failed (attempt 1)"));
        assert!(output.contains("Flushed: 0 synced, 1 failed, 1 pending"));
        assert_eq!(session.engine().snapshot().target_temp, 24.0);
    }

    #[tokio::test]
    async fn fetch_reports_temperature() {
        let session = reliable_session();

        let output = run_script(&session, "fetch\n").await;

        assert!(output.contains("Current temperature"));
    }

    #[tokio::test]
    async fn discard_empties_queue() {
        let session = reliable_session();

        let output = run_script(&session, "offline\nset 19\ndiscard\nretry\n").await;

        assert!(output.contains("Discarded 1 queued command(s)"));
        assert!(output.contains("Nothing to retry"));
    }

    #[tokio::test]
    async fn quit_stops_reading() {
        let session = reliable_session();

        run_script(&session, "quit\nset 30\n").await;

        assert_eq!(session.engine().snapshot().target_temp, 22.0);
    }

    #[tokio::test]
    async fn bad_line_does_not_end_session() {
        let session = reliable_session();

        let output = run_script(&session, "heat\nset 20\n").await;

        assert!(output.contains("unknown command 'heat'"));
        assert!(output.contains("Synced 20.0°C"));
    }

    #[tokio::test]
    async fn json_status_is_machine_readable() {
        let engine = SyncEngine::new(
            EngineConfig::default(),
            SimulatedAuthority::new(SimulatorConfig::reliable()),
        );
        let session = Session::new(Arc::new(engine), true);

        let mut out = Vec::new();
        session.execute(SessionCommand::Status, &mut out).await.unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["targetTemp"], 22.0);
    }
}
