//! Scripted walkthrough of offline-first behavior.
//!
//! Plays a fixed sequence of session commands: changes made offline
//! coalesce into one command, reconnecting flushes it, and a forced
//! conflict keeps the requested value.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::AsyncWrite;

use super::session::{say, Session, SessionCommand};
use super::Engine;

/// The demo script, in order.
pub const SCRIPT: &[SessionCommand] = &[
    SessionCommand::Status,
    SessionCommand::Offline,
    SessionCommand::Set(21.0),
    SessionCommand::Set(23.0),
    SessionCommand::Status,
    SessionCommand::Online,
    SessionCommand::Conflict,
    SessionCommand::Set(24.0),
    SessionCommand::Fetch,
    SessionCommand::Status,
];

/// Play the script through `session`, echoing each command.
pub async fn play<W>(session: &Session, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for command in SCRIPT {
        say(out, &format!("> {}", echo(command))).await?;
        session.execute(*command, out).await?;
    }
    Ok(())
}

/// Run the demo on stdout.
pub async fn run(engine: Arc<Engine>, json: bool) -> Result<()> {
    let session = Session::new(engine, json);
    let mut stdout = tokio::io::stdout();
    play(&session, &mut stdout).await
}

fn echo(command: &SessionCommand) -> String {
    match command {
        SessionCommand::Set(value) => format!("set {}", value),
        other => format!("{:?}", other).to_ascii_lowercase(),
    }
}
