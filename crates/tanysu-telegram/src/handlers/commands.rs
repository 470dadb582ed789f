use std::sync::Arc;

use teloxide::prelude::*;
use tracing::warn;

use tanysu_core::service::Participant;

use crate::router::AppState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Start,
}

/// Recognized bot commands; anything else is relayed like ordinary text.
pub(crate) fn parse_command(text: &str) -> Option<Command> {
    // Telegram may send `/cmd@botname arg1 ...`
    let first = text.trim().split_whitespace().next()?;
    let cmd = first.strip_prefix('/')?.split('@').next()?.to_lowercase();
    match cmd.as_str() {
        "start" | "hello" => Some(Command::Start),
        _ => None,
    }
}

pub(crate) async fn handle_command(
    cmd: &Command,
    participant: &Participant,
    state: &Arc<AppState>,
) -> ResponseResult<()> {
    let result = match cmd {
        Command::Start => state.service.on_start(participant).await,
    };
    if let Err(e) = result {
        warn!(user = %participant.user, ?cmd, "command failed: {e}");
    }
    Ok(())
}
