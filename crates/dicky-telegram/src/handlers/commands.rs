use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, warn};

use dicky_core::domain::ChatId;

use crate::router::AppState;

pub const GREETING: &str = "Hi! My name is Dicky. I'm your English assistant and cat (obviously).\n\
Send me a new word or a phrase and I will translate it for you.\n\
I was created by @senatorous, send him my best regards by the way.\n";

/// Command name from `/cmd@botname args...`, lowercased. Arguments are not used.
fn parse_command(text: &str) -> String {
    let first = text.split_whitespace().next().unwrap_or("");

    first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Reply text for a command, or `None` when the command is not ours.
fn command_reply(cmd: &str) -> Option<&'static str> {
    match cmd {
        "start" | "help" => Some(GREETING),
        _ => None,
    }
}

pub async fn handle_command(text: &str, chat_id: i64, state: Arc<AppState>) -> ResponseResult<()> {
    let cmd = parse_command(text);

    let Some(reply) = command_reply(&cmd) else {
        debug!(chat_id, cmd = %cmd, "ignoring unknown command");
        return Ok(());
    };

    if let Err(e) = state.messenger.send_text(ChatId(chat_id), reply).await {
        warn!(chat_id, cmd = %cmd, error = %e, "failed to answer command");
    }
    Ok(())
}
