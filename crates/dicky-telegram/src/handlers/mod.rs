//! Telegram update handlers.
//!
//! Commands are answered here; plain text goes to the core message handler,
//! serialized per chat. Other message kinds are ignored.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::debug;

use crate::router::AppState;

mod commands;
mod text;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;

    let Some(text) = msg.text() else {
        debug!(chat_id, "ignoring non-text message");
        return Ok(());
    };

    if text.starts_with('/') {
        return commands::handle_command(text, chat_id, state).await;
    }

    let locks = state.chat_locks.clone();
    locks
        .run_locked(chat_id, text::handle_text(text, chat_id, state))
        .await
}
