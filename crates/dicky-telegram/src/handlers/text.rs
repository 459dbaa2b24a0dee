use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{info, warn};

use dicky_core::domain::ChatId;

use crate::router::AppState;

pub async fn handle_text(text: &str, chat_id: i64, state: Arc<AppState>) -> ResponseResult<()> {
    info!(chat_id, "text message received");

    match state
        .handler
        .handle_text(state.messenger.as_ref(), ChatId(chat_id), text)
        .await
    {
        Ok(outcome) => info!(chat_id, ?outcome, "message handled"),
        // Transport trouble while replying; the dispatcher keeps running.
        Err(e) => warn!(chat_id, error = %e, "failed to deliver reply"),
    }

    Ok(())
}
