//! Telegram adapter (teloxide).
//!
//! This crate implements the `dicky-core` MessagingPort over the Telegram Bot API
//! and routes incoming updates to the core message handler.

use async_trait::async_trait;

use teloxide::prelude::*;

pub mod handlers;
pub mod router;

use dicky_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, MessagingCapabilities},
    },
    Result,
};

/// Telegram's per-message limit.
///
/// Telegram counts UTF-16 code units while chunks are sized in chars, so text
/// heavy in astral-plane characters (emoji) can still exceed it.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_chat_actions: true,
            max_message_len: TELEGRAM_MESSAGE_LIMIT,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        // Plain text: model output is not escaped for any parse mode. Telegram rejects
        // texts over 4096 UTF-16 units with a request error, surfaced as `Transport`.
        let msg = self
            .bot
            .send_message(Self::tg_chat(chat_id), text.to_string())
            .await
            .map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let tg_action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
        };
        self.bot
            .send_chat_action(Self::tg_chat(chat_id), tg_action)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }
}
