use std::{collections::HashMap, future::Future, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::Mutex;
use tracing::{info, warn};

use dicky_core::{config::Config, handler::MessageHandler, messaging::port::MessagingPort};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<MessageHandler>,
    pub messenger: Arc<dyn MessagingPort>,
    pub chat_locks: Arc<ChatLocks>,
}

/// One inbound message at a time per chat; chats run independently.
///
/// Entries only live while a chat has work running or queued.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    /// Run `fut` while holding the lock for `chat_id`.
    pub async fn run_locked<T>(&self, chat_id: i64, fut: impl Future<Output = T>) -> T {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let out = {
            let _guard = Arc::clone(&lock).lock_owned().await;
            fut.await
        };
        drop(lock);

        // Clones are only taken under the map lock, so a count of one means
        // nobody else is running or waiting on this chat.
        let mut map = self.inner.lock().await;
        if map
            .get(&chat_id)
            .is_some_and(|l| Arc::strong_count(l) == 1)
        {
            map.remove(&chat_id);
        }

        out
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

pub async fn run_polling(cfg: Arc<Config>, handler: Arc<MessageHandler>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "bot started"),
        Err(e) => warn!(error = %e, "could not fetch bot identity"),
    }
    info!(
        model = %cfg.openai_model,
        max_input_chars = cfg.max_input_chars,
        "waiting for Telegram messages"
    );

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let state = Arc::new(AppState {
        handler,
        messenger,
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let tree = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, tree)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
