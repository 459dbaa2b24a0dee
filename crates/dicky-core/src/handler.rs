//! Inbound text → completion → segmented replies.

use std::{sync::Arc, time::Duration};

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{
    completion::{CompletionClient, CompletionRequest},
    config::Config,
    domain::ChatId,
    errors::Error,
    messaging::{port::MessagingPort, types::ChatAction},
    prompt::{build_user_input, Preamble},
    segment::segment,
    Result,
};

/// Sent instead of an empty answer.
pub const EMPTY_ANSWER_NOTICE: &str = "Got an empty answer from model. Sad. Try another word.";

const MAX_ERROR_CHARS: usize = 200;
const TYPING_REFRESH: Duration = Duration::from_secs(4);

/// Handler knobs, taken from [`Config`] at startup.
#[derive(Clone, Debug)]
pub struct HandlerSettings {
    pub model: String,
    pub max_output_tokens: u32,
    pub max_input_chars: usize,
    pub message_limit: usize,
    pub completion_workers: usize,
}

impl HandlerSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            model: cfg.openai_model.clone(),
            max_output_tokens: cfg.max_output_tokens,
            max_input_chars: cfg.max_input_chars,
            message_limit: cfg.telegram_message_limit,
            completion_workers: cfg.completion_workers,
        }
    }
}

/// What happened to one inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Blank input; nothing was sent.
    Ignored,
    /// Input too long; the user got a notice and no completion call was made.
    Rejected,
    /// The answer was delivered in `chunks` messages.
    Answered { chunks: usize },
    /// The completion call failed; the user got an error description.
    Failed,
}

/// Stateless per-message orchestration.
///
/// Holds only read-only state plus the worker semaphore, so one instance is
/// shared by every chat.
pub struct MessageHandler {
    settings: HandlerSettings,
    preamble: Preamble,
    client: Arc<dyn CompletionClient>,
    workers: Arc<Semaphore>,
}

impl MessageHandler {
    pub fn new(
        settings: HandlerSettings,
        preamble: Preamble,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(settings.completion_workers.max(1)));
        Self {
            settings,
            preamble,
            client,
            workers,
        }
    }

    /// Handle one text message from `chat_id`, replying through `messenger`.
    ///
    /// Completion failures are reported to the user and yield
    /// [`HandleOutcome::Failed`]; only transport errors while replying are
    /// returned as `Err`.
    pub async fn handle_text(
        &self,
        messenger: &dyn MessagingPort,
        chat_id: ChatId,
        text: &str,
    ) -> Result<HandleOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(HandleOutcome::Ignored);
        }

        let len = text.chars().count();
        if len > self.settings.max_input_chars {
            info!(chat_id = chat_id.0, len, "rejecting oversized input");
            messenger
                .send_text(chat_id, &too_long_notice(self.settings.max_input_chars))
                .await?;
            return Ok(HandleOutcome::Rejected);
        }

        info!(chat_id = chat_id.0, len, "forwarding text to completion service");
        let answer = match self.complete_with_typing(messenger, chat_id, text).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(chat_id = chat_id.0, kind = err.kind(), error = %err, "completion failed");
                messenger.send_text(chat_id, &describe_failure(&err)).await?;
                return Ok(HandleOutcome::Failed);
            }
        };

        let answer = if answer.trim().is_empty() {
            EMPTY_ANSWER_NOTICE.to_string()
        } else {
            answer
        };

        let limit = self
            .settings
            .message_limit
            .min(messenger.capabilities().max_message_len)
            .max(1);
        let chunks = segment(&answer, limit);
        for chunk in &chunks {
            messenger.send_text(chat_id, chunk).await?;
        }

        debug!(chat_id = chat_id.0, chunks = chunks.len(), "answer delivered");
        Ok(HandleOutcome::Answered {
            chunks: chunks.len(),
        })
    }

    /// Run the completion while keeping the typing indicator alive.
    async fn complete_with_typing(
        &self,
        messenger: &dyn MessagingPort,
        chat_id: ChatId,
        text: &str,
    ) -> Result<String> {
        let completion = self.complete(text);
        tokio::pin!(completion);

        if !messenger.capabilities().supports_chat_actions {
            return completion.await;
        }

        let mut tick = tokio::time::interval(TYPING_REFRESH);
        loop {
            tokio::select! {
                res = &mut completion => return res,
                _ = tick.tick() => {
                    // Best-effort.
                    let _ = messenger.send_chat_action(chat_id, ChatAction::Typing).await;
                }
            }
        }
    }

    /// Offload one completion call to a background task, bounded by the worker pool.
    async fn complete(&self, text: &str) -> Result<String> {
        let req = CompletionRequest {
            model: self.settings.model.clone(),
            instructions: self.preamble.shared(),
            input: build_user_input(text),
            max_output_tokens: self.settings.max_output_tokens,
        };

        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| Error::Task(format!("worker pool closed: {e}")))?;
        let client = Arc::clone(&self.client);

        let task = tokio::spawn(async move {
            let _permit = permit;
            client.complete(req).await
        });

        match task.await {
            Ok(res) => res,
            Err(e) => Err(Error::Task(e.to_string())),
        }
    }
}

pub fn too_long_notice(max_chars: usize) -> String {
    format!("Too long, lad! I'm just a cat. Send me a word or phrase less than {max_chars} characters.")
}

/// User-facing description of a failed completion call.
pub fn describe_failure(err: &Error) -> String {
    let msg = err.to_string();
    let msg = if msg.chars().count() > MAX_ERROR_CHARS {
        format!("{}...", msg.chars().take(MAX_ERROR_CHARS).collect::<String>())
    } else {
        msg
    };
    format!("Oops, an error: {}: {msg}", err.kind())
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        domain::{MessageId, MessageRef},
        messaging::types::MessagingCapabilities,
    };

    struct FakeMessenger {
        max_message_len: usize,
        sends: Mutex<Vec<(ChatId, String)>>,
        actions: Mutex<Vec<ChatAction>>,
        next_id: AtomicUsize,
    }

    impl FakeMessenger {
        fn new() -> Self {
            Self::with_limit(4096)
        }

        fn with_limit(max_message_len: usize) -> Self {
            Self {
                max_message_len,
                sends: Mutex::new(Vec::new()),
                actions: Mutex::new(Vec::new()),
                next_id: AtomicUsize::new(1),
            }
        }

        fn texts(&self) -> Vec<String> {
            self.sends
                .lock()
                .unwrap()
                .iter()
                .map(|(_, t)| t.clone())
                .collect()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_chat_actions: true,
                max_message_len: self.max_message_len,
            }
        }

        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            self.sends.lock().unwrap().push((chat_id, text.to_string()));
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i32;
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(id),
            })
        }

        async fn send_chat_action(&self, _chat_id: ChatId, action: ChatAction) -> Result<()> {
            self.actions.lock().unwrap().push(action);
            Ok(())
        }
    }

    enum Reply {
        Text(&'static str),
        Api(u16, &'static str),
        Panic,
    }

    struct FakeCompletion {
        replies: Mutex<Vec<Reply>>,
        requests: Mutex<Vec<CompletionRequest>>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeCompletion {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for FakeCompletion {
        async fn complete(&self, req: CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(req);

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let reply = {
                let mut replies = self.replies.lock().unwrap();
                if replies.is_empty() {
                    Reply::Text("default")
                } else {
                    replies.remove(0)
                }
            };
            match reply {
                Reply::Text(t) => Ok(t.to_string()),
                Reply::Api(status, message) => Err(Error::Api {
                    status,
                    message: message.to_string(),
                }),
                Reply::Panic => panic!("completion backend blew up"),
            }
        }
    }

    fn settings() -> HandlerSettings {
        HandlerSettings {
            model: "gpt-4.1-mini".to_string(),
            max_output_tokens: 600,
            max_input_chars: 80,
            message_limit: 4096,
            completion_workers: 4,
        }
    }

    fn handler(settings: HandlerSettings, client: Arc<FakeCompletion>) -> MessageHandler {
        MessageHandler::new(settings, Preamble::new("You are Dicky."), client)
    }

    #[tokio::test]
    async fn short_word_is_translated_in_one_message() {
        let client = Arc::new(FakeCompletion::new(vec![Reply::Text("translation text")]));
        let h = handler(settings(), client.clone());
        let api = FakeMessenger::new();

        let out = h.handle_text(&api, ChatId(7), "hello").await.unwrap();

        assert_eq!(out, HandleOutcome::Answered { chunks: 1 });
        assert_eq!(api.texts(), vec!["translation text".to_string()]);
        assert_eq!(api.sends.lock().unwrap()[0].0, ChatId(7));

        let reqs = client.requests.lock().unwrap();
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].input.contains("hello"));
        assert_eq!(&*reqs[0].instructions, "You are Dicky.");
        assert_eq!(reqs[0].model, "gpt-4.1-mini");
        assert_eq!(reqs[0].max_output_tokens, 600);
    }

    #[tokio::test]
    async fn oversized_input_is_rejected_without_calling_the_service() {
        let client = Arc::new(FakeCompletion::new(vec![]));
        let h = handler(settings(), client.clone());
        let api = FakeMessenger::new();

        let out = h.handle_text(&api, ChatId(1), &"a".repeat(81)).await.unwrap();

        assert_eq!(out, HandleOutcome::Rejected);
        assert_eq!(client.calls(), 0);
        assert_eq!(api.texts(), vec![too_long_notice(80)]);
        assert!(api.actions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn input_at_the_threshold_is_accepted() {
        let client = Arc::new(FakeCompletion::new(vec![Reply::Text("ok")]));
        let h = handler(settings(), client.clone());
        let api = FakeMessenger::new();

        // 80 Cyrillic chars are 160 bytes; the threshold counts chars.
        let out = h.handle_text(&api, ChatId(1), &"я".repeat(80)).await.unwrap();

        assert_eq!(out, HandleOutcome::Answered { chunks: 1 });
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let client = Arc::new(FakeCompletion::new(vec![]));
        let h = handler(settings(), client.clone());
        let api = FakeMessenger::new();

        let out = h.handle_text(&api, ChatId(1), "  \n ").await.unwrap();

        assert_eq!(out, HandleOutcome::Ignored);
        assert_eq!(client.calls(), 0);
        assert!(api.texts().is_empty());
    }

    #[tokio::test]
    async fn failure_is_reported_and_handler_keeps_working() {
        let client = Arc::new(FakeCompletion::new(vec![
            Reply::Api(401, "Incorrect API key provided"),
            Reply::Text("second answer"),
        ]));
        let h = handler(settings(), client.clone());
        let api = FakeMessenger::new();

        let first = h.handle_text(&api, ChatId(1), "cat").await.unwrap();
        assert_eq!(first, HandleOutcome::Failed);
        let texts = api.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Oops, an error: ApiError:"));
        assert!(texts[0].contains("Incorrect API key provided"));

        let second = h.handle_text(&api, ChatId(1), "dog").await.unwrap();
        assert_eq!(second, HandleOutcome::Answered { chunks: 1 });
        assert_eq!(api.texts()[1], "second answer");
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn panicking_backend_becomes_a_user_visible_failure() {
        let client = Arc::new(FakeCompletion::new(vec![Reply::Panic]));
        let h = handler(settings(), client.clone());
        let api = FakeMessenger::new();

        let out = h.handle_text(&api, ChatId(1), "word").await.unwrap();

        assert_eq!(out, HandleOutcome::Failed);
        let texts = api.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Oops, an error: TaskError:"));
    }

    #[tokio::test]
    async fn empty_answer_is_replaced_by_notice() {
        let client = Arc::new(FakeCompletion::new(vec![Reply::Text("")]));
        let h = handler(settings(), client);
        let api = FakeMessenger::new();

        let out = h.handle_text(&api, ChatId(1), "word").await.unwrap();

        assert_eq!(out, HandleOutcome::Answered { chunks: 1 });
        assert_eq!(api.texts(), vec![EMPTY_ANSWER_NOTICE.to_string()]);
    }

    #[tokio::test]
    async fn long_answer_is_split_in_order() {
        let client = Arc::new(FakeCompletion::new(vec![Reply::Text(
            "first line\nsecond line\nthird",
        )]));
        let mut s = settings();
        s.message_limit = 12;
        let h = handler(s, client);
        let api = FakeMessenger::new();

        let out = h.handle_text(&api, ChatId(1), "word").await.unwrap();

        assert_eq!(out, HandleOutcome::Answered { chunks: 3 });
        assert_eq!(
            api.texts(),
            vec![
                "first line".to_string(),
                "second line".to_string(),
                "third".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn messenger_limit_caps_configured_limit() {
        let client = Arc::new(FakeCompletion::new(vec![Reply::Text("abcdefghijkl")]));
        let h = handler(settings(), client);
        let api = FakeMessenger::with_limit(5);

        let out = h.handle_text(&api, ChatId(1), "word").await.unwrap();

        assert_eq!(out, HandleOutcome::Answered { chunks: 3 });
        assert_eq!(api.texts(), vec!["abcde", "fghij", "kl"]);
    }

    #[tokio::test]
    async fn typing_indicator_is_sent_while_waiting() {
        let client = Arc::new(FakeCompletion::new(vec![Reply::Text("ok")]));
        let h = handler(settings(), client);
        let api = FakeMessenger::new();

        h.handle_text(&api, ChatId(1), "word").await.unwrap();

        assert_eq!(api.actions.lock().unwrap().first(), Some(&ChatAction::Typing));
    }

    #[tokio::test]
    async fn worker_pool_bounds_concurrent_calls() {
        let mut fake = FakeCompletion::new(vec![]);
        fake.delay = Duration::from_millis(30);
        let client = Arc::new(fake);
        let mut s = settings();
        s.completion_workers = 1;
        let h = Arc::new(handler(s, client.clone()));
        let api = Arc::new(FakeMessenger::new());

        let mut tasks = Vec::new();
        for chat in 0..3 {
            let h = h.clone();
            let api = api.clone();
            tasks.push(tokio::spawn(async move {
                h.handle_text(api.as_ref(), ChatId(chat), "word").await
            }));
        }
        for t in tasks {
            assert_eq!(
                t.await.unwrap().unwrap(),
                HandleOutcome::Answered { chunks: 1 }
            );
        }

        assert_eq!(client.calls(), 3);
        assert_eq!(client.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_description_is_truncated() {
        let err = Error::Http("x".repeat(500));
        let msg = describe_failure(&err);
        assert!(msg.starts_with("Oops, an error: HttpError: http error: "));
        assert!(msg.ends_with("..."));
        assert!(msg.chars().count() < 260);
    }
}
