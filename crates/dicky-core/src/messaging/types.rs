/// Outgoing "chat action" (typing indicator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_chat_actions: bool,
    /// Per-message limit as the messenger documents it; chunks are sized in
    /// chars against it, which may not be the messenger's own unit.
    pub max_message_len: usize,
}
