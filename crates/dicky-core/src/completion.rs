use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

/// A single completion request.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub model: String,
    /// Instructional preamble, shared across requests.
    pub instructions: Arc<str>,
    pub input: String,
    pub max_output_tokens: u32,
}

/// Port for the external text-completion service.
///
/// `Ok` carries the (trimmed) answer text, which may be empty. Any transport,
/// auth, quota or decoding problem is an `Err`.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> Result<String>;
}
