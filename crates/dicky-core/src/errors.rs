/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the handler can
/// report failures to the user consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("background task failed: {0}")]
    Task(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Short, stable name of the failure kind (shown to users next to the message).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "IoError",
            Error::Json(_) => "JsonError",
            Error::Http(_) => "HttpError",
            Error::Api { .. } => "ApiError",
            Error::Task(_) => "TaskError",
            Error::Transport(_) => "TransportError",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
