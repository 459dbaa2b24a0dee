use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SYSTEM_PROMPT_PATH: &str = "system_prompt.txt";

/// Typed configuration, read once at startup and shared read-only afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub telegram_bot_token: String,
    pub openai_api_key: String,

    // Completion service
    pub openai_model: String,
    pub openai_base_url: String,
    pub openai_timeout: Duration,
    pub max_output_tokens: u32,
    pub system_prompt_path: PathBuf,

    // Handler limits
    pub max_input_chars: usize,
    pub telegram_message_limit: usize,
    pub completion_workers: usize,
}

impl Config {
    /// Load from the process environment (plus `.env` in the working directory).
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_str = |key: &str| lookup(key).and_then(non_empty);
        let env_parse = |key: &str| env_str(key).and_then(|s| s.trim().parse::<u64>().ok());

        // Required credentials; the Telegram token is checked first.
        let Some(telegram_bot_token) = env_str("TELEGRAM_BOT_TOKEN") else {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required \
                 (export TELEGRAM_BOT_TOKEN='your-token')"
                    .to_string(),
            ));
        };
        let Some(openai_api_key) = env_str("OPENAI_API_KEY") else {
            return Err(Error::Config(
                "OPENAI_API_KEY environment variable is required".to_string(),
            ));
        };

        let openai_model = env_str("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let openai_base_url = env_str("OPENAI_BASE_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let openai_timeout = Duration::from_secs(env_parse("OPENAI_TIMEOUT_SECS").unwrap_or(60));
        let max_output_tokens = env_parse("MAX_OUTPUT_TOKENS")
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(600);
        let system_prompt_path = PathBuf::from(
            env_str("SYSTEM_PROMPT_PATH").unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT_PATH.to_string()),
        );

        // Zero would make the segmenter contract invalid; fall back instead.
        let max_input_chars = positive_usize(env_parse("MAX_INPUT_CHARS")).unwrap_or(80);
        let telegram_message_limit =
            positive_usize(env_parse("TELEGRAM_MESSAGE_LIMIT")).unwrap_or(4096);
        let completion_workers = positive_usize(env_parse("COMPLETION_WORKERS")).unwrap_or(4);

        Ok(Self {
            telegram_bot_token,
            openai_api_key,
            openai_model,
            openai_base_url,
            openai_timeout,
            max_output_tokens,
            system_prompt_path,
            max_input_chars,
            telegram_message_limit,
            completion_workers,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn positive_usize(v: Option<u64>) -> Option<usize> {
    v.filter(|n| *n > 0).and_then(|n| usize::try_from(n).ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
