use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use dicky_core::{
    config::Config,
    handler::{HandlerSettings, MessageHandler},
    prompt::Preamble,
};
use dicky_openai::OpenAiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dicky_core::logging::init("dicky")?;

    // Everything below fails fast, before any network activity.
    let cfg = Arc::new(Config::load()?);
    let preamble = Preamble::load(&cfg.system_prompt_path)?;
    info!(
        path = %cfg.system_prompt_path.display(),
        chars = preamble.as_str().chars().count(),
        "system prompt loaded"
    );

    let client = Arc::new(OpenAiClient::from_config(&cfg)?);
    let handler = Arc::new(MessageHandler::new(
        HandlerSettings::from_config(&cfg),
        preamble,
        client,
    ));

    dicky_telegram::router::run_polling(cfg, handler)
        .await
        .context("telegram bot failed")?;

    Ok(())
}
