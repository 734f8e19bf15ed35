mod bot;
mod chat;
mod config;
mod llm;
mod quiz;

use std::{collections::HashMap, sync::Arc};

use dotenv::dotenv;
use quiz::ai_helper::{ContentService, QuizHelper};
use teloxide::prelude::*;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    if let Err(err) = dotenv() {
        log::debug!("No .env file loaded: {err}");
    }

    if let Err(err) = run().await {
        log::error!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = config::Config::from_env()?;
    let generator = config.build_generator()?;
    log::info!(
        "Starting {} with model {}...",
        chat::texts::BOT_NAME,
        config.model
    );

    let content: Arc<dyn ContentService> =
        Arc::new(QuizHelper::new(generator, config.search_grounding));
    let sessions: bot::Sessions = Arc::new(Mutex::new(HashMap::new()));

    let bot = Bot::from_env();

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![sessions, content])
        // Updates from one chat are not queued behind each other: a message
        // sent while the bot is still answering must meet the busy flag.
        .distribution_function(|_| None::<std::convert::Infallible>)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
