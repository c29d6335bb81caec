#![deny(clippy::all)]

mod capabilities;
mod cli;
mod config;
mod delivery;
mod detector;
mod dispatcher;
mod dom;
mod error;
mod identity;
mod markers;
mod minutes;
mod openai;
mod overlay;
mod replay;
mod runtime;
mod session;
mod settings;

use anyhow::Context;
use clap::Parser;
use cli::{CliArgs, Command};
use config::Config;
use delivery::MailtoComposer;
use dom::Document;
use openai::OpenAIClient;
use overlay::OverlayRenderer;
use runtime::SessionHandle;
use session::Session;
use settings::SettingsStore;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // A .env file is optional
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays clean for replay output
    tracing_subscriber::fmt()
        .with_max_level(if args.debug { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    // Load configuration from embedded config.toml
    let config = config::load_config()?;

    let store = SettingsStore::open_default()?
        .with_env_credential(std::env::var("OPENAI_API_KEY").ok());

    match args.command {
        Command::Replay { script } => run_replay(config, &store, &script).await,
        Command::Status => {
            show_settings(&store);
            Ok(())
        }
        Command::Set(set) => {
            replay::SettingsPatch::from(set).apply(&store)?;
            show_settings(&store);
            Ok(())
        }
    }
}

/// Replay a caption script against a live session.
///
/// Settings changes made by the script stay in memory and never touch the
/// stored settings file.
async fn run_replay(config: Config, store: &SettingsStore, script: &Path) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("Failed to read script {}", script.display()))?;
    let steps = replay::parse_script(&source)?;
    info!(steps = steps.len(), "Replaying {}", script.display());

    let store = Arc::new(SettingsStore::in_memory(store.load()));
    let client = Arc::new(OpenAIClient::new(&config.api, &config.minutes)?);
    let (session, inbox) = Session::new(
        config.clone(),
        store.load(),
        client.clone(),
        client,
        Arc::new(MailtoComposer::default()),
    );
    let (handle, task) = SessionHandle::spawn(Document::new(), session, inbox, store.clone());

    let result = replay::run_script(
        &handle,
        &store,
        OverlayRenderer::new(&config.page),
        &config.page.caption_class,
        steps,
        &mut std::io::stdout(),
    )
    .await;

    handle.shutdown().await;
    task.await?;
    result
}

fn show_settings(store: &SettingsStore) {
    let settings = store.load();
    println!(
        "credential:        {}",
        if settings.credential().is_some() {
            "configured"
        } else {
            "not set"
        }
    );
    println!("target language:   {}", settings.target_lang());
    println!("model:             {}", settings.model.trim());
    println!("translate:         {}", settings.translate_enabled);
    println!("minutes:           {}", settings.minutes_enabled);
    println!("minutes recipient: {}", settings.minutes_recipient);
    println!("overlay color:     {}", settings.overlay_color);
}

