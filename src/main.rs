//! uptick-apply - apply to the Uptick mentorship programme from a terminal
//!
//! Walks the applicant through the multi-step application form and keeps a
//! local draft, so an interrupted application can be picked up later.

mod api;
mod app;
mod config;
mod controller;
mod draft;
mod state;

use anyhow::{Context, Result};
use api::HttpApiClient;
use app::App;
use config::AppConfig;
use controller::{ControllerOptions, FormController};
use draft::{DraftStore, FileDraftStore, MemoryDraftStore};
use state::{uptick_application, FormDefinition, FormSchema, DRAFT_KEY};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uptick_apply=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = AppConfig::load()?;

    let definition = match &config.form_definition {
        Some(path) => FormDefinition::from_json_file(path)?,
        None => uptick_application(),
    };
    let schema = Arc::new(FormSchema::compile(definition).context("Invalid form definition")?);

    let store: Arc<dyn DraftStore> = if config.autosave_enabled() {
        let dir = config.draft_dir();
        info!("Drafts are kept in {}", dir.display());
        Arc::new(FileDraftStore::new(dir))
    } else {
        Arc::new(MemoryDraftStore::new())
    };

    let client = Arc::new(HttpApiClient::new(config.api_base_url())?);
    client.set_token(config.api_token.clone());

    let options = ControllerOptions {
        draft_key: DRAFT_KEY.to_string(),
        autosave_delay: config.autosave_delay(),
        autosave: config.autosave_enabled(),
    };
    let controller = FormController::new(schema, store, client.clone(), options);
    let mut app = App::new(controller, Some(client));

    run_app(&mut app).await
}

async fn run_app(app: &mut App) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(format!("{}\n", app.greeting()).as_bytes())
        .await?;

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        // End of input or Ctrl+C: keep whatever was typed
        let Some(line) = line else {
            app.controller().save_draft();
            stdout.write_all(b"\n").await?;
            return Ok(());
        };

        let output = app.handle_line(&line).await;
        if !output.is_empty() {
            stdout.write_all(format!("{output}\n").as_bytes()).await?;
        }

        if app.should_quit() {
            return Ok(());
        }
    }
}
