use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod handler;
mod identity;
mod provider;
mod session;
mod tui;
mod ui;

use app::App;
use config::Config;
use provider::local::{LocalProvider, DEFAULT_READY_DELAY};

#[derive(Parser)]
#[command(name = "charla")]
#[command(version)]
#[command(about = "Terminal demo of a 1:1 consultation chat between two fixed identities")]
struct Cli {
    /// Act as this demo identity ("user2" joins as the creator; anything
    /// else stays on the keeper path)
    #[arg(long)]
    user: Option<String>,

    /// Chat application key (overrides CHARLA_APP_KEY and the config file)
    #[arg(long)]
    app_key: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let config = Config::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to load config file, using defaults");
        Config::default()
    });
    let app_key = config.resolve_app_key(cli.app_key.as_deref());
    if app_key.is_none() {
        tracing::warn!("no chat application key configured, the session will not start");
    }
    let ready_delay = config
        .ready_delay_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_READY_DELAY);

    let provider = Arc::new(LocalProvider::new(ready_delay));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let mut app = App::new(provider, app_key, cli.user.as_deref(), events.sender());
    app.start_session();

    let result = run(&mut terminal, &mut events, &mut app).await;

    // Quitting normally already tore the session down; this covers error
    // exits from the loop.
    app.controller.teardown();
    tui::restore()?;
    result
}

async fn run(
    terminal: &mut tui::Tui,
    events: &mut tui::EventHandler,
    app: &mut App,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;
        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}

fn init_tracing(debug: bool) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("charla");
    fs::create_dir_all(&log_dir).context("creating log directory")?;
    let log_file = fs::File::create(log_dir.join("charla.log")).context("creating log file")?;

    let default_filter = if debug { "charla=debug" } else { "charla=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}
