use std::sync::Arc;

use anyhow::{anyhow, Result};
use ausvisa_core::{AuthSession, BackendClient, Config, TokenStore};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod cli;
mod handler;
mod tui;
mod ui;

use app::App;

#[derive(Parser)]
#[command(name = "ausvisa", version)]
#[command(about = "Terminal client for the AusVisa advisory chatbot and admin dashboard")]
struct Cli {
    /// Backend base URL (overrides AUSVISA_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Starts the terminal UI when omitted
    #[command(subcommand)]
    command: Option<cli::Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring unreadable config file: {}", e);
        Config::new()
    });
    config.api_url_override = args.api_url;

    let tokens = Arc::new(TokenStore::open_default()?);
    let client = BackendClient::from_config(&config, tokens)?;

    match args.command {
        Some(command) => {
            init_stderr_logging();
            cli::run(command, client).await
        }
        None => {
            let _guard = init_file_logging()?;
            run_tui(client).await
        }
    }
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Subcommands print to stdout, so logs stay on stderr and quiet by default
fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(env_filter("ausvisa=warn"))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// The terminal UI owns the screen, so logs go to `<data dir>/ausvisa/ausvisa.log`
fn init_file_logging() -> Result<WorkerGuard> {
    let dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join("ausvisa");
    std::fs::create_dir_all(&dir)?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, "ausvisa.log"));
    tracing_subscriber::registry()
        .with(env_filter("ausvisa=info"))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Ok(guard)
}

async fn run_tui(client: BackendClient) -> Result<()> {
    tracing::info!(api = client.base_url(), version = env!("CARGO_PKG_VERSION"), "starting");

    // Validate any stored session before taking over the terminal
    let mut auth = AuthSession::new(client);
    auth.restore().await;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let mut app = App::new(auth, events.sender());
    handler::load_current_screen(&mut app);

    let result = run_loop(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut tui::Tui, app: &mut App, events: &mut tui::EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;
        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event).await?;
    }
    Ok(())
}
