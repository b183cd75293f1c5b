//! Student Roster TUI - a terminal front-end for a json-server student roster.
//!
//! Lists students page by page, and adds, edits and deletes them. All reads go
//! through the shared query cache in `roster-core`.

mod app;
mod ui;

use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use roster_core::config::API_URL_ENV;
use roster_core::{Config, Route};

use app::{App, AppState};
use ui::input::{handle_input, handle_mouse};
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE: &str = "roster.log";

#[derive(Parser, Debug)]
#[command(name = "roster", version, about)]
struct Args {
    /// Base URL of the json-server backend
    #[arg(long, env = API_URL_ENV)]
    api_url: Option<String>,

    /// Route to open at startup, e.g. `/students?page=2` or `/students/add`
    #[arg(long, default_value = "/students")]
    route: String,

    /// Rows per list page
    #[arg(long)]
    page_size: Option<u32>,
}

/// Initialize the tracing subscriber. The terminal belongs to the UI, so logs
/// go to a file in the cache directory.
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE));

    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(url) = args.api_url {
        config.api_base_url = url;
    }
    if let Some(page_size) = args.page_size.filter(|n| *n > 0) {
        config.page_size = page_size;
    }

    let _log_guard = init_tracing(&config.log_dir()?)?;
    info!(api = %config.api_base_url, "Student roster starting");

    let gc_interval = config.gc_interval();
    let mut app = App::new(config)?;
    let shutdown = CancellationToken::new();
    let gc = app.queries().spawn_gc(gc_interval, shutdown.clone());

    app.navigate(Route::parse(&args.route));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    shutdown.cancel();
    let _ = gc.await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Student roster shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            match event::read()? {
                Event::Key(key) => {
                    // Ctrl+C to quit
                    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                        return Ok(());
                    }

                    // Handle input
                    if handle_input(app, key).await? {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => {
                    let size = terminal.size()?;
                    handle_mouse(app, mouse, Rect::new(0, 0, size.width, size.height));
                }
                _ => {}
            }
        }

        // Check for completed background tasks
        app.check_background_tasks().await;

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
