//! Adaptive Placement Agent - terminal client.
//!
//! Runs the interactive TUI by default. A few subcommands (`login`, `logout`,
//! `status`, `generate`) drive the same session from the shell.

mod app;
mod ui;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use placement_core::{ApiClient, AuthState, Config, FileStore, SessionManager};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE: &str = "placement-agent.log";

fn env_filter() -> EnvFilter {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Log to stderr for the one-shot subcommands
fn init_tracing_stderr() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter())
        .init();
}

/// Log to a file while the alternate screen owns the terminal.
/// The returned guard must live until shutdown so buffered lines get flushed.
fn init_tracing_file(dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let appender = tracing_appender::rolling::never(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter())
        .init();
    Ok(guard)
}

fn data_dir(config: &Config) -> PathBuf {
    config.data_dir().unwrap_or_else(|_| PathBuf::from("./data"))
}

/// Build the session manager over the on-disk store
fn build_session(config: &Config) -> Result<SessionManager> {
    let api = ApiClient::new(config.api_base_url())?;
    let store = FileStore::open(&data_dir(config));
    Ok(SessionManager::new(api, store))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: ignoring unreadable config ({})", e);
        Config::default()
    });

    // Check for CLI commands
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(command) = args.first() {
        init_tracing_stderr();
        return match command.as_str() {
            "login" => cmd_login(config, args.get(1).cloned()).await,
            "logout" => cmd_logout(&config),
            "status" => cmd_status(&config).await,
            "generate" => cmd_generate(&config, &args[1..]).await,
            "help" | "--help" | "-h" => {
                print_usage();
                Ok(())
            }
            other => {
                print_usage();
                bail!("Unknown command: {}", other)
            }
        };
    }

    let _log_guard = init_tracing_file(&data_dir(&config))?;
    info!("Placement agent starting");

    let session = build_session(&config)?;
    let mut app = App::new(config, session);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Restore the stored session before the first frame; validation is
    // queued and runs off the UI loop
    app.initialize();
    app.start_background_tasks();

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Placement agent shutting down");
    Ok(())
}

fn print_usage() {
    eprintln!("Usage: placement-agent [COMMAND]");
    eprintln!();
    eprintln!("Without a command the interactive terminal UI starts.");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  login [username]      Log in and store the session");
    eprintln!("  logout                Clear the stored session");
    eprintln!("  status                Show session and backend status");
    eprintln!("  generate <prompt...>  Send a prompt to the assistant");
}

async fn cmd_login(mut config: Config, username: Option<String>) -> Result<()> {
    let username = match username.or_else(|| config.initial_username()) {
        Some(u) if !u.trim().is_empty() => u.trim().to_string(),
        _ => {
            eprint!("Username: ");
            io::stderr().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line.trim().to_string()
        }
    };
    if username.is_empty() {
        bail!("Username required");
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password required");
    }

    let mut session = build_session(&config)?;
    if let Err(e) = session.login(&username, &password).await {
        bail!("{}", e.user_message());
    }
    println!("Logged in as {}", session.session().display_name());

    config.last_username = Some(username);
    if let Err(e) = config.save() {
        tracing::warn!(error = %e, "Failed to save config");
    }
    Ok(())
}

fn cmd_logout(config: &Config) -> Result<()> {
    let mut session = build_session(config)?;
    session.load_persisted();
    session.logout();
    println!("Logged out");
    Ok(())
}

async fn cmd_status(config: &Config) -> Result<()> {
    let mut session = build_session(config)?;
    if session.load_persisted() == AuthState::Authenticated {
        session.validate().await;
    }

    match session.state() {
        AuthState::Authenticated => {
            println!("Logged in as {}", session.session().display_name())
        }
        AuthState::Anonymous => println!("Not logged in"),
    }

    let health = session.api().health().await;
    println!("Backend {}: {}", session.api().base_url(), health.label());
    Ok(())
}

async fn cmd_generate(config: &Config, words: &[String]) -> Result<()> {
    let prompt = words.join(" ");
    if prompt.trim().is_empty() {
        bail!("Usage: placement-agent generate <prompt...>");
    }

    let mut session = build_session(config)?;
    session.load_persisted();
    match session.generate(prompt.trim()).await {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => bail!("{}", e.user_message()),
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Start a queued request; its result arrives with the background events
        app.dispatch_pending();

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    // Ctrl+C to quit
                    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                        return Ok(());
                    }

                    // Handle input
                    if handle_input(app, key) {
                        return Ok(());
                    }
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
