/// Environment Monitor - Terminal Dashboard
///
/// Shows the current temperature and humidity with a chart of recent
/// readings:
/// - History fetched once from the REST API at startup (`r` reloads)
/// - Live samples pushed over the STOMP topic
/// - Connection status in the header
use std::{
    error::Error,
    io,
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use envmon_dashboard::{project_local, render_dashboard, DashboardConfig, DashboardSession};
use ratatui::{backend::CrosstermBackend, Terminal};
use rustls::crypto::ring::default_provider;
use tracing::info;

const DRAW_INTERVAL: Duration = Duration::from_millis(250);
const INPUT_POLL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = default_provider().install_default();
    init_logging()?;

    let config = DashboardConfig::from_env();
    let mut session = DashboardSession::start(&config)?;

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut last_draw = Instant::now() - DRAW_INTERVAL;

    let result: Result<(), Box<dyn Error>> = loop {
        if event::poll(INPUT_POLL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            session.reload();
                        }
                        _ => {}
                    }
                }
            }
        }

        let changed = session.drain() > 0;
        if changed || last_draw.elapsed() >= DRAW_INTERVAL {
            let ingestion = session.ingestion();
            let vm = project_local(ingestion.history(), ingestion.current());
            let status = session.status();
            terminal.draw(|f| render_dashboard(f, &vm, status))?;
            last_draw = Instant::now();
        }

        tokio::task::yield_now().await;
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("Shutting down");
    session.teardown().await;
    result
}

/// `RUST_LOG` filter (default `warn`), to `ENVMON_LOG_FILE` when set
fn init_logging() -> io::Result<()> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    match std::env::var("ENVMON_LOG_FILE") {
        Ok(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}
