mod app;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use pokin_api::{ApiExecutor, Backend, Url};
use pokin_core::{config::Config, db, logging, settings, tool::Tool};
use pokin_opd::OpdTool;
use pokin_pemda::PemdaTool;
use pokin_tematik::TematikTool;

use app::App;

fn main() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let log_path = logging::log_path()?;
    logging::init(&log_path, &config.log_level)?;

    let base = Url::parse(&config.api_url)
        .with_context(|| format!("Invalid api_url in configuration: {}", config.api_url))?;
    tracing::info!(api = %base, authenticated = config.token.is_some(), "starting pokin");

    let conn = db::open_db()?;
    let filter = settings::load_filter(&conn)?;

    // One executor thread per tool, so each tool polls only its own replies.
    let backend = || -> Box<dyn Backend> {
        Box::new(ApiExecutor::spawn(base.clone(), config.token.clone()))
    };
    let tools: Vec<Box<dyn Tool>> = vec![
        Box::new(PemdaTool::new(backend(), filter.clone())),
        Box::new(OpdTool::new(backend(), filter.clone())),
        Box::new(TematikTool::new(backend(), filter.clone())),
    ];
    let mut app = App::new(tools, conn, filter);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        tracing::error!(error = ?err, "pokin exited with an error");
        eprintln!("Error: {err:?}");
    }
    tracing::info!("pokin stopped");

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    const TICK_RATE: Duration = Duration::from_millis(50);

    loop {
        terminal.draw(|frame| {
            app.render(frame);
        })?;

        if app.should_quit {
            return Ok(());
        }

        // Poll with timeout so tools can pick up API replies
        if event::poll(TICK_RATE)? {
            let ev = event::read()?;
            app.handle_event(ev);
        }

        app.tick();
    }
}
