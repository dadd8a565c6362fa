use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, enable_raw_mode},
};
use log::{error, info};
use ratatui::{Terminal, backend::CrosstermBackend};
use simplelog::{Config, LevelFilter, WriteLogger};

use ocreview::api::HttpBackend;
use ocreview::inputs::KeyboardEventSource;
use ocreview::main_app::{App, run_app};
use ocreview::panic_handler;

/// Terminal client for reviewing OCR'd documents: search pages, annotate
/// them with note sets, export the notes.
#[derive(Parser, Debug)]
#[command(name = "ocreview", version, about)]
struct Cli {
    /// PDF to upload on startup
    pdf: Option<PathBuf>,

    /// OCR server base URL
    #[arg(long, default_value = "http://localhost:5000")]
    server: String,

    /// First page to process (requires --end-page)
    #[arg(long, requires = "end_page")]
    start_page: Option<u32>,

    /// Last page to process (requires --start-page)
    #[arg(long, requires = "start_page")]
    end_page: Option<u32>,

    /// Directory exported notes are written to
    #[arg(long, default_value = "exports")]
    export_dir: PathBuf,

    /// Log file path
    #[arg(long, default_value = "ocreview.log")]
    log_file: PathBuf,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = LevelFilter::from_str(&cli.log_level)
        .with_context(|| format!("invalid log level '{}'", cli.log_level))?;
    WriteLogger::init(level, Config::default(), File::create(&cli.log_file)?)?;

    if let Some(pdf) = &cli.pdf {
        if !pdf.is_file() {
            bail!("{} is not a file", pdf.display());
        }
    }
    // Normalized so the end is never before the start.
    let page_range = match (cli.start_page, cli.end_page) {
        (Some(start), Some(end)) if start > end => Some((end, start)),
        (Some(start), Some(end)) => Some((start, end)),
        _ => None,
    };

    info!("starting ocreview against {}", cli.server);
    panic_handler::initialize_panic_handler();

    let backend = Arc::new(HttpBackend::new(&cli.server)?);
    let mut app = App::new(backend, cli.export_dir.clone(), page_range);
    if let Some(pdf) = &cli.pdf {
        app.upload_document(pdf);
    }

    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = KeyboardEventSource;
    let result = run_app(&mut terminal, &mut app, &mut events);

    panic_handler::restore_terminal();

    if let Err(err) = &result {
        error!("application error: {:?}", err);
        eprintln!("{err:?}");
    }
    info!("shutting down");
    result
}
