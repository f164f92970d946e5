use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::Input;
use miruro_extractor::server::{self, AppState};
use miruro_extractor::{
    AniListProvider, ChromeSessionFactory, ExtractorConfig, ProgressEvent, WatchUrlStyle,
    extract_series,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "miruro-extractor",
    version,
    about = "Extract video links for every episode of an anime"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// AniList id or watch page URL (prompted for when omitted)
    input: Option<String>,

    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory the report is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Number of episodes extracted concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Watch page URL layout
    #[arg(long, value_enum)]
    watch_style: Option<StyleArg>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the JSON API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:5000")]
        bind: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StyleArg {
    Path,
    Query,
}

impl From<StyleArg> for WatchUrlStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Path => WatchUrlStyle::Path,
            StyleArg::Query => WatchUrlStyle::Query,
        }
    }
}

/// Renders a progress event as the line(s) printed to stdout
fn progress_text(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Started { media_id } => format!("[INFO] Anime id: {}", media_id),
        ProgressEvent::MetadataFetched {
            title,
            episode_count,
        } => format!(
            "[INFO] Title: {}\n[INFO] Episodes: {}\n{}",
            title,
            episode_count,
            "-".repeat(60)
        ),
        ProgressEvent::EpisodesQueued { count, workers } => {
            format!("[INFO] Extracting {} episode(s) with {} worker(s)", count, workers)
        }
        ProgressEvent::EpisodeResolved { episode, url } => {
            format!("[DONE] Ep {:02}: {}", episode, url)
        }
        ProgressEvent::EpisodeFailed {
            episode,
            exhausted: true,
            ..
        } => format!("[WARN] No video URL found for Ep {}", episode),
        ProgressEvent::EpisodeFailed {
            episode, reason, ..
        } => format!("[ERROR] Ep {}: {}", episode, reason),
        ProgressEvent::ReportWritten { path, line_count } => {
            format!("\nSaved {} link(s) to {}", line_count, path.display())
        }
    }
}

fn handle_progress_event(event: ProgressEvent) {
    println!("{}", progress_text(&event));
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("[ERROR] {}", message);
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let mut config = ExtractorConfig::load(cli.config.as_deref()).unwrap_or_else(|e| fail(e));
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(workers) = cli.workers {
        config.worker_count = workers;
    }
    if let Some(style) = cli.watch_style {
        config.watch_url_style = style.into();
    }
    if let Err(e) = config.validate() {
        fail(e);
    }

    match cli.command {
        Some(Command::Serve { bind }) => run_server(config, &bind),
        None => run_extraction(config, cli.input),
    }
}

fn run_extraction(config: ExtractorConfig, input: Option<String>) {
    println!("=== Miruro Episode Extractor ===");

    let input = match input {
        Some(input) => input,
        None => Input::<String>::new()
            .with_prompt("Enter anime ID or full URL")
            .interact_text()
            .unwrap_or_else(|e| fail(format!("Failed to read input: {}", e))),
    };

    let provider = AniListProvider::new(&config).unwrap_or_else(|e| fail(e));
    let sessions = ChromeSessionFactory::new(&config.browser).unwrap_or_else(|e| fail(e));

    match extract_series(&config, input.trim(), &provider, &sessions, handle_progress_event) {
        Ok(report) => {
            println!("\n=== Extraction Completed ===");
            for resolved in &report.episodes {
                println!("Ep {:02}: {}", resolved.episode, resolved.url);
            }
            if report.episodes.is_empty() {
                println!("No video links found.");
            }
        }
        Err(e) => fail(e),
    }
}

fn run_server(config: ExtractorConfig, bind: &str) {
    // Blocking clients are created and dropped outside the async runtime
    let provider = AniListProvider::new(&config).unwrap_or_else(|e| fail(e));
    let sessions = ChromeSessionFactory::new(&config.browser).unwrap_or_else(|e| fail(e));
    let state = Arc::new(AppState::new(config, Arc::new(provider), Arc::new(sessions)));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| fail(format!("Failed to start runtime: {}", e)));

    let result = runtime.block_on(server::serve(Arc::clone(&state), bind.to_string()));
    drop(runtime);
    drop(state);

    if let Err(e) = result {
        fail(format!("Server error: {}", e));
    }
}
