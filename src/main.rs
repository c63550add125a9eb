//! Activity Collector CLI
//!
//! Consent-based local desktop and browser activity recording.

use activity_collector::{
    collector::check_permission,
    config::{Config, SourceConfig},
    controller::{CollectorController, CollectorSources},
    sink::{count_records, SinkFormat, Stream},
    transparency::{create_shared_log_with_persistence, read_persisted},
    PRIVACY_DECLARATION, VERSION,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "activity-collector")]
#[command(version = VERSION)]
#[command(about = "Consent-based local activity collector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start collecting
    Start {
        /// Samplers to run (window, clipboard, keyboard, browser, or all)
        #[arg(long)]
        sources: Option<String>,

        /// Stream encoding (csv or json)
        #[arg(long)]
        format: Option<SinkFormat>,

        /// Directory the record streams are written to
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Log every observation, not just recorded ones
        #[arg(long, short)]
        verbose: bool,
    },

    /// Pause data collection
    Pause,

    /// Resume data collection
    Resume,

    /// Show current collection status
    Status,

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            sources,
            format,
            output,
            verbose,
        } => {
            init_tracing(verbose);
            cmd_start(sources.as_deref(), format, output)
        }
        Commands::Pause => cmd_pause(),
        Commands::Resume => cmd_resume(),
        Commands::Status => cmd_status(),
        Commands::Privacy => {
            cmd_privacy();
            Ok(())
        }
        Commands::Config => cmd_config(),
    }
}

/// Install the log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn cmd_start(
    sources: Option<&str>,
    format: Option<SinkFormat>,
    output: Option<PathBuf>,
) -> Result<()> {
    println!("Activity Collector v{VERSION}");
    println!("{PRIVACY_DECLARATION}");

    let mut config = Config::load().context("could not load configuration")?;
    if let Some(sources) = sources {
        config.sources = SourceConfig::from_csv(sources);
    }
    if let Some(format) = format {
        config.format = format;
    }
    if let Some(output) = output {
        config.output_dir = output;
    }

    if !config.sources.any_enabled() {
        bail!("at least one source must be enabled (window, clipboard, keyboard, browser)");
    }
    if config.sources.keyboard && !check_permission() {
        eprintln!("Warning: keyboard hook permission not granted; copy/paste events are disabled.");
        eprintln!("On macOS, allow this application under");
        eprintln!("System Settings > Privacy & Security > Input Monitoring.");
        println!();
    }
    config
        .ensure_directories()
        .context("could not create output directories")?;

    println!("Starting collection...");
    for (name, enabled) in [
        ("Window", config.sources.window),
        ("Clipboard", config.sources.clipboard),
        ("Copy/paste", config.sources.keyboard),
        ("Browser history", config.sources.browser_history),
    ] {
        println!("  {name}: {}", if enabled { "enabled" } else { "disabled" });
    }
    println!("  Output: {} ({})", config.output_dir.display(), config.format.extension());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let transparency_log = create_shared_log_with_persistence(config.transparency_path());
    println!("Session ID: {}", transparency_log.session_id());

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let mut paused = config.paused;
    let mut controller =
        CollectorController::new(config, CollectorSources::system(), transparency_log.clone());
    controller.start().context("could not start collector")?;

    if paused {
        println!("Collection is currently paused.");
        println!("Run `activity-collector resume` to start collecting.");
        println!();
    }

    // Support pause/resume from another process by polling the config file.
    let mut last_config_check = Instant::now();
    while running.load(Ordering::SeqCst) {
        if last_config_check.elapsed() >= Duration::from_secs(1) {
            if let Ok(cfg) = Config::load() {
                if cfg.paused != paused {
                    paused = cfg.paused;
                    println!();
                    println!(
                        "{}",
                        if paused {
                            "Pausing collection..."
                        } else {
                            "Resuming collection..."
                        }
                    );
                    controller.set_paused(paused);
                }
            }
            last_config_check = Instant::now();
        }
        thread::sleep(Duration::from_millis(100));
    }

    println!();
    println!("Stopping collection...");
    let report = controller.stop();
    if !report.abandoned.is_empty() {
        eprintln!(
            "Warning: samplers still busy at shutdown: {}",
            report.abandoned.join(", ")
        );
    }

    println!();
    println!("{}", transparency_log.summary());
    Ok(())
}

fn cmd_pause() -> Result<()> {
    let mut config = Config::load()?;
    config.paused = true;
    config.save().context("could not save configuration")?;
    println!("Collection paused. Use 'activity-collector resume' to continue.");
    Ok(())
}

fn cmd_resume() -> Result<()> {
    let mut config = Config::load()?;
    config.paused = false;
    config.save().context("could not save configuration")?;
    println!("Collection resumed.");
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = Config::load()?;

    println!("Activity Collector Status");
    println!("=========================");
    println!();

    println!(
        "Keyboard Hook Permission: {}",
        if check_permission() {
            "Granted ✓"
        } else {
            "Not Granted ✗"
        }
    );
    println!();

    println!("Configuration:");
    println!("  Window sampler: {}", on_off(config.sources.window));
    println!("  Clipboard sampler: {}", on_off(config.sources.clipboard));
    println!("  Copy/paste listener: {}", on_off(config.sources.keyboard));
    println!("  Browser history sampler: {}", on_off(config.sources.browser_history));
    println!("  Paused: {}", config.paused);
    println!();

    println!("Streams in {}:", config.output_dir.display());
    for stream in Stream::ALL {
        let path = config.output_dir.join(stream.file_name(config.format));
        match count_records(&path, config.format) {
            Ok(count) => println!("  {:<16} {count}", stream.name()),
            Err(e) => println!("  {:<16} unreadable ({e})", stream.name()),
        }
    }
    println!();

    match read_persisted(&config.transparency_path()) {
        Ok(Some(stats)) => {
            let totals = stats.totals;
            println!("Cumulative Statistics:");
            println!("  Window changes: {}", totals.windows_recorded);
            println!("  Clipboard entries: {}", totals.clipboard_entries);
            println!("  Copy events: {}", totals.copy_events);
            println!("  Paste events: {}", totals.paste_events);
            println!("  Browser history rows: {}", totals.history_rows);
            println!("  Failed writes: {}", totals.persistence_failures);
            println!("  Last updated: {}", stats.last_updated);
        }
        Ok(None) => println!("No previous session data found."),
        Err(e) => println!("Could not read session statistics: {e}"),
    }
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_config() -> Result<()> {
    let config = Config::load()?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", Config::config_path().display());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("could not set Ctrl+C handler")
}
