//! agrolink - Main Entry Point
//!
//! Command line front-end for the soil sensor link, the saved log and the
//! crop prediction bridge.

use agrolink_rs::{
    config::{resolve_data_dir, AppConfig},
    link::{LinkEvent, LinkService, LinkStats, LinkTransport},
    logging,
    parser::classify,
    prediction::{HttpScoringClient, PredictionBridge, PredictionForm},
    storage::{FileStore, SavedLog},
    types::{ConnectionState, RawFrame, SavedMessage},
    AgrolinkError,
};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(
    name = "agrolink",
    version,
    about = "Soil sensor link, saved frame log and crop prediction"
)]
struct Cli {
    /// Data directory (defaults to the platform app data directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (defaults to <data-dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan, connect and stream frames from the sensor
    Monitor {
        /// Use the scripted transport instead of a radio
        #[arg(long)]
        mock: bool,

        /// Add every received frame to the saved log
        #[arg(long)]
        save: bool,

        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<usize>,

        /// Stop after this many seconds without any link event
        #[arg(long, default_value_t = 5)]
        idle_secs: u64,
    },

    /// Classify one frame of text
    Classify {
        text: String,
    },

    /// Curate the saved log
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },

    /// Stage saved frames, fill the form and request a prediction
    Predict(PredictArgs),

    /// Show or initialise the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum SavedAction {
    /// List saved messages, oldest first
    List,
    /// Delete a saved message by id
    Delete { id: String },
    /// Save a frame text stamped with the current time
    Save { text: String },
    /// Unsave the message with this id, or save the message it describes
    Toggle { id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Saved message id to stage (repeatable)
    #[arg(long = "stage", value_name = "ID")]
    stage: Vec<String>,

    #[arg(long)]
    nitrogen: Option<String>,
    #[arg(long)]
    phosphorus: Option<String>,
    #[arg(long)]
    potassium: Option<String>,
    #[arg(long)]
    ph: Option<String>,
    #[arg(long)]
    temperature: Option<String>,
    #[arg(long)]
    humidity: Option<String>,

    /// Print the request body instead of submitting it
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| AppConfig::path_in(&data_dir));
    let loaded = AppConfig::load(&config_path);
    let config = loaded.as_ref().cloned().unwrap_or_default();

    // Initialize logging
    let _log_guard = logging::init(&config.logging, &data_dir);
    if let Err(e) = &loaded {
        tracing::warn!("Failed to load config, using defaults: {}", e);
    }
    tracing::debug!("Data directory: {}", data_dir.display());

    match cli.command {
        Command::Monitor {
            mock,
            save,
            max_frames,
            idle_secs,
        } => run_monitor(
            &config,
            &data_dir,
            mock,
            save,
            max_frames,
            Duration::from_secs(idle_secs),
        ),
        Command::Classify { text } => {
            let reading = classify(&text);
            if reading.is_recognized() {
                println!("{}: {}", reading.label(), reading);
            } else {
                println!("{}", reading.label());
            }
            Ok(())
        }
        Command::Saved { action } => run_saved(&config, &data_dir, action),
        Command::Predict(args) => run_predict(&config, &data_dir, args),
        Command::Config { action } => run_config(&config, &config_path, action),
    }
}

fn open_saved_log(config: &AppConfig, data_dir: &Path) -> SavedLog {
    SavedLog::restore(
        Box::new(FileStore::new(data_dir)),
        config.storage.saved_log_key.clone(),
    )
}

/// Surface a library error with its short user-facing text
fn user_error(err: AgrolinkError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

#[cfg(feature = "mock-link")]
fn mock_transport(device_name: &str) -> Option<Box<dyn LinkTransport>> {
    Some(Box::new(agrolink_rs::link::MockTransport::demo(device_name)))
}

#[cfg(not(feature = "mock-link"))]
fn mock_transport(_device_name: &str) -> Option<Box<dyn LinkTransport>> {
    None
}

fn run_monitor(
    config: &AppConfig,
    data_dir: &Path,
    mock: bool,
    save: bool,
    max_frames: Option<usize>,
    idle: Duration,
) -> Result<()> {
    if !mock {
        bail!("No radio backend is built into this binary; run with --mock");
    }
    let transport = mock_transport(&config.link.device_name)
        .ok_or_else(|| anyhow!("Built without the mock-link feature"))?;

    let mut saved_log = save.then(|| open_saved_log(config, data_dir));
    let (service, handle) = LinkService::new(config.link.clone(), transport);
    let worker = std::thread::Builder::new()
        .name("agrolink-link".to_string())
        .spawn(move || service.run())
        .context("Failed to spawn link thread")?;

    tracing::info!("Looking for '{}'", config.link.device_name);
    handle.start_scan();

    let mut feed: Vec<RawFrame> = Vec::new();
    let mut received = 0usize;
    let mut last_event = Instant::now();

    while last_event.elapsed() < idle {
        let Some(event) = handle.recv_timeout(Duration::from_millis(100)) else {
            continue;
        };
        last_event = Instant::now();

        match event {
            LinkEvent::StateChanged(state) => {
                println!("status: {}", state);
                if state == ConnectionState::Failed {
                    break;
                }
            }
            LinkEvent::FeedCleared => feed.clear(),
            LinkEvent::Frame(frame) => {
                let reading = classify(&frame.text);
                println!("#{:<4} {:<28} {}", frame.seq, frame.text, reading.label());

                if let Some(log) = saved_log.as_mut() {
                    let message = SavedMessage::from(&frame);
                    if !log.contains(&message.id) {
                        log.toggle(message);
                    }
                }
                feed.push(frame);
                received += 1;
                if max_frames.is_some_and(|max| received >= max) {
                    break;
                }
            }
            LinkEvent::ConnectionError(message) => {
                eprintln!("{}: {}", ConnectionState::Failed, message);
            }
            LinkEvent::Stats(_) | LinkEvent::Shutdown => {}
        }
    }

    handle.request_stats();
    handle.shutdown();
    if worker.join().is_err() {
        tracing::error!("Link thread panicked");
    }

    let stats = handle.drain().into_iter().find_map(|event| match event {
        LinkEvent::Stats(stats) => Some(stats),
        _ => None,
    });

    println!();
    println!("Received frames (newest first):");
    for frame in feed.iter().rev() {
        println!("  {}  {}", frame.received_at.format("%H:%M:%S%.3f"), frame.text);
    }
    if let Some(stats) = stats {
        print_stats(&stats);
    }
    if let Some(log) = &saved_log {
        println!("Saved log now holds {} message(s)", log.len());
    }
    Ok(())
}

fn print_stats(stats: &LinkStats) {
    println!(
        "scans: {}  connects: {}  frames: {}  bytes: {}  failures: {}",
        stats.scans_started,
        stats.connect_attempts,
        stats.frames_received,
        stats.bytes_received,
        stats.failures
    );
}

fn run_saved(config: &AppConfig, data_dir: &Path, action: SavedAction) -> Result<()> {
    let mut log = open_saved_log(config, data_dir);

    match action {
        SavedAction::List => {
            if log.is_empty() {
                println!("No saved messages");
            }
            for message in log.list() {
                let reading = classify(&message.text);
                println!(
                    "{}\t{}\t{}\t{}",
                    message.id,
                    message.timestamp.to_rfc3339(),
                    reading.label(),
                    message.text
                );
            }
        }
        SavedAction::Delete { id } => {
            if log.delete(&id) {
                println!("Deleted {}", id);
            } else {
                println!("No saved message {}", id);
            }
        }
        SavedAction::Save { text } => {
            let message = SavedMessage::new(text, Utc::now());
            let id = message.id.clone();
            if !log.contains(&id) {
                log.toggle(message);
            }
            println!("Saved {}", id);
        }
        SavedAction::Toggle { id } => {
            if log.toggle_id(&id)? {
                println!("Saved {}", id);
            } else {
                println!("Unsaved {}", id);
            }
        }
    }
    Ok(())
}

fn run_predict(config: &AppConfig, data_dir: &Path, args: PredictArgs) -> Result<()> {
    let log = open_saved_log(config, data_dir);
    let client = HttpScoringClient::new(&config.scoring).map_err(user_error)?;
    let mut bridge = PredictionBridge::new(client);

    for id in &args.stage {
        let message = log
            .get(id)
            .ok_or_else(|| anyhow!("No saved message {}", id))?;
        if let Err(e) = bridge.stage_from_saved_message(message) {
            eprintln!("{} ({})", e.user_message(), message.text);
        }
    }

    let mut form = PredictionForm::new();
    form.pull_from(bridge.pending());
    let overrides = [
        (&mut form.nitrogen, args.nitrogen),
        (&mut form.phosphorus, args.phosphorus),
        (&mut form.potassium, args.potassium),
        (&mut form.ph, args.ph),
        (&mut form.temperature, args.temperature),
        (&mut form.humidity, args.humidity),
    ];
    for (field, value) in overrides {
        if let Some(value) = value {
            *field = value;
        }
    }

    let request = match bridge.build_prediction_request(&form) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Missing: {}", form.missing_fields().join(", "));
            return Err(user_error(e));
        }
    };

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&request)?);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let crop = runtime
        .block_on(bridge.submit_prediction(&request))
        .map_err(user_error)?;

    println!("Suitable crop: {}", crop);
    Ok(())
}

fn run_config(config: &AppConfig, config_path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# {}", config_path.display());
            print!("{}", toml::to_string_pretty(config)?);
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                );
            }
            AppConfig::default().save(config_path)?;
            println!("Wrote {}", config_path.display());
        }
    }
    Ok(())
}
