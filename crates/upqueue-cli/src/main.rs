//! upqueue CLI
//!
//! Drives an upload session over a simulated transport.

mod config;
mod progress;
mod simulate;

use clap::{Parser, Subcommand};
use console::style;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use config::Config;
use progress::UploadBoard;
use simulate::SimulatedTransport;
use upqueue_core::{FileId, IdGenerator, SessionEventKind, UploadSession, format_bytes};

/// upqueue - queue, start, retry and cancel file uploads
#[derive(Parser)]
#[command(name = "upqueue")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files through the simulated transport
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Start each file as soon as it is added
        #[arg(long)]
        auto: bool,

        /// Probability that an attempt fails (overrides config)
        #[arg(long)]
        fail_rate: Option<f64>,

        /// Times a failed file is retried
        #[arg(long, default_value_t = 1)]
        retries: u32,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path)?;

    // Initialize logging
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.to_lowercase()
    };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Upload {
            files,
            auto,
            fail_rate,
            retries,
        } => {
            if auto {
                config.session.auto_upload = true;
            }
            if let Some(rate) = fail_rate {
                config.simulation.failure_rate = rate;
            }
            config.validate()?;
            upload_files(files, retries, config).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                config.validate()?;
                println!("# {}", config_path.display());
                print!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::Init { force } => {
                init_config(&config_path, force)?;
            }
        },
    }

    Ok(())
}

/// Write the default configuration to `path`
fn init_config(path: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    Config::default().save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Upload `paths`, retrying failures up to `retries` times each
async fn upload_files(paths: Vec<PathBuf>, retries: u32, config: Config) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let transport = SimulatedTransport::new(
        config.simulation.clone(),
        config.session.endpoint.clone(),
        tx,
    );
    let auto_upload = config.session.auto_upload;
    let mut session = UploadSession::new(config.session, transport, IdGenerator::new())?;

    let board = Arc::new(UploadBoard::new());
    for kind in SessionEventKind::ALL {
        let board = Arc::clone(&board);
        session.subscribe(kind, move |event| board.render(event));
    }

    for path in &paths {
        session.transport_mut().select(path);
    }
    while let Ok(event) = rx.try_recv() {
        session.handle_transport_event(event);
    }
    if session.is_empty() {
        anyhow::bail!("None of the selected files can be uploaded");
    }

    let total: u64 = session.files().iter().map(|f| f.metadata().size).sum();
    tracing::info!(
        files = session.count(),
        total = %format_bytes(total),
        "Files queued"
    );

    if !auto_upload {
        session.start_all();
    }

    let mut retried: HashMap<FileId, u32> = HashMap::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        for id in failed_ids(&session) {
            let used = retried.entry(id).or_insert(0);
            if *used < retries {
                *used += 1;
                tracing::info!(%id, attempt = *used, "Retrying upload");
                session.request_start(id)?;
            }
        }

        if !session.files().iter().any(|f| f.state().is_active()) {
            break;
        }

        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => session.handle_transport_event(event),
                None => break,
            },
            _ = &mut ctrl_c => {
                let canceled = session.cancel_all();
                tracing::warn!(canceled, "Interrupted");
                break;
            }
        }
    }

    board.finish();
    print_summary(&session);

    let done: Vec<FileId> = session
        .files()
        .iter()
        .filter(|f| f.is_done())
        .map(|f| f.id())
        .collect();
    for id in done {
        session.request_clear(id)?;
    }

    Ok(())
}

fn failed_ids<T: upqueue_core::Transport>(session: &UploadSession<T>) -> Vec<FileId> {
    session
        .files()
        .iter()
        .filter(|f| f.is_error())
        .map(|f| f.id())
        .collect()
}

fn print_summary<T: upqueue_core::Transport>(session: &UploadSession<T>) {
    println!();
    for file in session.files() {
        let meta = file.metadata();
        if file.is_done() {
            println!(
                "{} {} ({})",
                style("✓").green(),
                meta.name,
                format_bytes(meta.size)
            );
        } else if file.is_error() {
            println!(
                "{} {}: {}",
                style("✗").red(),
                meta.name,
                file.error_message().unwrap_or_default()
            );
        } else {
            println!("{} {} ({})", style("-").yellow(), meta.name, file.state());
        }
    }

    let done = session.files().iter().filter(|f| f.is_done()).count();
    let failed = session.files().iter().filter(|f| f.is_error()).count();
    println!(
        "\n{} uploaded, {} failed",
        style(done).bold().green(),
        style(failed).bold().red()
    );
}
