//! topicmirror - Mirror a local folder tree into Telegram forum topics.
//!
//! Usage:
//!   topicmirror archive -c CHAT -p PATH   Upload every folder into its own topic
//!   topicmirror topics -c CHAT            Show the persisted folder to topic mapping
//!   topicmirror --help                    Show help

mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, OptionExt, Result};
use itertools::Itertools;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use topicmirror_archive::{ArchiveReport, Archiver};
use topicmirror_bot::{BotClient, DEFAULT_API_URL};
use topicmirror_core::ArchiveConfig;
use topicmirror_topics::{FileStore, TopicMapping};

use crate::settings::{Settings, TOKEN_ENV, parse_duration};

#[derive(Parser)]
#[command(
    name = "topicmirror",
    version,
    about = "Mirror a local folder tree into Telegram forum topics",
    long_about = "topicmirror uploads every file of a folder tree into a forum chat, \
                  one topic per folder. Topics are remembered between runs, so \
                  re-running over the same tree never creates duplicates."
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a folder tree into forum topics
    Archive(ArchiveArgs),

    /// Print the persisted folder to topic mapping of a chat
    Topics {
        /// Forum chat id or @username
        #[arg(short, long)]
        chat: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct ArchiveArgs {
    /// Forum chat id or @username
    #[arg(short, long)]
    chat: String,

    /// Folder to archive
    #[arg(short, long)]
    path: PathBuf,

    /// Prefix stripped from folder paths to build topic titles
    /// (defaults to the parent of PATH)
    #[arg(long)]
    strip_prefix: Option<PathBuf>,

    /// Only upload files with these extensions
    #[arg(short = 'i', long = "include", value_delimiter = ',', conflicts_with = "excludes")]
    includes: Vec<String>,

    /// Skip files with these extensions
    #[arg(short = 'e', long = "exclude", value_delimiter = ',')]
    excludes: Vec<String>,

    /// Remove local files once uploaded
    #[arg(long = "rm")]
    remove: bool,

    /// Send images as photos instead of documents
    #[arg(long)]
    photo: bool,

    /// Per-transfer parallelism hint
    #[arg(long)]
    threads: Option<usize>,

    /// Maximum number of concurrent uploads
    #[arg(long)]
    limit: Option<usize>,

    /// Pause between two uploads (e.g., "500ms", "2s")
    #[arg(long, value_parser = parse_duration)]
    delay: Option<Duration>,

    /// Caption markup; {name} and {mime} are substituted
    #[arg(long)]
    caption_template: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load();

    match cli.command {
        Command::Archive(args) => run_archive(args, &settings).await?,
        Command::Topics { chat, format } => run_topics(&chat, format, &settings)?,
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Open the topic mapping store.
fn open_store(settings: &Settings) -> Result<FileStore> {
    let dir = settings
        .storage_dir()
        .ok_or_eyre("No data directory; set storage_dir in the config file")?;
    FileStore::open(&dir).wrap_err_with(|| format!("Failed to open store at {}", dir.display()))
}

/// Build the archive configuration from flags, falling back to settings.
fn archive_config(args: ArchiveArgs, settings: &Settings) -> Result<ArchiveConfig> {
    let mut builder = ArchiveConfig::builder();
    builder
        .chat(args.chat)
        .path(args.path)
        .includes(args.includes)
        .excludes(args.excludes)
        .remove(args.remove)
        .photo(args.photo);

    if let Some(prefix) = args.strip_prefix {
        builder.strip_prefix(prefix);
    }
    if let Some(threads) = args.threads.or(settings.threads) {
        builder.threads(threads);
    }
    if let Some(limit) = args.limit.or(settings.limit) {
        builder.limit(limit);
    }

    let delay = match args.delay {
        Some(delay) => Some(delay),
        None => settings
            .delay()
            .map_err(color_eyre::eyre::Report::msg)
            .wrap_err("Invalid delay in config file")?,
    };
    if let Some(delay) = delay {
        builder.delay(delay);
    }

    if let Some(template) = args.caption_template.or_else(|| settings.caption_template.clone()) {
        builder.caption_template(template);
    }

    builder.build().wrap_err("Invalid archive options")
}

/// Run an archive pass.
async fn run_archive(args: ArchiveArgs, settings: &Settings) -> Result<()> {
    let config = archive_config(args, settings)?;

    let token = settings
        .bot_token()
        .ok_or_eyre(format!("No bot token; set {TOKEN_ENV} or bot_token in the config file"))?;
    let api_url = settings.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
    let client = Arc::new(BotClient::with_api_url(api_url, &token));
    let store = Arc::new(open_store(settings)?);

    eprintln!("Archiving {} into {}...", config.path.display(), config.chat);
    if !config.includes.is_empty() {
        eprintln!("Only: {}", config.includes.iter().join(", "));
    }
    if !config.excludes.is_empty() {
        eprintln!("Skipping: {}", config.excludes.iter().join(", "));
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, waiting for in-flight uploads");
                cancel.cancel();
            }
        }
    });

    let archiver = Archiver::new(client.clone(), client, store);
    let report = match archiver.run(&config, &cancel).await {
        Ok(report) => report,
        Err(err) if err.is_cancelled() => {
            eprintln!("Interrupted");
            return Ok(());
        }
        Err(err) => return Err(err).wrap_err("Archive failed"),
    };

    print_report(&report);

    Ok(())
}

/// Print the run summary.
fn print_report(report: &ArchiveReport) {
    let elapsed = report.elapsed().num_milliseconds() as f64 / 1000.0;

    println!();
    println!("{}", "─".repeat(60));
    println!(" Archive Summary");
    println!("{}", "─".repeat(60));
    println!(" {} folders, {} files", report.folders, report.files);
    println!(" {} topics created", report.topics_created);
    println!(
        " {} uploaded ({}), {} removed",
        report.upload.uploaded,
        format_size(report.upload.bytes),
        report.upload.removed
    );
    println!(" Finished in {elapsed:.2}s");
    println!("{}", "─".repeat(60));
}

/// Print the persisted mapping of a chat.
fn run_topics(chat: &str, format: OutputFormat, settings: &Settings) -> Result<()> {
    let store = open_store(settings)?;
    let mapping = TopicMapping::load(&store, chat).wrap_err("Failed to load topic mapping")?;

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(60));
            println!(" Topics of {chat}");
            println!("{}", "─".repeat(60));
            println!();

            if mapping.is_empty() {
                println!(" No topics recorded.");
            } else {
                let width = mapping.iter().map(|(title, _)| title.len()).max().unwrap_or(0);
                for (title, topic) in mapping.iter() {
                    println!("   {title:<width$}  {:>8}", topic.get());
                }
                println!();
                println!(" {} topics", mapping.len());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&mapping)?);
        }
    }

    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
