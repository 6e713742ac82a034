use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use research_harvest::acquire::Acquirer;
use research_harvest::config::{
    default_config_path, find_config_file, load_config, Config, LogFormat, LoggingConfig,
    CONFIG_FILE_NAME,
};
use research_harvest::library::{LibraryRegistry, MockLibrary};
use research_harvest::models::Request;
use research_harvest::ui::{self, FetchProgress, Status};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Synthetic result set size served by the built-in mock library
const MOCK_TOTAL: usize = 250;

/// Research Harvest - stream every publication matching a literature query
#[derive(Parser, Debug)]
#[command(name = "research-harvest")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "hongkongkiwi")]
#[command(about = "Stream every publication matching a literature query", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Library to query
    #[arg(long, short, global = true, default_value = "scopus")]
    library: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print how many publications match a query
    Count {
        /// Query in the library's own syntax
        query: String,
    },

    /// Stream every matching publication as JSON lines
    Fetch {
        /// Query in the library's own syntax
        query: String,

        /// Page size (library default when omitted)
        #[arg(long)]
        per_page: Option<usize>,

        /// Write JSON lines to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Cancel the run after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// List available libraries and their pacing
    Libraries,

    /// Write a default configuration file
    InitConfig {
        /// Where to write it (user config dir when omitted)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(cli: &Cli, logging: &LoggingConfig) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("research_harvest={}", level)),
    );

    let (json, text) = match logging.format {
        LogFormat::Json => (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Text => (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}

fn read_config(cli: &Cli) -> Result<(Config, Option<PathBuf>)> {
    let path = cli.config.clone().or_else(find_config_file);
    match path {
        Some(path) => {
            let config = load_config(&path)
                .with_context(|| format!("loading config {}", path.display()))?;
            Ok((config, Some(path)))
        }
        None => Ok((Config::default(), None)),
    }
}

/// Cancel `cancel` on Ctrl-C, and after `deadline` when one is given
fn watch_for_cancellation(cancel: &CancellationToken, deadline: Option<Duration>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling run");
            on_signal.cancel();
        }
    });

    if let Some(deadline) = deadline {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = on_deadline.cancelled() => {}
                _ = tokio::time::sleep(deadline) => {
                    tracing::warn!(deadline_secs = deadline.as_secs(), "deadline reached, cancelling run");
                    on_deadline.cancel();
                }
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_path) = read_config(&cli)?;
    init_tracing(&cli, &config.logging);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }

    let mut registry = LibraryRegistry::from_config(&config)?;
    registry.register(Arc::new(
        MockLibrary::new(MOCK_TOTAL).with_latency(Duration::from_millis(50)),
    ));

    match cli.command {
        Commands::Count { ref query } => {
            let library = registry.get_required(&cli.library)?;
            let total = Acquirer::new(Arc::clone(library))
                .total_count(&Request::new(query.as_str()).per_page(config.fetch.per_page))
                .await
                .with_context(|| format!("counting publications in {}", library.name()))?;
            println!("{}", total);
        }

        Commands::Fetch {
            ref query,
            per_page,
            ref output,
            deadline_secs,
        } => {
            let library = registry.get_required(&cli.library)?;
            let request = Request::new(query.as_str())
                .per_page(per_page.unwrap_or(config.fetch.per_page));

            let cancel = CancellationToken::new();
            watch_for_cancellation(&cancel, deadline_secs.map(Duration::from_secs));

            let mut writer: Box<dyn Write> = match output {
                Some(path) => Box::new(BufWriter::new(
                    File::create(path)
                        .with_context(|| format!("creating {}", path.display()))?,
                )),
                None => Box::new(BufWriter::new(std::io::stdout())),
            };

            let mut queue = Acquirer::new(Arc::clone(library))
                .with_queue_capacity(config.fetch.queue_capacity)
                .acquire(request, cancel)
                .await;

            let progress = FetchProgress::new(
                library.name(),
                queue.declared_max(),
                !cli.quiet && ui::is_terminal(),
            );

            while let Some(publication) = queue.recv().await {
                writeln!(writer, "{}", publication.to_json_line()?)?;
                progress.inc();
            }
            writer.flush()?;

            match queue.err() {
                Some(err) => {
                    progress.finish_with_error(&err.to_string());
                    return Err(err.clone()).with_context(|| {
                        format!(
                            "literature run stopped after {} of {} publications",
                            queue.received(),
                            queue.declared_max()
                        )
                    });
                }
                None => progress.finish_with_success(),
            }
        }

        Commands::Libraries => {
            for library in registry.all() {
                ui::print_library(library.as_ref());
            }
        }

        Commands::InitConfig { ref path, force } => {
            let path = path
                .clone()
                .or_else(default_config_path)
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }

            let mut template = Config::default();
            template.api_keys.scopus = None;
            template.save(&path)?;

            if !cli.quiet {
                ui::print_status(Status::Success, &format!("Wrote {}", path.display()));
            }
        }
    }

    Ok(())
}
