//! wiki-importer: publish external knowledge sources as NIP-54 wiki events

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};
use wiki_importer::{
    config::{Config, LogFormat, LogLevel, LoggingConfig, DEFAULT_CONFIG_FILE},
    import::{HttpFetcher, ImportCoordinatorBuilder},
    publish::{Keys, Publisher, RelaySink},
    sources::{mediawiki::check_profile, Importer},
    types::Cursor,
};

#[derive(Parser)]
#[command(name = "wiki-importer")]
#[command(about = "Import external knowledge sources as NIP-54 wiki events")]
#[command(version)]
struct Cli {
    /// Configuration file path (default: wiki-importer.toml, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress the progress spinner
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import every page of a MediaWiki site
    Mediawiki {
        /// Wiki host, e.g. en.wikipedia.org
        #[arg(long)]
        host: Option<String>,

        /// Resume after this page title
        #[arg(long = "continue", value_name = "TITLE")]
        resume: Option<String>,
    },

    /// Import ProgArchives albums or artists
    Progarchives {
        #[command(subcommand)]
        kind: ProgArchivesKind,
    },

    /// Import movies from the daily TMDB export
    Movies {
        /// Resume after the line at this byte offset
        #[arg(long = "continue", value_name = "OFFSET")]
        resume: Option<String>,

        /// Read this export instead of downloading today's
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Import persons from the daily TMDB export
    Persons {
        /// Resume after the line at this byte offset
        #[arg(long = "continue", value_name = "OFFSET")]
        resume: Option<String>,

        /// Read this export instead of downloading today's
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Import name definitions from behindthename.com
    Names {
        /// Resume after entry INDEX of list page PAGE, or at the start of PAGE
        #[arg(long = "continue", value_name = "PAGE/INDEX")]
        resume: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProgArchivesKind {
    /// Album pages
    Albums {
        /// Resume after this album id
        #[arg(long = "continue", value_name = "ID")]
        resume: Option<String>,
    },
    /// Artist pages
    Artists {
        /// Resume after this artist id
        #[arg(long = "continue", value_name = "ID")]
        resume: Option<String>,
    },
}

impl Commands {
    /// Apply command flags to `config`, returning the importer and the raw
    /// resume position
    fn apply(self, config: &mut Config) -> (Importer, Option<String>) {
        match self {
            Commands::Mediawiki { host, resume } => {
                if let Some(host) = host {
                    config.mediawiki.host = host;
                }
                (Importer::MediaWiki, resume)
            }
            Commands::Progarchives { kind } => match kind {
                ProgArchivesKind::Albums { resume } => (Importer::ProgArchivesAlbums, resume),
                ProgArchivesKind::Artists { resume } => (Importer::ProgArchivesArtists, resume),
            },
            Commands::Movies { resume, dump } => {
                if dump.is_some() {
                    config.movies.dump_path = dump;
                }
                (Importer::Movies, resume)
            }
            Commands::Persons { resume, dump } => {
                if dump.is_some() {
                    config.movies.dump_path = dump;
                }
                (Importer::Persons, resume)
            }
            Commands::Names { resume } => (Importer::Names, resume),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&PathBuf::from(DEFAULT_CONFIG_FILE))?,
    };
    let mut config = config.with_env_overlay();
    let (importer, resume) = cli.command.apply(&mut config);

    init_logging(&config.logging, cli.verbose, importer.name())?;
    config.validate_for(importer)?;

    let resume = resume
        .map(|raw| importer.cursor_kind().parse(&raw))
        .transpose()
        .context("Invalid --continue value")?;

    run_import(config, importer, resume, cli.quiet).await
}

type Subscriber = Layered<EnvFilter, Registry>;

/// Log to stdout and append to `<dir>/<importer>.log`
fn init_logging(logging: &LoggingConfig, verbose: u8, importer: &str) -> Result<()> {
    let level = LogLevel::from_verbosity(verbose).unwrap_or(logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    std::fs::create_dir_all(&logging.dir)
        .with_context(|| format!("Failed to create log directory '{}'", logging.dir.display()))?;
    let path = logging.file_for(importer);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
    let file = Arc::new(file);

    let layers: Vec<Box<dyn Layer<Subscriber> + Send + Sync>> = match logging.format {
        LogFormat::Text => vec![
            fmt::layer().with_target(false).boxed(),
            fmt::layer().with_target(false).with_ansi(false).with_writer(file).boxed(),
        ],
        LogFormat::Json => vec![
            fmt::layer().json().boxed(),
            fmt::layer().json().with_writer(file).boxed(),
        ],
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .context("Failed to install the log subscriber")?;
    Ok(())
}

async fn run_import(config: Config, importer: Importer, resume: Option<Cursor>, quiet: bool) -> Result<()> {
    let secret = config.nostr.secret_key.as_deref().context("No signing key configured")?;
    let relay = config.nostr.relay_url.clone().context("No relay configured")?;
    let keys = Keys::from_hex(secret)?;
    let pubkey = keys.public_key_hex();

    info!("[{}] using pubkey={} relay={}", importer, pubkey, relay);

    if importer == Importer::MediaWiki && config.mediawiki.verify_profile {
        let wiki = &config.mediawiki;
        check_profile(&pubkey, &wiki.host, &wiki.profile_relays, wiki.profile_timeout()).await?;
    }

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let fetcher = HttpFetcher::new(config.fetch_config())?;
    let source = importer.build(&config, fetcher, resume.as_ref(), &cancel).await?;
    if let Some(cursor) = &resume {
        info!("Resuming {} after {}", importer, cursor);
    }

    let sink = RelaySink::new(relay, config.nostr.connect_timeout(), config.nostr.ack_timeout());
    let mut coordinator = ImportCoordinatorBuilder::new()
        .with_transformer(source.transformer)
        .with_publisher(Publisher::new(keys, Box::new(sink)))
        .with_config(config.pipeline_config(source.total_hint))
        .with_cancellation(cancel)
        .with_quiet(quiet)
        .build()?;

    let stats = coordinator.run(source.enumerator).await?;
    if stats.cancelled {
        warn!("Run of {} was interrupted", importer);
    }
    Ok(())
}

/// Cancel the run on Ctrl+C or SIGTERM
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping import");
            }
            _ = wait_for_sigterm() => {
                info!("Received SIGTERM, stopping import");
            }
        }
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
