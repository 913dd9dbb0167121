//! Page Highlights
//!
//! Command-line host for the highlight engine: opens an XHTML page as a
//! page session backed by the SQLite store, applies one operation and
//! prints the page with its highlights wrapped in marker elements.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use page_highlights::config::{Config, RenderBackendChoice};
use page_highlights::store::{JsonFileLegacyStorage, SqliteStorage};
use page_highlights::{Color, Document, PageSession, SessionContext};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(version, about = "Persistent text highlights for web pages", long_about = None)]
struct Cli {
    /// SQLite database holding highlight records
    #[arg(long, env = "HIGHLIGHTS_DATABASE_URL")]
    database: Option<String>,

    /// JSON dump of the legacy highlight namespace
    #[arg(long, env = "HIGHLIGHTS_LEGACY_FILE")]
    legacy: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore stored highlights and print the page
    Restore { url: String, page: PathBuf },
    /// Highlight the first occurrence of some text
    Add {
        url: String,
        page: PathBuf,
        text: String,
        #[arg(long, default_value = "yellow")]
        color: String,
    },
    /// Remove a highlight by its session id (as printed by `restore`)
    Remove { url: String, page: PathBuf, id: String },
    /// Remove every highlight stored for the page
    Clear { url: String, page: PathBuf },
    /// Print highlights in the export format as JSON
    Export { url: String, page: PathBuf },
}

impl Commands {
    fn target(&self) -> (&str, &PathBuf) {
        match self {
            Commands::Restore { url, page }
            | Commands::Add { url, page, .. }
            | Commands::Remove { url, page, .. }
            | Commands::Clear { url, page }
            | Commands::Export { url, page } => (url.as_str(), page),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "page_highlights=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let mut config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    let cli = Cli::parse();
    if let Some(database) = cli.database {
        config.storage.database_url = database;
    }
    if let Some(legacy) = cli.legacy {
        config.storage.legacy_file = Some(legacy.display().to_string());
    }
    // Output is serialized markup, so highlights must live in the tree
    config.engine.render_backend = RenderBackendChoice::Wrap;

    tracing::info!("Database: {}", config.storage.database_url);

    let storage = SqliteStorage::connect(&config.storage.database_url)
        .await
        .context("Failed to open highlight database")?;
    let mut context = SessionContext::new(Arc::new(storage)).with_config(config.engine.clone());
    if let Some(path) = &config.storage.legacy_file {
        context = context.with_legacy(Arc::new(JsonFileLegacyStorage::new(path)));
    }

    let (url, page) = cli.command.target();
    let source = std::fs::read_to_string(page)
        .with_context(|| format!("Failed to read {}", page.display()))?;
    let doc = Document::parse_xhtml(&source).context("Failed to parse page")?;
    let mut session = PageSession::open(&context, url, doc).await;

    let stats = session.restore_stats();
    eprintln!(
        "{}: {} restored, {} not found",
        session.document_key(),
        stats.restored,
        stats.failed
    );

    match &cli.command {
        Commands::Restore { .. } => {
            for annotation in session.list() {
                eprintln!("  {} [{}] {:?}", annotation.id, annotation.color, annotation.text);
            }
        }
        Commands::Add { text, color, .. } => {
            let Some(color) = Color::parse(color) else {
                bail!("Unknown color {:?}, expected yellow, green, blue or red", color);
            };
            let Some(range) = session.document().range_of(text) else {
                bail!("{:?} does not occur in a single text node of the page", text);
            };
            match session.create(&range, color).await {
                Some(id) => eprintln!("Created {}", id),
                None => bail!("Nothing to highlight"),
            }
        }
        Commands::Remove { id, .. } => {
            if !session.remove(id).await {
                bail!("No highlight with id {}", id);
            }
            eprintln!("Removed {}", id);
        }
        Commands::Clear { .. } => {
            session.clear().await;
            eprintln!("Cleared all highlights");
        }
        Commands::Export { .. } => {
            println!(
                "{}",
                serde_json::to_string_pretty(&session.collect_for_export())?
            );
            return Ok(());
        }
    }

    println!("{}", session.document().to_html());
    Ok(())
}
