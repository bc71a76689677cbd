use std::sync::Arc;
use anyhow::Result;
use clap::{Parser, Subcommand};
use helena_core::{
    AssetCache, ChatBackend, Config, DiskStorage, GeminiClient, HttpFetcher, Session,
};

mod app;
mod handler;
mod logging;
mod preview;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, TerminalGuard};

#[derive(Parser)]
#[command(name = "helena")]
#[command(version, about = "Helena: chat with Gemini and preview books, HTML and images")]
struct Cli {
    /// Gemini model to use (overrides the config file)
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat interface (default)
    Chat,
    /// Manage the offline asset cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// List known Gemini models
    Models {
        /// Save this model as the default in the config file
        #[arg(long)]
        set: Option<String>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Download the asset manifest into the current bucket
    Install,
    /// Delete every bucket except the current one
    Activate,
    /// Resolve a URL through the cache
    Fetch {
        /// Absolute URL to fetch
        url: String,
    },
    /// List bucket names
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = logging::init_logging()?;
    let mut config = Config::load()?;
    if let Some(model) = cli.model {
        config.model = Some(model);
    }

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&config).await?,
        Commands::Cache { action } => run_cache(config, action).await?,
        Commands::Models { set } => {
            if let Some(model) = set {
                config.model = Some(model);
                config.save()?;
                println!("Default model saved to {}", Config::get_config_path()?.display());
            }
            for model in GeminiClient::list_models() {
                let marker = if model == config.model() { "*" } else { " " };
                println!("{} {}", marker, model);
            }
        }
    }

    log::info!("Exiting; log kept at {}", log_path.display());
    Ok(())
}

fn build_backend(config: &Config) -> Option<Arc<dyn ChatBackend>> {
    let Some(api_key) = config.api_key() else {
        log::error!("GEMINI_API_KEY is not set and no key is configured");
        return None;
    };
    if !GeminiClient::list_models().iter().any(|m| m == config.model()) {
        log::warn!("Model {} is not in the known list; trying anyway", config.model());
    }

    let client = GeminiClient::new(&api_key)
        .with_model(config.model())
        .with_base_url(config.api_base_url());
    let backend: Arc<dyn ChatBackend> = Arc::new(client);
    Some(backend)
}

async fn run_chat(config: &Config) -> Result<()> {
    let session = Session::new(build_backend(config));
    let mut app = App::new(session);

    tui::install_panic_hook();
    let (_guard, mut terminal) = TerminalGuard::new()?;
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(&mut app, event).await?;
    }

    Ok(())
}

async fn run_cache(config: Config, action: CacheAction) -> Result<()> {
    let cache = AssetCache::new(
        config.cache,
        DiskStorage::new(DiskStorage::default_root()),
        HttpFetcher::new(),
    );

    match action {
        CacheAction::Install => {
            let count = cache.install().await?;
            println!(
                "Cached {} resources in {}",
                count,
                cache.settings().name
            );
        }
        CacheAction::Activate => {
            let deleted = cache.activate().await?;
            if deleted.is_empty() {
                println!("No stale caches");
            }
            for name in deleted {
                println!("Deleted {}", name);
            }
        }
        CacheAction::Fetch { url } => {
            let fetched = cache.fetch(&url).await?;
            let response = fetched.response;
            println!(
                "{} {} ({:?}, {}, {} bytes)",
                response.status,
                response.url,
                fetched.source,
                response.content_type.as_deref().unwrap_or("unknown type"),
                response.body.len()
            );
        }
        CacheAction::List => {
            use helena_core::cache::CacheStorage;

            println!("Buckets in {}", cache.storage().root().display());
            for name in cache.storage().keys().await? {
                let marker = if name == cache.settings().name { "*" } else { " " };
                println!("{} {}", marker, name);
            }
        }
    }

    Ok(())
}
