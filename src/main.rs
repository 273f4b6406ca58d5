use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use nitroless::config::{Backend, Config};
use nitroless::repo::build_client;
use nitroless::storage::{FileListStore, ListStore, SqliteListStore};
use nitroless::store::{RecencyList, RepositoryStore, StoreOptions};

/// Get the config directory path (~/.config/nitroless/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("nitroless"))
}

/// Get the default shared data directory (~/.local/share/nitroless/)
fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("nitroless"))
}

/// Create the data directory, user-only on Unix.
fn prepare_data_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        tracing::info!(path = %dir.display(), "Created data directory");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to set data directory permissions to 0700"
            );
        }
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "nitroless", about = "Manage Nitroless emote and sticker repositories")]
struct Args {
    /// Config file (default: ~/.config/nitroless/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Shared data directory (overrides config)
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List subscribed repositories (default)
    List,
    /// Subscribe to a repository
    Add { url: String },
    /// Unsubscribe from a repository and drop its favourites
    Remove { url: String },
    /// Print a repository's manifest without subscribing
    Manifest { url: String },
    /// Record use of an emote
    UseEmote { url: String },
    /// Record use of a sticker
    UseSticker { url: String },
    /// Pin an emote as a favourite of its repository
    Favourite { repo: String, emote: String },
    /// Unpin a favourite emote
    Unfavourite { repo: String, emote: String },
    /// Show frequently used emotes (or stickers)
    Frequent {
        #[arg(long)]
        stickers: bool,
    },
    /// Show favourite emotes across all repositories
    Favourites,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let data_dir = match args.data_dir.clone().or_else(|| config.data_dir.clone()) {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    prepare_data_dir(&data_dir)?;

    let client = build_client(&config.user_agent).context("Failed to build HTTP client")?;
    let options = config.store_options();
    let command = args.command.unwrap_or(Command::List);

    match config.backend {
        Backend::Files => run(FileListStore::new(&data_dir), client, options, command).await,
        Backend::Sqlite => {
            let db_path = data_dir.join("lists.db");
            let db_path = db_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
            let lists = SqliteListStore::open(db_path)
                .await
                .context("Failed to open list database")?;
            run(lists, client, options, command).await
        }
    }
}

async fn run<S: ListStore>(
    lists: S,
    client: reqwest::Client,
    options: StoreOptions,
    command: Command,
) -> Result<ExitCode> {
    let mut store = RepositoryStore::open(lists, client, options)
        .await
        .context("Failed to load settings")?;

    match command {
        Command::List => {
            store.settle().await;
            print_repositories(&store);
        }
        Command::Add { url } => {
            if !store.add_source(&url).await {
                eprintln!("Invalid URL: {}", url);
                eprintln!("Please check the URL and try again.");
                return Ok(ExitCode::FAILURE);
            }
            store.settle().await;
            match store.repository(&url) {
                Some(repo) if repo.is_resolved() => println!("Added {}", repo.display_name()),
                Some(repo) => println!(
                    "Added {}, but its manifest is unavailable: {}",
                    repo.source,
                    repo.error.as_deref().unwrap_or("unknown error")
                ),
                None => println!("Added {}", url),
            }
        }
        Command::Remove { url } => {
            if !store.remove_source(&url).await {
                eprintln!("Not removed: {} is not subscribed or the source list could not be saved", url);
                return Ok(ExitCode::FAILURE);
            }
            println!("Removed {}", url);
        }
        Command::Manifest { url } => {
            let manifest = store
                .get_manifest(&url)
                .await
                .with_context(|| format!("Failed to fetch manifest for {}", url))?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        Command::UseEmote { url } => {
            store.add_to_recency(RecencyList::Emotes, &url).await;
            print_list(store.frequent_emotes());
        }
        Command::UseSticker { url } => {
            store.add_to_recency(RecencyList::Stickers, &url).await;
            print_list(store.frequent_stickers());
        }
        Command::Favourite { repo, emote } => {
            store.add_to_favourites(&repo, &emote).await;
            print_list(store.favourites());
        }
        Command::Unfavourite { repo, emote } => {
            store.remove_from_favourites(&repo, &emote).await;
            print_list(store.favourites());
        }
        Command::Frequent { stickers } => {
            if stickers {
                print_list(store.frequent_stickers());
            } else {
                print_list(store.frequent_emotes());
            }
        }
        Command::Favourites => print_list(store.favourites()),
    }

    Ok(ExitCode::SUCCESS)
}

fn print_repositories<S: ListStore>(store: &RepositoryStore<S>) {
    if !store.has_repositories() {
        println!("No repositories. Add one with: nitroless add <URL>");
        return;
    }

    for repo in store.repositories() {
        match &repo.manifest {
            Some(manifest) => {
                let author = manifest
                    .author
                    .as_deref()
                    .map(|a| format!(" by {}", a))
                    .unwrap_or_default();
                println!(
                    "{}{}  {}  ({} emotes, {} stickers, {} favourites)",
                    manifest.name,
                    author,
                    repo.source,
                    manifest.emotes.len(),
                    manifest.stickers.as_ref().map_or(0, Vec::len),
                    repo.favourites.len()
                );
            }
            None => println!(
                "{}  unavailable: {}  (remove with: nitroless remove {})",
                repo.source,
                repo.error.as_deref().unwrap_or("unknown error"),
                repo.source
            ),
        }
    }
}

fn print_list(items: &[String]) {
    if items.is_empty() {
        println!("(empty)");
    }
    for item in items {
        println!("{}", item);
    }
}
