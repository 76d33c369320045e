use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use podsync::config::Config;
use podsync::feed::HttpFeedFetcher;
use podsync::repository::PodcastRepository;
use podsync::scheduler::{
    ChannelNotifier, Constraints, LogNotifier, PeriodicRequest, SchedulingHost, SystemDeviceState,
    UpdateJob, UPDATE_JOB_KEY,
};
use podsync::storage::{Database, DatabaseError, PodcastState, PodcastSummary};

type Repository = PodcastRepository<HttpFeedFetcher, Database>;

/// Get the config directory path (~/.config/podsync/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("podsync"))
}

#[derive(Parser, Debug)]
#[command(name = "podsync", version, about = "Podcast subscriptions with background episode sync")]
struct Args {
    /// Config file (default: ~/.config/podsync/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a podcast and its episodes, from the store if subscribed
    Show { feed_url: String },

    /// Fetch a feed and subscribe to it
    Subscribe {
        feed_url: String,
        /// Title to store instead of the feed's own
        #[arg(long)]
        title: Option<String>,
        /// Artwork URL to store with the podcast
        #[arg(long, value_name = "URL")]
        image_url: Option<String>,
    },

    /// Remove a subscription and its episodes
    Unsubscribe { feed_url: String },

    /// List subscribed podcasts
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Check every subscription for new episodes now
    Update,

    /// Keep checking for new episodes on the configured schedule until Ctrl-C
    Daemon,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    // SEC-007: Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config.database_path(&config_dir);
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let fetcher = HttpFeedFetcher::new(&config.http).context("Failed to build HTTP client")?;
    let repository = Arc::new(PodcastRepository::new(fetcher, db));

    match args.command {
        Command::Show { feed_url } => show(&repository, &feed_url).await,
        Command::Subscribe {
            feed_url,
            title,
            image_url,
        } => subscribe(&repository, &feed_url, title, image_url).await,
        Command::Unsubscribe { feed_url } => unsubscribe(&repository, &feed_url).await,
        Command::List { json } => list(&repository, json).await,
        Command::Update => update(repository).await,
        Command::Daemon => daemon(repository, &config).await,
    }
}

async fn show(repository: &Repository, feed_url: &str) -> Result<()> {
    let Some(state) = repository.get_podcast(feed_url).await? else {
        anyhow::bail!("Could not load feed: {feed_url}");
    };

    let status = if state.is_subscribed() { "subscribed" } else { "preview" };
    let podcast = state.podcast();
    println!("{} ({status})", podcast.feed_title);
    println!("{}", podcast.feed_url);
    if !podcast.feed_desc.is_empty() {
        println!();
        println!("{}", podcast.feed_desc);
    }
    println!();
    for episode in &podcast.episodes {
        let kind = if episode.is_video() { " [video]" } else { "" };
        println!(
            "{}  {}{kind}  {}",
            podsync::feed::short_date(&episode.release_date),
            episode.title,
            episode.duration
        );
    }
    println!("\n{} episodes", podcast.episodes.len());
    Ok(())
}

async fn subscribe(
    repository: &Repository,
    feed_url: &str,
    title: Option<String>,
    image_url: Option<String>,
) -> Result<()> {
    let state = match repository.get_podcast(feed_url).await? {
        Some(PodcastState::Subscribed(existing)) => {
            println!("Already subscribed to {}", existing.podcast.feed_title);
            return Ok(());
        }
        Some(state) => state,
        None => anyhow::bail!("Could not load feed: {feed_url}"),
    };

    let mut podcast = state.into_podcast();
    if let Some(title) = title {
        podcast.feed_title = title;
    }
    if let Some(image_url) = image_url {
        podcast.image_url = image_url;
    }

    let saved = repository
        .save(podcast)
        .await
        .context("Failed to save podcast")?;
    println!(
        "Subscribed to {} ({} episodes)",
        saved.podcast.feed_title,
        saved.podcast.episodes.len()
    );
    Ok(())
}

async fn unsubscribe(repository: &Repository, feed_url: &str) -> Result<()> {
    let Some(existing) = repository.store().load_podcast(feed_url).await? else {
        anyhow::bail!("Not subscribed: {feed_url}");
    };
    repository
        .delete(&existing)
        .await
        .context("Failed to delete podcast")?;
    println!("Unsubscribed from {}", existing.podcast.feed_title);
    Ok(())
}

async fn list(repository: &Repository, json: bool) -> Result<()> {
    let mut watcher = repository.get_all();
    let podcasts = watcher
        .next()
        .await
        .context("Podcast list unavailable")??;
    let summaries: Vec<PodcastSummary> = podcasts
        .iter()
        .map(|p| PodcastSummary::from(&p.podcast))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if summaries.is_empty() {
        println!("No subscriptions. Add one with: podsync subscribe <FEED_URL>");
        return Ok(());
    }
    for summary in &summaries {
        println!(
            "{}  {}  {}",
            summary.last_updated, summary.feed_title, summary.feed_url
        );
    }
    Ok(())
}

async fn update(repository: Arc<Repository>) -> Result<()> {
    let (notifier, mut notifications) = ChannelNotifier::new();
    let job = UpdateJob::new(repository, notifier);
    let report = job.run_once().await?;
    drop(job);

    while let Some(notification) = notifications.recv().await {
        println!("{}: {}", notification.title, notification.body);
    }
    for failure in &report.failures {
        eprintln!("Skipped {}: {}", failure.feed_url, failure.error);
    }
    if report.updates.is_empty() {
        println!("No new episodes.");
    }
    Ok(())
}

async fn daemon(repository: Arc<Repository>, config: &Config) -> Result<()> {
    let host = SchedulingHost::new(Arc::new(SystemDeviceState::default()));
    let request = PeriodicRequest {
        interval: config.update_interval(),
        constraints: Constraints {
            require_network: config.require_network,
            require_charging: config.require_charging,
        },
        constraint_poll: config.constraint_poll(),
    };
    host.enqueue_unique_periodic(UPDATE_JOB_KEY, request, UpdateJob::new(repository, LogNotifier))
        .context("Failed to schedule episode updates")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");
    host.shutdown().await;
    Ok(())
}
