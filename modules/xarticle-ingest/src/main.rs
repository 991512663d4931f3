use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rapidapi_client::{TwitterClient, TwitterClientConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use xarticle_common::Config;
use xarticle_ingest::{ArticleStore, IngestOptions, IngestReport, Ingestor, ShortUrlExpander};

#[derive(Parser)]
#[command(name = "xarticle-ingest", about = "Harvest X Articles into Postgres")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,

    /// Scan curated lists for articles
    Lists {
        /// List ids to scan (defaults to every active list in the database)
        #[arg(long = "list-id")]
        list_ids: Vec<String>,

        /// Timeline pages to read per list
        #[arg(long, env = "INGEST_MAX_LIST_PAGES")]
        max_pages: Option<u32>,

        /// Harvest tweets that have neither an article nor a link card
        #[arg(long)]
        include_plain_tweets: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Ingest specific tweets by URL or id
    Tweets {
        /// Tweet URLs or ids
        refs: Vec<String>,

        /// File with one tweet URL or id per line ('#' starts a comment)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Milliseconds between tweet fetches
        #[arg(long, env = "INGEST_REQUEST_DELAY_MS")]
        delay_ms: Option<u64>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Resolve t.co links stored on existing articles
    ExpandUrls {
        /// Maximum number of articles to process
        #[arg(long, default_value_t = 100)]
        limit: i64,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Manage curated lists
    #[command(subcommand)]
    List(ListCommand),
}

#[derive(Args)]
struct RunArgs {
    /// Harvest and report without writing to the database
    #[arg(long)]
    dry_run: bool,

    /// Leave tweets that already have an article untouched
    #[arg(long)]
    skip_existing: bool,

    /// Resolve t.co original URLs before writing
    #[arg(long)]
    expand_short_urls: bool,
}

#[derive(Subcommand)]
enum ListCommand {
    /// Register a list (or rename and reactivate it)
    Add {
        list_id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    /// Include a list in scans
    Enable { list_id: String },

    /// Exclude a list from scans
    Disable { list_id: String },

    /// Show registered lists
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("xarticle=info".parse()?)
                .add_directive("rapidapi_client=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate => {
            let store = open_store(&Config::store_from_env()?).await?;
            store.migrate().await.context("Migration failed")?;
            info!("Migrations applied");
        }

        Commands::Lists {
            list_ids,
            max_pages,
            include_plain_tweets,
            run,
        } => {
            let config = Config::from_env()?;
            config.log_redacted();
            let store = open_store(&config).await?;
            store.migrate().await?;

            let list_ids = if list_ids.is_empty() {
                store.active_list_ids().await?
            } else {
                list_ids
            };
            if list_ids.is_empty() {
                warn!("No lists to scan. Add one with `xarticle-ingest list add <ID> --name <NAME>`");
                return Ok(());
            }

            let mut options = run.apply(IngestOptions::from_config(&config));
            options.include_plain_tweets = include_plain_tweets;
            if let Some(pages) = max_pages {
                options.max_list_pages = pages;
            }

            info!(lists = list_ids.len(), dry_run = options.dry_run, "List ingestion starting");
            let ingestor = ingestor(&config, store, options)?;
            let report = ingestor.ingest_lists(&list_ids).await;
            finish("List ingestion", &report);
        }

        Commands::Tweets {
            mut refs,
            file,
            delay_ms,
            run,
        } => {
            if let Some(path) = file {
                refs.extend(read_refs(&path)?);
            }
            if refs.is_empty() {
                anyhow::bail!("No tweets given. Pass URLs/ids or --file <PATH>");
            }

            let config = Config::from_env()?;
            config.log_redacted();
            let store = open_store(&config).await?;
            store.migrate().await?;

            let mut options = run.apply(IngestOptions::from_config(&config));
            if let Some(ms) = delay_ms {
                options.request_delay = Duration::from_millis(ms);
            }

            info!(tweets = refs.len(), dry_run = options.dry_run, "Tweet ingestion starting");
            let ingestor = ingestor(&config, store, options)?;
            let report = ingestor.ingest_tweets(&refs).await;
            finish("Tweet ingestion", &report);
        }

        Commands::ExpandUrls { limit, dry_run } => {
            let config = Config::store_from_env()?;
            let store = open_store(&config).await?;
            let options = IngestOptions {
                dry_run,
                ..IngestOptions::from_config(&config)
            };
            let ingestor = Ingestor::new(NoSource, store, options)
                .with_url_expander(ShortUrlExpander::new()?);
            let report = ingestor.expand_short_urls(limit).await?;
            info!("URL expansion complete. {report}");
        }

        Commands::List(cmd) => {
            let store = open_store(&Config::store_from_env()?).await?;
            store.migrate().await?;
            run_list_command(&store, cmd).await?;
        }
    }

    Ok(())
}

impl RunArgs {
    fn apply(&self, mut options: IngestOptions) -> IngestOptions {
        options.dry_run = self.dry_run;
        options.skip_existing = self.skip_existing;
        options.expand_short_urls = self.expand_short_urls;
        options
    }
}

async fn open_store(config: &Config) -> Result<ArticleStore> {
    ArticleStore::connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")
}

fn ingestor(
    config: &Config,
    store: ArticleStore,
    options: IngestOptions,
) -> Result<Ingestor<TwitterClient, ArticleStore>> {
    let client = TwitterClient::new(TwitterClientConfig {
        api_host: config.rapidapi_host.clone(),
        timeout: Duration::from_millis(config.twitter_timeout_ms),
        request_interval: Duration::from_millis(config.twitter_request_interval_ms),
        ..TwitterClientConfig::new(config.rapidapi_key.clone())
    })?;

    let mut ingestor = Ingestor::new(client, store, options);
    if ingestor.options().expand_short_urls {
        ingestor = ingestor.with_url_expander(ShortUrlExpander::new()?);
    }
    Ok(ingestor)
}

fn finish(label: &str, report: &IngestReport) {
    for error in &report.errors {
        warn!(%error, "Ingestion error");
    }
    info!("{label} complete. {report}");
}

fn read_refs(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

async fn run_list_command(store: &ArticleStore, cmd: ListCommand) -> Result<()> {
    match cmd {
        ListCommand::Add {
            list_id,
            name,
            description,
        } => {
            let list = store.add_list(&list_id, &name, description.as_deref()).await?;
            info!(list_id = %list.list_id, name = %list.name, "List registered");
        }
        ListCommand::Enable { list_id } => {
            store.set_list_active(&list_id, true).await?;
            info!(list_id = %list_id, "List enabled");
        }
        ListCommand::Disable { list_id } => {
            store.set_list_active(&list_id, false).await?;
            info!(list_id = %list_id, "List disabled");
        }
        ListCommand::Show => {
            let lists = store.list_lists().await?;
            if lists.is_empty() {
                println!("No lists registered.");
            }
            for list in lists {
                let scanned = list
                    .last_scanned_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}\t{}\t{}\tarticles={}\tlast_scanned={}",
                    list.list_id,
                    list.name,
                    if list.is_active { "active" } else { "inactive" },
                    list.articles_found,
                    scanned
                );
            }
        }
    }
    Ok(())
}

/// Tweet source for commands that only touch stored articles.
struct NoSource;

#[async_trait::async_trait]
impl xarticle_ingest::TweetSource for NoSource {
    async fn fetch_list_tweets(&self, list_id: &str, _max_pages: u32) -> Result<Vec<rapidapi_client::Tweet>> {
        anyhow::bail!("no tweet source configured (list {list_id})")
    }

    async fn fetch_tweet(&self, tweet_id: &str) -> Result<Option<rapidapi_client::Tweet>> {
        anyhow::bail!("no tweet source configured (tweet {tweet_id})")
    }
}
