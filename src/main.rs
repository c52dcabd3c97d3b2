use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use offsync::{
  ActionQueue, ActionType, ApiExecutor, Config, Database, HttpMethod, NewAction, OfflineCache,
  OnlineFlag, SyncService, SystemClock,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "offsync")]
#[command(about = "Inspect and replay the offline action queue and response cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/offsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show pending and exhausted action counts
  Status,
  /// Replay queued actions against the API
  Sync {
    /// Treat the network as unreachable (nothing is sent)
    #[arg(long)]
    offline: bool,
  },
  /// Manage the action queue
  #[command(subcommand)]
  Queue(QueueCommand),
  /// Manage the response cache
  #[command(subcommand)]
  Cache(CacheCommand),
}

#[derive(Subcommand, Debug)]
enum QueueCommand {
  /// List queued actions in replay order
  List {
    /// Only actions of this type
    #[arg(long = "type")]
    action_type: Option<ActionType>,
  },
  /// Queue a request for later replay
  Add {
    #[arg(long = "type")]
    action_type: ActionType,
    #[arg(long)]
    method: HttpMethod,
    #[arg(long)]
    endpoint: String,
    /// JSON request body
    #[arg(long)]
    body: Option<String>,
    /// Extra header as NAME=VALUE; repeatable
    #[arg(long = "header")]
    headers: Vec<String>,
  },
  /// Remove one action by id
  Drop { id: i64 },
  /// Remove every queued action
  Clear,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
  /// Print a cached value
  Get { key: String },
  /// Cache a JSON value
  Set {
    key: String,
    /// JSON value
    value: String,
    /// Expiry in seconds (default: cache.default_ttl_secs)
    #[arg(long)]
    ttl: Option<u64>,
  },
  Delete { key: String },
  /// List every stored key, expired or not
  Keys,
  /// Delete expired entries
  Cleanup,
  Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = offsync::logging::init(config.log_file.as_deref())?;

  let db = Arc::new(Database::open(config.database_path()?));
  db.init().await?;

  let clock = Arc::new(SystemClock);
  let queue = Arc::new(ActionQueue::new(db.clone(), clock.clone()));
  let cache = Arc::new(OfflineCache::new(db, clock));

  match args.command {
    Command::Status => {
      let service = sync_service(&config, queue, cache, true)?;
      print_json(&service.get_queue_status().await?)?;
    }
    Command::Sync { offline } => {
      let service = sync_service(&config, queue, cache, !offline)?;
      print_json(&service.sync().await?)?;
    }
    Command::Queue(cmd) => run_queue(cmd, &queue).await?,
    Command::Cache(cmd) => run_cache(cmd, &cache, &config).await?,
  }

  Ok(())
}

fn sync_service(
  config: &Config,
  queue: Arc<ActionQueue>,
  cache: Arc<OfflineCache>,
  online: bool,
) -> Result<SyncService<ApiExecutor>> {
  let executor = ApiExecutor::new(config.base_url()?, config.timeout(), config.token_source())?;
  Ok(SyncService::new(
    queue,
    cache,
    executor,
    Arc::new(OnlineFlag::new(online)),
  ))
}

async fn run_queue(cmd: QueueCommand, queue: &ActionQueue) -> Result<()> {
  match cmd {
    QueueCommand::List { action_type } => {
      let actions = match action_type {
        Some(t) => queue.get_by_type(t).await?,
        None => queue.get_all().await?,
      };
      print_json(&actions)?;
    }
    QueueCommand::Add {
      action_type,
      method,
      endpoint,
      body,
      headers,
    } => {
      let mut action = NewAction::new(action_type, method, endpoint);
      if let Some(body) = body {
        let body =
          serde_json::from_str(&body).map_err(|e| eyre!("--body is not valid JSON: {}", e))?;
        action = action.with_body(body);
      }
      for header in headers {
        let (name, value) = header
          .split_once('=')
          .ok_or_else(|| eyre!("Header must be NAME=VALUE, got '{}'", header))?;
        action = action.with_header(name.trim(), value.trim());
      }
      println!("{}", queue.enqueue(action).await?);
    }
    QueueCommand::Drop { id } => queue.dequeue(id).await?,
    QueueCommand::Clear => queue.clear().await?,
  }
  Ok(())
}

async fn run_cache(cmd: CacheCommand, cache: &OfflineCache, config: &Config) -> Result<()> {
  match cmd {
    CacheCommand::Get { key } => match cache.entry(&key).await {
      Some(entry) => print_json(&entry)?,
      None => return Err(eyre!("No cached value for '{}'", key)),
    },
    CacheCommand::Set { key, value, ttl } => {
      let value: serde_json::Value =
        serde_json::from_str(&value).map_err(|e| eyre!("Value is not valid JSON: {}", e))?;
      let ttl = ttl.map(Duration::from_secs).or_else(|| config.default_ttl());
      cache.set(&key, &value, ttl).await;
    }
    CacheCommand::Delete { key } => cache.delete(&key).await,
    CacheCommand::Keys => {
      for key in cache.get_all_keys().await {
        println!("{}", key);
      }
    }
    CacheCommand::Cleanup => println!("{}", cache.cleanup_expired().await),
    CacheCommand::Clear => cache.clear().await,
  }
  Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  let out =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to format output: {}", e))?;
  println!("{}", out);
  Ok(())
}
