use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use siren_cache::{
  CacheResult, Config, Entity, EntityStore, EventReceiver, FetchOptions, StoreEvent, SubEntity,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "siren-cache")]
#[command(about = "Browse a Siren hypermedia API through a client-side entity cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/siren-cache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  /// Ignore SIREN_CACHE_TOKEN / SIREN_TOKEN and send no credential
  #[arg(long)]
  anonymous: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch one or more entities; later hrefs may be served from the cache
  Get {
    #[arg(required = true)]
    hrefs: Vec<String>,

    /// Bypass the cache for every fetch
    #[arg(long)]
    no_cache: bool,

    /// Print the raw JSON document
    #[arg(long)]
    raw: bool,
  },
  /// Fetch an entity and submit one of its actions
  Action {
    href: String,

    /// Action name
    name: String,

    /// Field value override, as NAME=VALUE (repeatable)
    #[arg(short, long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Print the raw JSON document
    #[arg(long)]
    raw: bool,
  },
}

fn parse_field(s: &str) -> std::result::Result<(String, String), String> {
  s.split_once('=')
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging(args.log_file.as_deref())?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let token = if args.anonymous {
    None
  } else {
    Config::get_token()
  };
  let store = EntityStore::new(&config).map_err(|e| eyre!("Failed to create store: {}", e))?;
  tokio::spawn(log_events(store.subscribe()));

  match args.command {
    Command::Get {
      hrefs,
      no_cache,
      raw,
    } => {
      let mut options = FetchOptions {
        token,
        ..FetchOptions::default()
      };
      if no_cache {
        options = options.no_cache();
      }
      for href in hrefs {
        let result = store
          .try_get(&href, &options)
          .await
          .map_err(|e| eyre!("Failed to fetch {}: {}", href, e))?;
        print_result(&href, &result, raw)?;
      }
    }
    Command::Action {
      href,
      name,
      fields,
      raw,
    } => {
      let options = FetchOptions {
        token,
        ..FetchOptions::default()
      };
      let entity = store
        .try_get(&href, &options)
        .await
        .map_err(|e| eyre!("Failed to fetch {}: {}", href, e))?
        .data;

      let mut action = entity
        .action(&name)
        .cloned()
        .ok_or_else(|| eyre!("Entity at {} has no action named '{}'", href, name))?;
      for (field, value) in fields {
        action = action.with_field(&field, value);
      }

      let result = store
        .try_submit_action(&action, &options)
        .await
        .map_err(|e| eyre!("Action '{}' failed: {}", name, e))?;
      print_result(&action.href, &result, raw)?;
    }
  }

  Ok(())
}

fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("siren_cache=info"));

  match log_file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
      let appender = tracing_appender::rolling::never(dir, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
  }
}

async fn log_events(mut events: EventReceiver) {
  while let Some(event) = events.next().await {
    match event {
      StoreEvent::Inflight { count } => debug!(count, "requests in flight"),
      StoreEvent::Update { href, .. } => info!(href = %href, "entity updated"),
      StoreEvent::Error { kind, message } => warn!(kind = %kind, "{}", message),
    }
  }
}

fn print_result(href: &str, result: &CacheResult<Arc<Entity>>, raw: bool) -> Result<()> {
  let entity = &result.data;
  if raw {
    println!("{}", serde_json::to_string_pretty(entity.raw())?);
    return Ok(());
  }

  println!("{} ({:?})", href, result.source);
  if let Some(title) = entity.title() {
    println!("  title: {}", title);
  }
  println!("  class: [ {} ]", entity.class().join(", "));
  if !entity.properties().is_empty() {
    println!("  properties: {}", serde_json::to_string(entity.properties())?);
  }
  for link in entity.links() {
    println!("  link [ {} ] {}", link.rel.join(", "), link.href);
  }
  for action in entity.actions() {
    println!(
      "  action {} {} {}",
      action.name.as_deref().unwrap_or("-"),
      action.method.as_deref().unwrap_or("GET").to_uppercase(),
      action.href
    );
  }
  for sub in entity.entities() {
    let kind = match sub {
      SubEntity::Link(_) => "link",
      SubEntity::Embedded { .. } => "embedded",
    };
    println!(
      "  entity ({}) [ {} ] {}",
      kind,
      sub.rel().join(", "),
      sub.href().unwrap_or("-")
    );
  }
  Ok(())
}
