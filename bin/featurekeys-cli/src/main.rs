//! featurekeys CLI - online-store cache key inspection
//!
//! Decodes feature-store cache keys into entity identifiers, summarizes a
//! keyspace and reconciles it against the identifiers that should have been
//! materialized.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use featurekeys_client::{DumpFileSource, KeySource, RedisKeySource};
use featurekeys_codec::{EntityKey, KeyAudit, KeyCodec, Reconciliation, ScanReport};
use featurekeys_common::config::LogFormat;
use featurekeys_common::{Config, EntityKind};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "featurekeys-cli")]
#[command(about = "Feature store online cache key inspector")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "featurekeys.toml")]
    config: PathBuf,

    /// Log level (overrides config)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Where keys are read from
#[derive(clap::Args, Debug, Default)]
struct SourceArgs {
    /// Redis URL (overrides config)
    #[arg(long, env = "FEATUREKEYS_REDIS_URL")]
    redis_url: Option<String>,

    /// SCAN MATCH pattern (overrides config)
    #[arg(long)]
    pattern: Option<String>,

    /// Stop after this many keys
    #[arg(long)]
    max_keys: Option<usize>,

    /// Read hex-encoded keys from a dump file instead of Redis
    #[arg(long, conflicts_with_all = ["redis_url", "pattern", "max_keys"])]
    dump: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the keyspace and summarize entity identifiers
    Scan {
        #[command(flatten)]
        source: SourceArgs,

        /// List every identifier found
        #[arg(long)]
        show_ids: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Decode a single hex-encoded key
    Decode {
        /// Raw key as hex (optional 0x prefix)
        key: String,
    },
    /// Build a single-field key and print it as hex
    Encode {
        /// Join-key column name
        #[arg(long)]
        column: String,

        /// Entity identifier
        #[arg(long)]
        id: u64,

        /// Feature store project name
        #[arg(long, default_value = "feature_store")]
        project: String,
    },
    /// Compare expected identifiers with what is present in the cache
    Reconcile {
        #[command(flatten)]
        source: SourceArgs,

        /// Expected worker identifiers (comma separated)
        #[arg(long, value_delimiter = ',')]
        worker: Vec<u64>,

        /// Expected business identifiers (comma separated)
        #[arg(long, value_delimiter = ',')]
        business: Vec<u64>,

        /// Expected shift identifiers (comma separated)
        #[arg(long, value_delimiter = ',')]
        shift: Vec<u64>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

/// Merge command line overrides into the loaded configuration
fn apply_overrides(config: &mut Config, log_level: Option<&str>, source: Option<&SourceArgs>) {
    if let Some(level) = log_level {
        config.logging.level = level.to_string();
    }
    if let Some(source) = source {
        if let Some(url) = &source.redis_url {
            config.redis.url.clone_from(url);
        }
        if let Some(pattern) = &source.pattern {
            config.redis.pattern.clone_from(pattern);
        }
        if source.max_keys.is_some() {
            config.redis.max_keys = source.max_keys;
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn build_source(source: &SourceArgs, config: &Config) -> Box<dyn KeySource> {
    match &source.dump {
        Some(path) => Box::new(DumpFileSource::new(path)),
        None => Box::new(RedisKeySource::from_config(&config.redis)),
    }
}

async fn scan(source: &SourceArgs, config: &Config, codec: &KeyCodec) -> Result<ScanReport> {
    let source = build_source(source, config);
    let keys = source
        .fetch_keys()
        .await
        .with_context(|| format!("failed to fetch keys from {}", source.name()))?;
    info!(source = source.name(), keys = keys.len(), "fetched keys");

    let mut audit = KeyAudit::new(codec);
    audit.observe_all(&keys);
    Ok(audit.finish())
}

fn parse_hex_key(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).with_context(|| format!("invalid hex key: {input}"))
}

fn expected_ids(
    worker: Vec<u64>,
    business: Vec<u64>,
    shift: Vec<u64>,
) -> BTreeMap<EntityKind, BTreeSet<u64>> {
    [
        (EntityKind::Worker, worker),
        (EntityKind::Business, business),
        (EntityKind::Shift, shift),
    ]
    .into_iter()
    .filter(|(_, ids)| !ids.is_empty())
    .map(|(kind, ids)| (kind, ids.into_iter().collect()))
    .collect()
}

fn print_decoded(codec: &KeyCodec, raw: &[u8]) {
    println!("Key: {} ({} bytes)", hex::encode(raw), raw.len());
    match EntityKey::from_bytes(raw) {
        Ok(key) => {
            println!("Fields:");
            for field in &key.fields {
                println!("  {:<24} {}", field.name, field.value);
            }
            println!("Project: {}", key.project);
        }
        Err(e) => println!("Layout: not parseable ({e})"),
    }

    let decoded = codec.decode(raw);
    println!("Entity: {}", decoded.entity_kind);
    println!("Identifier: {}", decoded.identifier);
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    let source_args = match &args.command {
        Commands::Scan { source, .. } | Commands::Reconcile { source, .. } => Some(source),
        Commands::Decode { .. } | Commands::Encode { .. } => None,
    };
    apply_overrides(&mut config, args.log_level.as_deref(), source_args);
    config.validate()?;

    init_tracing(&config);
    debug!(config = %args.config.display(), "configuration loaded");

    let codec = KeyCodec::from_config(&config.codec)?;

    match args.command {
        Commands::Scan {
            source,
            show_ids,
            format,
        } => {
            let report = scan(&source, &config, &codec).await?;
            match format {
                OutputFormat::Text => print!("{}", report.render(show_ids)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        Commands::Decode { key } => {
            let raw = parse_hex_key(&key)?;
            print_decoded(&codec, &raw);
        }
        Commands::Encode {
            column,
            id,
            project,
        } => {
            let key = EntityKey::single(column, id, project);
            println!("{}", hex::encode(key.to_bytes()));
        }
        Commands::Reconcile {
            source,
            worker,
            business,
            shift,
            format,
        } => {
            let expected = expected_ids(worker, business, shift);
            if expected.is_empty() {
                bail!("no expected identifiers; pass --worker, --business or --shift");
            }
            let report = scan(&source, &config, &codec).await?;
            let reconciliation = Reconciliation::compare(&expected, &report);
            match format {
                OutputFormat::Text => print!("{}", reconciliation.render()),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&reconciliation)?);
                }
            }
            if !reconciliation.is_complete() {
                info!(
                    missing = reconciliation.missing_count(),
                    "expected identifiers missing from cache"
                );
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
