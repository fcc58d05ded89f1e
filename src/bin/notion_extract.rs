//! notion-extract: Pull Notion users and databases into relational tables
//!
//! Usage:
//!   # Users only, one tagged JSON stream on stdout
//!   NOTION_TOKEN=secret notion-extract
//!
//!   # Users and two databases, one .jsonl file per table
//!   notion-extract --database a8aec433=tasks --database 0f1c2b3a --output-dir ./tables
//!
//!   # First 50 users, drop a column from every database
//!   notion-extract --limit 50 --exclude-column my_column_name --database a8aec433

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::env;
use std::io::BufWriter;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dotenv::dotenv;
use notion_source::client::{NotionHttpClient, NOTION_API_URL};
use notion_source::config::{DatabaseResource, Limit, SourceConfig};
use notion_source::melt::{FlattenConfig, Loader, StreamWriter, TableWriter};
use notion_source::source::{NotionSource, RunSummary};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "notion-extract")]
#[command(about = "Extract Notion users and databases into relational tables", long_about = None)]
struct Args {
    /// Database to extract, optionally with its table name (ID or ID=TABLE)
    #[arg(long = "database", value_name = "ID[=TABLE]", value_parser = parse_database)]
    databases: Vec<DatabaseArg>,

    /// Column to leave out of every database table (after snake_casing)
    #[arg(long = "exclude-column", value_name = "COLUMN")]
    exclude_columns: Vec<String>,

    /// Maximum number of users to extract (-1 for no limit)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    limit: i64,

    /// Skip the users stream
    #[arg(long)]
    no_users: bool,

    /// Keep going when a stream fails and report it in the summary
    #[arg(long)]
    skip_failed_streams: bool,

    /// Output directory for one .jsonl file per table
    /// If omitted, writes to stdout as a single stream with table metadata
    #[arg(long, short = 'o')]
    output_dir: Option<String>,

    /// Maximum object depth melted into columns (default: 4)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Separator for melted column names (default: "__")
    #[arg(long)]
    separator: Option<String>,

    /// Notion API base URL
    #[arg(long, default_value = NOTION_API_URL)]
    api_url: String,
}

#[derive(Debug, Clone)]
struct DatabaseArg {
    id: String,
    table: Option<String>,
}

fn parse_database(value: &str) -> Result<DatabaseArg, String> {
    let (id, table) = match value.split_once('=') {
        Some((id, table)) => (id.trim(), Some(table.trim())),
        None => (value.trim(), None),
    };

    if id.is_empty() {
        return Err(String::from("database id must not be empty"));
    }
    if table == Some("") {
        return Err(format!("empty table name for database {}", id));
    }

    Ok(DatabaseArg {
        id: id.to_string(),
        table: table.map(str::to_string),
    })
}

/// Initialize tracing/logging on stderr, leaving stdout to the record stream.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("notion_source=info,notion_extract=info"));

    if env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn build_config(args: &Args) -> SourceConfig {
    let excluded = Arc::new(args.exclude_columns.clone());

    let databases = args
        .databases
        .iter()
        .map(|database| {
            let excluded = Arc::clone(&excluded);
            let mut resource = DatabaseResource::new(&database.id).with_column_projection(
                move |property, normalize| {
                    let column = normalize(property.name.as_str());
                    (!excluded.contains(&column)).then_some(column)
                },
            );
            if let Some(table) = &database.table {
                resource = resource.with_table_name(table);
            }
            resource
        })
        .collect();

    SourceConfig {
        databases,
        include_users: !args.no_users,
        users_limit: Limit::from_signed(args.limit),
        skip_failed_streams: args.skip_failed_streams,
        ..SourceConfig::default()
    }
}

fn build_flatten_config(args: &Args) -> FlattenConfig {
    let mut flatten = FlattenConfig::default();
    if let Some(depth) = args.max_depth {
        flatten.max_depth = depth;
    }
    if let Some(separator) = &args.separator {
        flatten.separator = separator.clone();
    }
    flatten
}

fn report(summary: &RunSummary) {
    for stream in &summary.streams {
        match &stream.error {
            Some(error) => warn!(stream = %stream.name, error = %error, "stream skipped"),
            None => info!(
                stream = %stream.name,
                batches = stream.batches,
                records = stream.records,
                "stream summary"
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    let args = Args::parse();

    let token = env::var("NOTION_TOKEN").context("NOTION_TOKEN is not set")?;
    if token.trim().is_empty() {
        bail!("NOTION_TOKEN is empty");
    }

    let config = build_config(&args);
    let flatten = build_flatten_config(&args);
    let client = Arc::new(NotionHttpClient::with_base_url(&args.api_url, token));
    let source = NotionSource::new(client, config);

    let summary = if let Some(output_dir) = &args.output_dir {
        let mut writer = TableWriter::new(output_dir, flatten)
            .with_context(|| format!("Failed to prepare output directory {}", output_dir))?;
        run(source, &mut writer).await?
    } else {
        let mut writer = StreamWriter::new(BufWriter::new(std::io::stdout()), flatten);
        run(source, &mut writer).await?
    };

    report(&summary);
    if summary.failed().next().is_some() {
        warn!("extraction finished with skipped streams");
    }

    Ok(())
}

async fn run(source: NotionSource, loader: &mut dyn Loader) -> Result<RunSummary> {
    source.run(loader).await.context("Extraction failed")
}
