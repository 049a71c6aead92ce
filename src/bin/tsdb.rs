use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{debug, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};
use tsdb_table_adapter::{
    Metric, MetricQuery, TableTsdbService, TsdbService,
    config::{Config, read_config_file},
    storage,
    util::{get_config_path, get_table_override, parse_tag, parse_timestamp},
};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON or TOML), falls back to $TSDB_CONFIG
    #[arg(short)]
    file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Write a JSON array of metrics
    Write { input: PathBuf },

    /// Query one metric over a time range
    Query {
        #[arg(long)]
        scope: String,

        #[arg(long)]
        metric: String,

        /// Tag filter as key=value, repeatable
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,

        /// Epoch milliseconds or RFC 3339
        #[arg(long, value_parser = parse_timestamp)]
        start: i64,

        /// Epoch milliseconds or RFC 3339
        #[arg(long, value_parser = parse_timestamp)]
        end: i64,
    },

    /// Print table statistics
    Stats,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("tsdb_table_adapter", LevelFilter::DEBUG),
        ("tsdb", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match args.file.clone().or_else(get_config_path) {
        Some(path) => read_config_file(path)?,
        None => {
            debug!("no config file given, using defaults");
            Config::default()
        }
    };

    if let Some(table) = get_table_override() {
        debug!("table overridden from environment: {table}");
        config.table = table;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = load_config(&args)?;
    let client = storage::connect(&config.storage).await?;
    let service = TableTsdbService::open(client, config.table_options()).await?;

    let outcome = run(&service, args.command).await;
    if let Err(e) = service.dispose().await {
        warn!("failed to dispose service: {e}");
    }
    outcome
}

async fn run(service: &TableTsdbService, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Write { input } => {
            let content = std::fs::read_to_string(&input)?;
            let metrics: Vec<Metric> = serde_json::from_str(&content)?;

            let report = service.put_metrics(&metrics).await?;
            println!(
                "wrote {} datapoints across {} metrics",
                report.datapoints, report.metrics
            );
            report.into_result()?;
        }
        Command::Query {
            scope,
            metric,
            tags,
            start,
            end,
        } => {
            let mut query = MetricQuery::new(scope, metric, start, end);
            query.tags.extend(tags);

            let mut result = service.get_metrics(&[query.clone()]).await?;
            let metrics = result.remove(&query).unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        Command::Stats => {
            println!("{}", service.describe().await?);
        }
    }

    Ok(())
}
