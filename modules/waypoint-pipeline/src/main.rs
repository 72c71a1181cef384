use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use waypoint_common::{Config, LogFormat};
use waypoint_engine::{BusOptions, EventBus};
use waypoint_events::Event;
use waypoint_pipeline::audit::TracingAudit;
use waypoint_pipeline::delivery::LogDelivery;
use waypoint_pipeline::registry::StoreConnectionRegistry;
use waypoint_pipeline::{KeyLayout, Pipeline, PipelineDeps};
use waypoint_store::{MemoryTable, PgTable, Table};

#[derive(Parser)]
#[command(name = "waypoint", about = "Run newline-delimited events through the location pipeline")]
struct Cli {
    /// File of JSON event envelopes, one per line. Reads stdin when omitted or `-`.
    #[arg(long)]
    input: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let filter = EnvFilter::from_default_env().add_directive("waypoint=info".parse()?);
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    info!("Waypoint pipeline starting...");
    config.log_redacted();

    let table = open_table(&config).await?;
    let bus = EventBus::new(BusOptions::from_config(&config));
    let deps = PipelineDeps {
        table: table.clone(),
        registry: Arc::new(StoreConnectionRegistry::new(table)),
        delivery: Arc::new(LogDelivery),
        audit: Arc::new(TracingAudit),
        layout: KeyLayout::from_config(&config),
    };
    let _pipeline = Pipeline::install(&bus, &deps, config.observer_enabled)?;

    let outcome = publish_input(&bus, cli.input.as_deref()).await;
    // Events published before a read error still run to completion.
    bus.settled().await;
    let (accepted, rejected) = outcome?;

    let stats = bus.stats();
    info!(
        accepted,
        rejected,
        published = stats.published,
        unrouted = stats.unrouted,
        invocations = stats.invocations,
        failures = stats.failures,
        "Pipeline settled"
    );
    Ok(())
}

async fn open_table(config: &Config) -> Result<Table> {
    let Some(url) = config.database_url.as_deref() else {
        info!("No DATABASE_URL set, using in-memory table");
        return Ok(Table::new(Arc::new(MemoryTable::new())));
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("Failed to connect to Postgres")?;
    let pg = PgTable::new(pool, config.table_name.clone())?;
    pg.migrate().await?;
    info!(table = pg.table_name(), "Postgres table ready");
    Ok(Table::new(Arc::new(pg)))
}

async fn publish_input(bus: &EventBus, input: Option<&Path>) -> Result<(usize, usize)> {
    match input {
        Some(path) if path.as_os_str() != "-" => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Cannot open input {}", path.display()))?;
            publish_lines(bus, BufReader::new(file)).await
        }
        _ => publish_lines(bus, BufReader::new(tokio::io::stdin())).await,
    }
}

/// Publish each well-formed envelope. Lines that are not UTF-8 or not a
/// valid envelope are logged and skipped.
async fn publish_lines<R>(bus: &EventBus, mut reader: R) -> Result<(usize, usize)>
where
    R: AsyncBufRead + Unpin,
{
    let (mut accepted, mut rejected) = (0usize, 0usize);
    let mut line_no = 0usize;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        line_no += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                rejected += 1;
                warn!(line = line_no, error = %e, "Skipping line that is not UTF-8");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match Event::from_wire(line) {
            Ok(event) => {
                accepted += 1;
                bus.publish(event);
            }
            Err(e) => {
                rejected += 1;
                warn!(line = line_no, error = %e, "Skipping malformed envelope");
            }
        }
    }
    Ok((accepted, rejected))
}
