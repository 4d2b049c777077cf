use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use jemallocator::Jemalloc;
use log::{error, info, LevelFilter};
use serde_json::json;
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use dunesync::{
    CronScheduler, CronSettings, DuneClient, MemoryStore, PostgresClient, Settings, SnapshotStore,
    SyncOrchestrator,
};

#[derive(Parser)]
#[command(name = "dunesync", version, about = "Syncs Dune analytics query results into the dashboard database")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until Ctrl+C / SIGTERM (default)
    Run,
    /// Run a single sync and exit
    Sync {
        /// Keep results in memory and print them instead of writing to PostgreSQL
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the cached dashboard data as JSON
    Show,
}

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .context("Failed to initialize logger")?;

    let cli = Cli::parse();

    // Load configuration
    let settings = Arc::new(
        Settings::new()
            .context("Failed to load config.yaml. Please ensure it exists and is valid")?,
    );

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_service(settings).await,
        Command::Sync { dry_run } => run_once(settings, dry_run).await,
        Command::Show => show(settings).await,
    }
}

async fn connect_postgres(settings: &Settings) -> anyhow::Result<Arc<PostgresClient>> {
    let postgres = PostgresClient::new(settings.postgres.clone())
        .await
        .context("Failed to initialize database connection")?;

    postgres.migrate().await.context("Failed to apply schema")?;
    postgres.health_check().await?;

    Ok(Arc::new(postgres))
}

fn build_orchestrator(
    settings: &Settings,
    store: Arc<dyn SnapshotStore>,
) -> anyhow::Result<Arc<SyncOrchestrator>> {
    let dune = DuneClient::new(&settings.dune).context("Failed to build Dune API client")?;

    Ok(Arc::new(SyncOrchestrator::new(
        Arc::new(dune),
        store,
        settings.dune.queries.clone(),
        &settings.sync,
    )))
}

async fn run_service(settings: Arc<Settings>) -> anyhow::Result<()> {
    let postgres = connect_postgres(&settings).await?;
    let orchestrator = build_orchestrator(&settings, postgres)?;

    let cancellation_token = CancellationToken::new();

    let cron_scheduler = CronScheduler::new(orchestrator, CronSettings::from(&settings.sync));

    let cron_token = cancellation_token.child_token();
    let cron_handle = tokio::spawn(async move {
        if let Err(e) = cron_scheduler.run(cron_token).await {
            error!("Cron scheduler failed: {:#}", e);
        }
    });

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    info!("Dune sync running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    cancellation_token.cancel();

    info!("Waiting for cron scheduler to stop...");
    let _ = cron_handle.await;

    info!("Shutdown complete");
    Ok(())
}

async fn run_once(settings: Arc<Settings>, dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        let memory = Arc::new(MemoryStore::new());
        let orchestrator = build_orchestrator(&settings, memory.clone())?;
        let report = orchestrator.trigger().await;

        let output = json!({
            "status": report.status,
            "tokenMetrics": memory.token_metrics(),
            "chartData": memory.chart_points(),
            "tokenValuations": memory.token_valuations(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return report.result.context("Sync failed");
    }

    let postgres = connect_postgres(&settings).await?;
    let orchestrator = build_orchestrator(&settings, postgres)?;
    let report = orchestrator.trigger().await;

    println!("{}", serde_json::to_string_pretty(&report.status)?);
    report.result.context("Sync failed")
}

async fn show(settings: Arc<Settings>) -> anyhow::Result<()> {
    let postgres = PostgresClient::new(settings.postgres.clone())
        .await
        .context("Failed to initialize database connection")?;

    let output = json!({
        "tokenMetrics": postgres.latest_token_metrics().await?,
        "chartData": postgres.chart_points().await?,
        "tokenValuations": postgres.token_valuations().await?,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
