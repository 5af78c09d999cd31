use std::sync::Arc;

use clap::Parser;
use kupool::config::{Args, MqKind, StoreKind};
use kupool::coordinator::{Coordinator, CoordinatorConfig};
use kupool::metrics::PoolMetrics;
use kupool::mq::MessageQueue;
use kupool::state::StateStore;
use kupool::stats::StatsStore;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args.log);

    if let Err(e) = run(args).await {
        error!(error = %e, "fatal error during startup");
        std::process::exit(1);
    }
}

fn init_logging(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mq: Arc<dyn MessageQueue> = build_mq(&args).await?;
    let state: Option<Arc<dyn StateStore>> = build_state(&args).await?;
    let stats: Arc<dyn StatsStore> = build_stats(&args).await?;
    let metrics = Arc::new(PoolMetrics::new());

    let coordinator = Arc::new(Coordinator::new(
        CoordinatorConfig {
            interval: args.interval(),
            expire_after: args.expire_after(),
            history_window: args.history_window(),
        },
        mq,
        state,
        metrics,
    ));

    let (shutdown_status_tx, shutdown_status_rx) = watch::channel(None);
    let (external_shutdown_tx, external_shutdown_rx) = watch::channel(false);

    let admin_state = kupool::admin::AdminState {
        coordinator: Arc::clone(&coordinator),
        stats: Arc::clone(&stats),
        shutdown_status: shutdown_status_rx,
    };
    let admin_router = kupool::admin::build_router(admin_state);
    let admin_addr = args.admin_addr.clone();
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(&admin_addr).await {
            Ok(l) => l,
            Err(e) => {
                error!(%admin_addr, error = %e, "failed to bind admin HTTP listener");
                return;
            }
        };
        info!(%admin_addr, "admin HTTP listening");
        if let Err(e) = axum::serve(listener, admin_router).await {
            error!(error = %e, "admin HTTP server exited");
        }
    });

    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = external_shutdown_tx.send(true);
    });

    let status = kupool::lifecycle::run(
        Arc::clone(&coordinator),
        stats,
        args.addr.clone(),
        shutdown_status_tx,
        external_shutdown_rx,
    )
    .await;

    info!(?status, "exiting cleanly");
    Ok(())
}

async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}

async fn build_mq(args: &Args) -> anyhow::Result<Arc<dyn MessageQueue>> {
    match args.mq {
        MqKind::Memory => Ok(Arc::new(kupool::mq::MemoryQueue::new())),
        #[cfg(feature = "rabbitmq")]
        MqKind::Rabbitmq => {
            let uri = args
                .rabbitmq_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("--rabbitmq-url is required when --mq rabbit"))?;
            let queue = kupool::mq::rabbit::RabbitQueue::connect(uri).await?;
            Ok(Arc::new(queue))
        }
        #[cfg(not(feature = "rabbitmq"))]
        MqKind::Rabbitmq => anyhow::bail!("rebuild with --features rabbitmq to use --mq rabbit"),
    }
}

async fn build_state(args: &Args) -> anyhow::Result<Option<Arc<dyn StateStore>>> {
    match args.store {
        StoreKind::Memory => Ok(None),
        StoreKind::Sqlite => {
            let store = kupool::state::SqliteStateStore::open(&args.state_db).await?;
            Ok(Some(Arc::new(store)))
        }
        StoreKind::Postgres => {
            // `--store postgres` selects the Postgres-backed stats sink (see
            // build_stats); there is no durable StateStore over Postgres, so
            // job/history/session state stays in-memory in this
            // configuration rather than failing startup outright.
            tracing::warn!(
                "--store postgres only backs the stats sink; durable job/history state is memory-only in this configuration"
            );
            Ok(None)
        }
    }
}

async fn build_stats(args: &Args) -> anyhow::Result<Arc<dyn StatsStore>> {
    match args.store {
        StoreKind::Postgres => {
            let url = args
                .postgres_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("--postgres-url is required when --store postgres"))?;
            let pool = sqlx::PgPool::connect(url).await?;
            let store = kupool::stats::PostgresStats::new(pool);
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        _ => Ok(Arc::new(kupool::stats::MemoryStats::new())),
    }
}
