use std::{process::ExitCode, sync::Arc};

use btcount::{
    Clock, Config, LogFormat, Materializer, SystemClock,
    adapters::postgres::PostgresAdapter,
};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("unable to parse config: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(&cfg) {
        eprintln!("unable to init logging: {}", err);
        return ExitCode::FAILURE;
    }

    match app(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "unable to run the app");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cfg: &Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_new(&cfg.log_level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    match cfg.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.compact().try_init(),
    }
}

async fn app(cfg: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "app started"
    );

    let pool = PgPoolOptions::new()
        .min_connections(cfg.db_min_conn)
        .max_connections(cfg.db_max_conn)
        .connect(&cfg.db_addr)
        .await?;

    let adapter = Arc::new(PostgresAdapter::from_pool(pool));
    adapter.init_schema().await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let materializer = Materializer::new(adapter.clone(), adapter.clone(), clock)
        .with_retry_delay(cfg.stat_worker_retry_delay);

    let cancel = CancellationToken::new();
    let worker = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            materializer.run(cancel).await;
            info!("worker finished");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    cancel.cancel();

    if let Err(err) = worker.await {
        error!(error = %err, "worker panicked");
    }

    adapter.pool().close().await;
    Ok(())
}
