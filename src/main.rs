use std::{fs::File, path::Path, sync::Mutex};

use chrono::Local;
use review_scrap::{
    browser::ChromiumLauncher,
    config::AppConfig,
    info_time,
    process::Scheduler,
    store::{SqliteConnector, SqliteReviewStore},
    Result,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.log_dir)?;

    let start_time = Local::now();
    info_time!(
        "Starting: {} tasks, {} workers, store at {}",
        config.tasks.len(),
        config.pool_size,
        config.database_path
    );

    let scheduler = Scheduler::new(
        ChromiumLauncher::new(config.browser),
        SqliteConnector::new(&config.database_path),
        config.pagination,
        config.pool_size,
    );
    scheduler.run(config.tasks).await?;

    let stored = SqliteReviewStore::open(&config.database_path)?.count()?;
    info!("{stored} reviews in store");
    info_time!(start_time, "Stopping. Full program time:");

    Ok(())
}

/// Console output follows `RUST_LOG`; every run also writes a debug log to `log_dir`.
fn init_logging(log_dir: &str) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let log_file = File::create(
        Path::new(log_dir).join(format!("app_{}.log", Local::now().timestamp())),
    )?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_filter(
                    EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "review_scrap=info".into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_thread_ids(true)
                .with_writer(Mutex::new(log_file))
                .with_filter(EnvFilter::new("review_scrap=debug")),
        )
        .init();
    Ok(())
}
