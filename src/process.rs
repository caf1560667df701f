use std::sync::Arc;

use chrono::Local;
use tokio::{
    sync::mpsc::{self, UnboundedSender},
    task::{spawn_blocking, JoinSet},
};
use tracing::{debug, error, info};

use crate::browser::{Browser, BrowserLauncher};
use crate::config::PaginationConfig;
use crate::model::{ReviewRecord, ScrapeTask};
use crate::paginate::PaginationDriver;
use crate::parse::{parse_review, ReviewSelectors};
use crate::persist::write_reviews;
use crate::store::{DocumentStore, StoreConnector};
use crate::{info_time, Result};

/// What one worker did with its task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub start_url: String,
    pub reached_count: usize,
    pub persisted: usize,
    pub continuation: Option<ScrapeTask>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub waves: usize,
    pub tasks_run: usize,
    pub tasks_failed: usize,
    pub persisted: usize,
}

/// Runs scrape tasks in waves on a fixed number of concurrent workers.
///
/// Workers push continuation tasks into a channel while they run; the channel is only
/// drained between waves, and the run ends once a wave leaves nothing behind.
pub struct Scheduler<L, C> {
    launcher: Arc<L>,
    connector: Arc<C>,
    pagination: PaginationConfig,
    pool_size: usize,
}

impl<L, C> Scheduler<L, C>
where
    L: BrowserLauncher,
    C: StoreConnector,
{
    pub fn new(launcher: L, connector: C, pagination: PaginationConfig, pool_size: usize) -> Self {
        Scheduler {
            launcher: Arc::new(launcher),
            connector: Arc::new(connector),
            pagination,
            pool_size: pool_size.max(1),
        }
    }

    pub async fn run(&self, seeds: Vec<ScrapeTask>) -> Result<RunSummary> {
        let start_time = Local::now();
        let (queue_tx, mut queue_rx) = mpsc::unbounded_channel();
        for task in seeds {
            queue_tx.send(task)?;
        }

        let mut summary = RunSummary::default();
        loop {
            let mut wave = Vec::new();
            while let Ok(task) = queue_rx.try_recv() {
                wave.push(task);
            }
            if wave.is_empty() {
                break;
            }

            summary.waves += 1;
            let wave_time = Local::now();
            info!("Starting wave {} with {} tasks", summary.waves, wave.len());
            self.run_wave(wave, &queue_tx, &mut summary).await;
            info_time!(wave_time, "Finished wave {}", summary.waves);
        }

        info_time!(
            start_time,
            "Queue drained: {} tasks in {} waves, {} failed, {} reviews persisted",
            summary.tasks_run,
            summary.waves,
            summary.tasks_failed,
            summary.persisted
        );
        Ok(summary)
    }

    async fn run_wave(
        &self,
        wave: Vec<ScrapeTask>,
        queue_tx: &UnboundedSender<ScrapeTask>,
        summary: &mut RunSummary,
    ) {
        let mut workers = JoinSet::new();
        for task in wave {
            if workers.len() >= self.pool_size {
                if let Some(res) = workers.join_next().await {
                    record(summary, res);
                }
            }
            workers.spawn(process_task(
                self.launcher.clone(),
                self.connector.clone(),
                self.pagination.clone(),
                task,
                queue_tx.clone(),
            ));
        }
        while let Some(res) = workers.join_next().await {
            record(summary, res);
        }
    }
}

fn record(
    summary: &mut RunSummary,
    res: std::result::Result<Result<TaskOutcome>, tokio::task::JoinError>,
) {
    summary.tasks_run += 1;
    match res {
        Ok(Ok(outcome)) => {
            debug!(
                "Task {} reached {} reviews, persisted {}",
                outcome.start_url, outcome.reached_count, outcome.persisted
            );
            summary.persisted += outcome.persisted;
        }
        Ok(Err(e)) => {
            summary.tasks_failed += 1;
            error!("Scrape task failed: {e}");
        }
        Err(e) => {
            summary.tasks_failed += 1;
            error!("Scrape task panicked: {e}");
        }
    }
}

/// Runs one task end to end on its own browser session and store connection, and queues
/// its continuation if the session stopped short of the target after making progress.
pub async fn process_task<L, C>(
    launcher: Arc<L>,
    connector: Arc<C>,
    pagination: PaginationConfig,
    task: ScrapeTask,
    queue_tx: UnboundedSender<ScrapeTask>,
) -> Result<TaskOutcome>
where
    L: BrowserLauncher,
    C: StoreConnector,
{
    let store = Arc::new(connector.connect()?);
    let selectors = Arc::new(ReviewSelectors::new()?);
    let browser = launcher.launch().await?;

    let mut driver =
        PaginationDriver::open(browser, pagination, &task.start_url, task.target_count).await;
    // The session has to be closed whatever the collection outcome.
    let collected = collect_reviews(&mut driver, &store, &selectors, task.flush_interval).await;
    let report = driver.finish().await;
    let persisted = collected?;

    let continuation = report.continuation(task.flush_interval);
    match &continuation {
        Some(next) => {
            info!(
                "Review count not reached. Resubmit reviews for processing, starting with url {}",
                next.start_url
            );
            queue_tx.send(next.clone())?;
        }
        None => info!(
            "Completed automating of {} reviews starting with url {} and ending with {}",
            report.reached_count, report.start_url, report.final_location
        ),
    }

    Ok(TaskOutcome {
        start_url: task.start_url,
        reached_count: report.reached_count,
        persisted,
        continuation,
    })
}

/// Pulls containers out of the session, flushing every `flush_interval` reviews and once
/// more for whatever is left. Returns how many documents were written.
///
/// Parsing and store writes block, so both run on the blocking pool and never hold up
/// the browser's event handling.
async fn collect_reviews<B, S>(
    driver: &mut PaginationDriver<B>,
    store: &Arc<S>,
    selectors: &Arc<ReviewSelectors>,
    flush_interval: usize,
) -> Result<usize>
where
    B: Browser,
    S: DocumentStore + 'static,
{
    let flush_interval = flush_interval.max(1);
    let mut buffer = Vec::with_capacity(flush_interval);
    let mut persisted = 0;

    while let Some((url, element)) = driver.next_container().await {
        let review = spawn_blocking({
            let selectors = selectors.clone();
            move || parse_review(&url, &element.html, &selectors)
        })
        .await?;
        debug!("Processed review at '{}'", review.url);
        buffer.push(review);

        if buffer.len() >= flush_interval {
            let batch = std::mem::replace(&mut buffer, Vec::with_capacity(flush_interval));
            persisted += flush(store, batch).await?;
        }
    }
    if !buffer.is_empty() {
        persisted += flush(store, buffer).await?;
    }

    Ok(persisted)
}

async fn flush<S>(store: &Arc<S>, batch: Vec<ReviewRecord>) -> Result<usize>
where
    S: DocumentStore + 'static,
{
    let store = store.clone();
    let res = spawn_blocking(move || write_reviews(store.as_ref(), &batch)).await??;
    Ok(res.inserted + res.updated)
}
