use crate::core::assembler::preallocate;
use crate::core::controller::Controller;
use crate::core::error::FetchError;
use crate::core::model::{ByteRange, DownloadReport, Strategy};
use crate::core::planner::choose_strategy;
use crate::core::policy::PROBE_TIMEOUT;
use crate::core::worker::{self, WorkerContext};
use crate::plugins::http::HttpDriver;
use crate::plugins::registry::TransferDriver;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct Engine {
    driver: Arc<dyn TransferDriver>,
}

impl Engine {
    pub fn new(driver: Arc<dyn TransferDriver>) -> Self {
        Self { driver }
    }

    pub fn http() -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(HttpDriver::new()?)))
    }

    /// Fetches `url` into `dest`, reporting through `controller`.
    ///
    /// Returns once every worker has finished. Any failure marks the
    /// controller excepted before the error is handed back.
    pub async fn download(&self, url: &str, dest: &Path, controller: &Controller) -> anyhow::Result<DownloadReport> {
        let result = self.run(url, dest, controller).await;
        if let Err(e) = &result {
            controller.mark_excepted();
            error!(url, dest = %dest.display(), "download failed: {:#}", e);
        }
        result
    }

    async fn run(&self, url: &str, dest: &Path, controller: &Controller) -> anyhow::Result<DownloadReport> {
        debug!(url, driver = self.driver.name(), "probing size");
        let probed = match timeout(PROBE_TIMEOUT, self.driver.probe(url)).await {
            Ok(r) => r,
            Err(_) => return Err(FetchError::Probe(FetchError::ReadTimeout(PROBE_TIMEOUT).into()).into()),
        };
        let total = match probed {
            Ok(Some(n)) => n,
            Ok(None) => {
                controller.set_total_size(0);
                return Err(FetchError::UnknownLength.into());
            }
            Err(e) if e.is::<FetchError>() => return Err(e),
            Err(e) => return Err(FetchError::Probe(e).into()),
        };
        controller.set_total_size(total);

        preallocate(dest, total).await?;

        let strategy = choose_strategy(total);
        let ctx = WorkerContext {
            driver: self.driver.clone(),
            url: url.to_string(),
            dest: dest.to_path_buf(),
            controller: controller.clone(),
            cancel: CancellationToken::new(),
        };

        let started = Instant::now();
        match &strategy {
            Strategy::SingleShot => {
                info!(url, total, "single-shot download");
                worker::download_single(ctx, total).await?;
            }
            Strategy::Chunked(ranges) => {
                info!(url, total, parts = ranges.len(), "chunked download");
                run_chunked(ctx, ranges).await?;
            }
        }
        let elapsed = started.elapsed();

        info!(url, total, elapsed_secs = elapsed.as_secs_f64(), "download finished");
        Ok(DownloadReport {
            elapsed,
            total_size: total,
            strategy,
        })
    }
}

/// Runs one worker per range in parallel. The first real failure marks the
/// controller excepted and cancels the siblings; the join still waits for
/// all of them and returns that first failure.
async fn run_chunked(ctx: WorkerContext, ranges: &[ByteRange]) -> anyhow::Result<()> {
    let mut set = JoinSet::new();
    for (index, range) in ranges.iter().enumerate() {
        set.spawn(worker::download_range(ctx.clone(), index, *range));
    }

    let mut first_err: Option<anyhow::Error> = None;
    while let Some(joined) = set.join_next().await {
        let outcome = match joined {
            Ok(r) => r,
            Err(e) => Err(FetchError::WorkerPanicked(e.to_string()).into()),
        };
        let Err(e) = outcome else { continue };
        if FetchError::is_cancelled(&e) || first_err.is_some() {
            debug!("sibling stopped: {:#}", e);
            continue;
        }
        ctx.controller.mark_excepted();
        ctx.cancel.cancel();
        first_err = Some(e);
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Downloads `url` to `dest` over HTTP with the fixed policy.
pub async fn download(url: &str, dest: &Path, controller: &Controller) -> anyhow::Result<DownloadReport> {
    let engine = match Engine::http() {
        Ok(engine) => engine,
        Err(e) => {
            controller.mark_excepted();
            return Err(e);
        }
    };
    engine.download(url, dest, controller).await
}
