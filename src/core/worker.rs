use crate::core::assembler::open_at;
use crate::core::controller::Controller;
use crate::core::error::FetchError;
use crate::core::model::{ByteRange, ChunkKey};
use crate::core::policy::{MAX_ATTEMPTS, READ_BUFFER_SIZE, READ_TIMEOUT, RETRY_BACKOFF};
use crate::core::reader::{bounded_read, ReadOutcome};
use crate::plugins::registry::TransferDriver;
use anyhow::Context;
use reqwest::StatusCode;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{sleep, timeout};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

/// Everything a worker shares with its siblings for one download.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub driver: Arc<dyn TransferDriver>,
    pub url: String,
    pub dest: PathBuf,
    pub controller: Controller,
    pub cancel: CancellationToken,
}

/// What a single worker fetches and where it lands.
#[derive(Debug, Clone, Copy)]
struct Assignment {
    key: ChunkKey,
    range: Option<ByteRange>,
    offset: u64,
    len: u64,
    accept: StatusCode,
}

/// Fetches `range` into the same offset of the destination, expecting 206.
pub(crate) async fn download_range(ctx: WorkerContext, index: usize, range: ByteRange) -> anyhow::Result<()> {
    let job = Assignment {
        key: ChunkKey::Part(index),
        range: Some(range),
        offset: range.start,
        len: range.len(),
        accept: StatusCode::PARTIAL_CONTENT,
    };
    let span = info_span!("worker", chunk = %job.key, start = range.start, end = range.end);
    run(ctx, job).instrument(span).await
}

/// Fetches the whole resource from offset 0 without a range, expecting 200.
pub(crate) async fn download_single(ctx: WorkerContext, total: u64) -> anyhow::Result<()> {
    let job = Assignment {
        key: ChunkKey::Whole,
        range: None,
        offset: 0,
        len: total,
        accept: StatusCode::OK,
    };
    let span = info_span!("worker", chunk = %job.key, total);
    run(ctx, job).instrument(span).await
}

async fn run(ctx: WorkerContext, job: Assignment) -> anyhow::Result<()> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut last_err: Option<anyhow::Error> = None;

    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(FetchError::Cancelled.into()),
                _ = sleep(RETRY_BACKOFF) => {}
            }
        }

        // A new attempt rewrites the region from its start.
        ctx.controller.update_progress(0, job.key);
        debug!(attempt, "starting attempt");

        let result: anyhow::Result<()> = tokio::select! {
            _ = ctx.cancel.cancelled() => Err(FetchError::Cancelled.into()),
            r = attempt_once(&ctx, &job, &mut buf) => r,
        };

        match result {
            Ok(()) => {
                debug!(attempt, bytes = job.len, "finished");
                return Ok(());
            }
            Err(e) if FetchError::is_cancelled(&e) => return Err(e),
            Err(e) => {
                warn!(attempt, max = MAX_ATTEMPTS, "attempt failed: {:#}", e);
                last_err = Some(e);
            }
        }
    }

    Err(FetchError::RetriesExhausted {
        attempts: MAX_ATTEMPTS,
        source: last_err.unwrap_or_else(|| anyhow::anyhow!("no attempt was made")),
    }
    .into())
}

async fn attempt_once(ctx: &WorkerContext, job: &Assignment, buf: &mut [u8]) -> anyhow::Result<()> {
    let resp = match timeout(READ_TIMEOUT, ctx.driver.fetch(&ctx.url, job.range)).await {
        Ok(r) => r?,
        Err(_) => return Err(FetchError::ReadTimeout(READ_TIMEOUT).into()),
    };
    if resp.status != job.accept {
        return Err(FetchError::UnexpectedStatus {
            expected: job.accept,
            got: resp.status,
        }
        .into());
    }

    let mut file = open_at(&ctx.dest, job.offset).await?;
    // Anything past the assigned length would land in a sibling's region.
    let mut body = StreamReader::new(resp.body).take(job.len);
    let mut downloaded = 0u64;

    loop {
        if ctx.controller.is_paused() {
            debug!(downloaded, "paused");
            ctx.controller.wait_until_resumed().await;
            debug!(downloaded, "resumed");
        }

        let outcome = bounded_read(&mut body, buf, &mut file, &mut downloaded, &ctx.controller, job.key).await?;
        if outcome == ReadOutcome::Eof {
            break;
        }
    }

    file.flush()
        .await
        .with_context(|| format!("flush {}", ctx.dest.display()))?;

    if downloaded != job.len {
        return Err(FetchError::LengthMismatch {
            expected: job.len,
            received: downloaded,
        }
        .into());
    }
    Ok(())
}
