//! In-memory driver used by worker and engine tests.

use crate::core::model::ByteRange;
use crate::plugins::registry::{FetchResponse, TransferDriver};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicU32, Ordering};

pub(crate) fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

pub(crate) struct FakeDriver {
    content: Bytes,
    probe_result: Option<Option<u64>>,
    probe_fails: bool,
    transient_failures: AtomicU32,
    short_bodies: AtomicU32,
    ignore_ranges: bool,
    failing_start: Option<u64>,
    stall_ranges: bool,
    stalled_bodies: AtomicU32,
    hung_fetches: AtomicU32,
    hang_probe: bool,
    piece: usize,
    pub fetches: Mutex<Vec<Option<ByteRange>>>,
}

impl FakeDriver {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content: Bytes::from(content),
            probe_result: None,
            probe_fails: false,
            transient_failures: AtomicU32::new(0),
            short_bodies: AtomicU32::new(0),
            ignore_ranges: false,
            failing_start: None,
            stall_ranges: false,
            stalled_bodies: AtomicU32::new(0),
            hung_fetches: AtomicU32::new(0),
            hang_probe: false,
            piece: 64 * 1024,
            fetches: Mutex::new(Vec::new()),
        }
    }

    /// Overrides what `probe` reports instead of the content length.
    pub fn probe_returns(mut self, len: Option<u64>) -> Self {
        self.probe_result = Some(len);
        self
    }

    pub fn probe_fails(mut self) -> Self {
        self.probe_fails = true;
        self
    }

    /// The next `n` fetches fail at the transport level.
    pub fn transient_failures(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// The next `n` fetches deliver only half of their body.
    pub fn short_bodies(self, n: u32) -> Self {
        self.short_bodies.store(n, Ordering::SeqCst);
        self
    }

    /// Answer ranged requests with 200 and the full body.
    pub fn ignore_ranges(mut self) -> Self {
        self.ignore_ranges = true;
        self
    }

    /// Ranged fetches starting at `start` always get a 500.
    pub fn fail_range_at(mut self, start: u64) -> Self {
        self.failing_start = Some(start);
        self
    }

    /// All other ranged fetches get a 206 whose body never yields.
    pub fn stall_ranges(mut self) -> Self {
        self.stall_ranges = true;
        self
    }

    /// The next `n` fetches deliver half their body and then never yield again.
    pub fn stall_first(self, n: u32) -> Self {
        self.stalled_bodies.store(n, Ordering::SeqCst);
        self
    }

    /// The next `n` fetches never produce response headers.
    pub fn hang_first(self, n: u32) -> Self {
        self.hung_fetches.store(n, Ordering::SeqCst);
        self
    }

    pub fn hang_probe(mut self) -> Self {
        self.hang_probe = true;
        self
    }

    pub fn piece(mut self, piece: usize) -> Self {
        self.piece = piece.max(1);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().len()
    }

    fn body_of(&self, data: Bytes) -> crate::plugins::registry::ByteStream {
        let piece = self.piece;
        let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
            .step_by(piece)
            .map(|i| Ok(data.slice(i..(i + piece).min(data.len()))))
            .collect();
        futures::stream::iter(chunks).boxed()
    }
}

#[async_trait]
impl TransferDriver for FakeDriver {
    fn name(&self) -> &'static str {
        "fake-driver"
    }

    async fn probe(&self, _url: &str) -> anyhow::Result<Option<u64>> {
        if self.hang_probe {
            futures::future::pending::<()>().await;
        }
        if self.probe_fails {
            anyhow::bail!("connection refused (simulated)");
        }
        Ok(self.probe_result.unwrap_or(Some(self.content.len() as u64)))
    }

    async fn fetch(&self, _url: &str, range: Option<ByteRange>) -> anyhow::Result<FetchResponse> {
        self.fetches.lock().push(range);

        if take_one(&self.hung_fetches) {
            futures::future::pending::<()>().await;
        }

        if take_one(&self.transient_failures) {
            anyhow::bail!("connection reset (simulated)");
        }

        if let (Some(r), Some(bad)) = (range, self.failing_start) {
            if r.start == bad {
                return Ok(FetchResponse {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: futures::stream::empty().boxed(),
                });
            }
        }

        if range.is_some() && self.stall_ranges {
            return Ok(FetchResponse {
                status: StatusCode::PARTIAL_CONTENT,
                body: futures::stream::pending().boxed(),
            });
        }

        let (status, mut data) = match range {
            Some(r) if !self.ignore_ranges => (
                StatusCode::PARTIAL_CONTENT,
                self.content.slice(r.start as usize..=r.end as usize),
            ),
            _ => (StatusCode::OK, self.content.clone()),
        };

        if take_one(&self.stalled_bodies) {
            let half = self.body_of(data.slice(..data.len() / 2));
            return Ok(FetchResponse {
                status,
                body: half.chain(futures::stream::pending()).boxed(),
            });
        }

        if take_one(&self.short_bodies) {
            data = data.slice(..data.len() / 2);
        }

        Ok(FetchResponse { status, body: self.body_of(data) })
    }
}
