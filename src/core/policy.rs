//! Fixed download policy. None of these are caller-tunable.

use std::time::Duration;

pub const USER_AGENT: &str = concat!("chunkfetch/", env!("CARGO_PKG_VERSION"));

/// Number of range workers used once a resource is above [`SINGLE_SHOT_THRESHOLD`].
pub const WORKER_COUNT: u64 = 10;

/// Resources at or below this size are fetched by a single worker without ranges.
pub const SINGLE_SHOT_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Bound on each body read and on waiting for a worker's response headers.
pub const READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Bound on the whole size probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Total attempts per worker, first one included.
pub const MAX_ATTEMPTS: u32 = 5;

pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

pub const READ_BUFFER_SIZE: usize = 102_400;
