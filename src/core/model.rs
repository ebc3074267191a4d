use std::fmt;
use std::time::Duration;

/// Identifies whose bytes a progress report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKey {
    /// Whole-file fetch, no range.
    Whole,
    /// Partition index within a chunked download.
    Part(usize),
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkKey::Whole => write!(f, "whole"),
            ChunkKey::Part(i) => write!(f, "part-{}", i),
        }
    }
}

/// Inclusive byte range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; zero when `end < start`.
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    NotStarted,
    Downloading,
    Paused,
    Excepted,
    Done,
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DownloadStatus::NotStarted => "not started",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Paused => "paused",
            DownloadStatus::Excepted => "failed",
            DownloadStatus::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    SingleShot,
    Chunked(Vec<ByteRange>),
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub elapsed: Duration,
    pub total_size: u64,
    pub strategy: Strategy,
}

impl DownloadReport {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}
