use crate::core::model::{ChunkKey, DownloadStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Default)]
struct ProgressState {
    total_size: u64,
    downloaded_size: u64,
    chunk_progress: HashMap<ChunkKey, u64>,
    excepted: bool,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<ProgressState>,
    paused: watch::Sender<bool>,
}

/// Shared progress/pause/failure tracker for one download.
///
/// Cloning is cheap and every clone observes the same state: the caller
/// keeps one handle and the engine hands clones to its workers.
#[derive(Debug, Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ProgressState::default()),
                paused,
            }),
        }
    }

    /// Records `size` bytes downloaded so far for `key`.
    ///
    /// A whole-file report with no chunk entries yet sets the aggregate
    /// directly. Anything else is stored per key and the aggregate is
    /// recomputed as the sum over all keys.
    pub fn update_progress(&self, size: u64, key: ChunkKey) {
        let mut st = self.inner.state.lock();
        if key == ChunkKey::Whole && st.chunk_progress.is_empty() {
            st.downloaded_size = size;
        } else {
            st.chunk_progress.insert(key, size);
            st.downloaded_size = st.chunk_progress.values().sum();
        }
    }

    pub fn pause(&self) {
        self.inner.paused.send_replace(true);
    }

    pub fn unpause(&self) {
        self.inner.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    /// Resolves immediately when not paused, otherwise once `unpause` is called.
    pub async fn wait_until_resumed(&self) {
        let mut rx = self.inner.paused.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|paused| !*paused).await;
    }

    /// First match wins: not started, paused, excepted, done, downloading.
    ///
    /// A zero-byte resource never leaves `NotStarted` since its downloaded
    /// size stays 0; that ambiguity with `Done` is kept as is.
    pub fn status(&self) -> DownloadStatus {
        let paused = self.is_paused();
        let st = self.inner.state.lock();
        if st.downloaded_size == 0 && !st.excepted {
            DownloadStatus::NotStarted
        } else if paused {
            DownloadStatus::Paused
        } else if st.excepted {
            DownloadStatus::Excepted
        } else if st.downloaded_size == st.total_size {
            DownloadStatus::Done
        } else {
            DownloadStatus::Downloading
        }
    }

    /// Percentage downloaded, or `-1.0` while the total size is unknown.
    /// Not clamped.
    pub fn progress(&self) -> f64 {
        let st = self.inner.state.lock();
        if st.total_size == 0 {
            return -1.0;
        }
        st.downloaded_size as f64 / st.total_size as f64 * 100.0
    }

    pub fn total_size(&self) -> u64 {
        self.inner.state.lock().total_size
    }

    pub fn downloaded_size(&self) -> u64 {
        self.inner.state.lock().downloaded_size
    }

    pub fn chunk_progress(&self, key: ChunkKey) -> Option<u64> {
        self.inner.state.lock().chunk_progress.get(&key).copied()
    }

    pub fn is_excepted(&self) -> bool {
        self.inner.state.lock().excepted
    }

    pub(crate) fn set_total_size(&self, total: u64) {
        self.inner.state.lock().total_size = total;
    }

    /// Terminal: nothing clears it.
    pub(crate) fn mark_excepted(&self) {
        self.inner.state.lock().excepted = true;
    }
}
