//! Single-file HTTP downloader that splits large resources into byte ranges
//! fetched in parallel, with a shared controller for progress, pause and
//! failure state.

pub mod core;
pub mod plugins;

pub use crate::core::controller::Controller;
pub use crate::core::engine::{download, Engine};
pub use crate::core::error::FetchError;
pub use crate::core::model::{ByteRange, ChunkKey, DownloadReport, DownloadStatus, Strategy};
