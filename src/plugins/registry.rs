use crate::core::model::ByteRange;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use reqwest::StatusCode;

/// Response body as a stream of chunks; errors are plain I/O errors so the
/// stream can be read through `tokio_util::io::StreamReader`.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

pub struct FetchResponse {
    pub status: StatusCode,
    pub body: ByteStream,
}

#[async_trait]
pub trait TransferDriver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Discovers the resource size. `Ok(None)` means the server answered but
    /// gave no usable length.
    async fn probe(&self, url: &str) -> anyhow::Result<Option<u64>>;

    /// Starts a GET, ranged when `range` is given. Status checking is left
    /// to the caller.
    async fn fetch(&self, url: &str, range: Option<ByteRange>) -> anyhow::Result<FetchResponse>;
}
