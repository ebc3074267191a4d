use crate::core::controller::Controller;
use crate::core::error::FetchError;
use crate::core::model::ChunkKey;
use crate::core::policy::READ_TIMEOUT;
use anyhow::Context;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(usize),
    Eof,
}

/// One read from `reader` bounded by [`READ_TIMEOUT`].
///
/// Whatever arrives is written to `sink` and added to `downloaded`, then the
/// running total is reported under `key`. That report happens once per call
/// whenever the read itself completes (data, end of stream or read error).
/// On timeout the pending read is dropped, which cancels it, and nothing is
/// reported.
pub async fn bounded_read<R, W>(
    reader: &mut R,
    buf: &mut [u8],
    sink: &mut W,
    downloaded: &mut u64,
    controller: &Controller,
    key: ChunkKey,
) -> anyhow::Result<ReadOutcome>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let read = match timeout(READ_TIMEOUT, reader.read(buf)).await {
        Ok(r) => r,
        Err(_) => return Err(FetchError::ReadTimeout(READ_TIMEOUT).into()),
    };

    let result = match read {
        Ok(0) => Ok(ReadOutcome::Eof),
        Ok(n) => sink
            .write_all(&buf[..n])
            .await
            .context("write to destination")
            .map(|_| {
                *downloaded += n as u64;
                ReadOutcome::Data(n)
            }),
        Err(e) => Err(anyhow::Error::new(e).context("read response body")),
    };

    controller.update_progress(*downloaded, key);
    result
}
