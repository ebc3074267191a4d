use anyhow::Context;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, RANGE, USER_AGENT};

use crate::core::error::FetchError;
use crate::core::model::ByteRange;
use crate::core::policy;
use crate::plugins::registry::{FetchResponse, TransferDriver};

pub struct HttpDriver {
    client: reqwest::Client,
}

impl HttpDriver {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build reqwest client")?;
        Ok(Self { client })
    }

    fn build_headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(USER_AGENT, HeaderValue::from_static(policy::USER_AGENT));
        h
    }
}

/// Parses `Content-Length`, treating absent or malformed values as unknown.
fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

#[async_trait]
impl TransferDriver for HttpDriver {
    fn name(&self) -> &'static str {
        "http-driver"
    }

    async fn probe(&self, url: &str) -> anyhow::Result<Option<u64>> {
        let head = self
            .client
            .head(url)
            .headers(Self::build_headers())
            .send()
            .await
            .with_context(|| format!("HEAD {}", url))?;

        if !head.status().is_success() {
            return Err(FetchError::ProbeStatus(head.status()).into());
        }
        Ok(content_length(head.headers()))
    }

    async fn fetch(&self, url: &str, range: Option<ByteRange>) -> anyhow::Result<FetchResponse> {
        let mut req = self.client.get(url).headers(Self::build_headers());
        if let Some(r) = range {
            req = req.header(RANGE, r.header_value());
        }

        let resp = req.send().await.with_context(|| format!("GET {}", url))?;
        let status = resp.status();
        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)))
            .boxed();

        Ok(FetchResponse { status, body })
    }
}
