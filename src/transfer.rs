use std::{
    fmt,
    time::{Duration, Instant},
};

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use rand::RngCore;
use reqwest::header::CONTENT_TYPE;

use crate::{config::SounderConfig, error::ProbeError};

/// Content type the test servers expect on upload bodies.
pub const UPLOAD_CONTENT_TYPE: &str = "text/xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => write!(f, "download"),
            Direction::Upload => write!(f, "upload"),
        }
    }
}

/// One completed transfer: how much moved and how long it took.
#[derive(Debug, Clone, Copy)]
pub struct Timed {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl Timed {
    pub fn bytes_per_sec(&self) -> f64 {
        self.bytes as f64 / self.elapsed.as_secs_f64().max(0.001)
    }
}

/// Blocking-per-call transfer primitives. Every method runs one request to
/// completion (or to the client's own deadline); callers sequence them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Small timed round-trip used by latency trials.
    async fn probe(&self, url: &str) -> Result<Duration, ProbeError>;

    /// Download `url`, draining the body, and report the observed rate.
    async fn download(&self, url: &str) -> Result<Timed, ProbeError>;

    /// Upload `payload` to `url` and report the observed rate.
    async fn upload(
        &self,
        url: &str,
        content_type: &str,
        payload: &[u8],
    ) -> Result<Timed, ProbeError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &SounderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(concat!("sounder/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// The directory fetch shares the measurement client's deadlines.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn checked_get(&self, url: &str) -> Result<reqwest::Response, ProbeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ProbeError::transfer)?;
        if !response.status().is_success() {
            return Err(ProbeError::Transfer(anyhow!(
                "server returned {} for {url}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn probe(&self, url: &str) -> Result<Duration, ProbeError> {
        let start = Instant::now();
        let response = self.checked_get(url).await?;
        response.bytes().await.map_err(ProbeError::transfer)?;
        Ok(start.elapsed())
    }

    async fn download(&self, url: &str) -> Result<Timed, ProbeError> {
        let start = Instant::now();
        let mut response = self.checked_get(url).await?;

        let mut total: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(ProbeError::transfer)? {
            total += chunk.len() as u64;
        }

        Ok(Timed {
            bytes: total,
            elapsed: start.elapsed(),
        })
    }

    async fn upload(
        &self,
        url: &str,
        content_type: &str,
        payload: &[u8],
    ) -> Result<Timed, ProbeError> {
        let bytes = payload.len() as u64;
        let body = Bytes::copy_from_slice(payload);

        let start = Instant::now();
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(ProbeError::transfer)?;
        if !response.status().is_success() {
            return Err(ProbeError::Transfer(anyhow!(
                "server returned {} for {url}",
                response.status()
            )));
        }
        response.bytes().await.map_err(ProbeError::transfer)?;

        Ok(Timed {
            bytes,
            elapsed: start.elapsed(),
        })
    }
}

/// One prepared transfer: a download URL, or an upload endpoint with its
/// payload. Warmup repeats a single job; a benchmark walks a ladder of them.
pub enum TransferJob {
    Download {
        url: String,
    },
    Upload {
        url: String,
        content_type: String,
        payload: Vec<u8>,
    },
}

impl TransferJob {
    pub fn download(url: String) -> Self {
        TransferJob::Download { url }
    }

    pub fn upload(url: String, payload: Vec<u8>) -> Self {
        TransferJob::Upload {
            url,
            content_type: UPLOAD_CONTENT_TYPE.to_string(),
            payload,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            TransferJob::Download { .. } => Direction::Download,
            TransferJob::Upload { .. } => Direction::Upload,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TransferJob::Download { url } => url.clone(),
            TransferJob::Upload { payload, .. } => format!("{} B payload", payload.len()),
        }
    }

    pub async fn run(&self, transport: &dyn Transport) -> Result<Timed, ProbeError> {
        match self {
            TransferJob::Download { url } => transport.download(url).await,
            TransferJob::Upload {
                url,
                content_type,
                payload,
            } => transport.upload(url, content_type, payload).await,
        }
    }
}

/// Non-compressible filler for upload payloads. Compressible bodies would
/// let the far end report a rate the link never carried.
pub fn random_payload(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}
