use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::protocol::{HttpMethod, OutboundRequest};

pub mod dispatch;
pub mod heartbeat;

pub use dispatch::{DispatchConfig, DispatchReport, DispatchWorkers, Dispatcher, WriteSubmitter};
pub use heartbeat::{HeartbeatProbe, LinkState, StatusReport};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(50);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for WriterTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Sends one fully formed request and reports the HTTP status.
#[async_trait]
pub trait EngineWriter: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<u16>;
}

pub struct HttpEngineWriter {
    http: Client,
}

impl HttpEngineWriter {
    pub fn new(timeouts: WriterTimeouts) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .build()
            .context("failed to build engine http client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl EngineWriter for HttpEngineWriter {
    async fn send(&self, request: &OutboundRequest) -> Result<u16> {
        let builder = match request.method {
            HttpMethod::Get => self.http.get(request.url.clone()),
            HttpMethod::Put => self.http.put(request.url.clone()),
            HttpMethod::Post => self.http.post(request.url.clone()),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };
        let response = builder
            .send()
            .await
            .with_context(|| format!("{} {} failed", request.method, request.url))?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
