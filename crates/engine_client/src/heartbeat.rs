//! Connectivity heartbeat against the engine's `product` endpoint.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use shared::protocol::Endpoint;
use tokio::{
    runtime::Handle,
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::debug;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(2);

const FAST_LATENCY_MS: f64 = 100.0;
const MODERATE_LATENCY_MS: f64 = 500.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Slow,
    Error(Option<u16>),
    Timeout,
    Offline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub state: LinkState,
    /// Round trip in milliseconds; zero when the engine did not answer 200.
    pub latency_ms: f64,
    /// Indicator swatch for a status light.
    pub indicator: &'static str,
    pub host: String,
}

impl StatusReport {
    pub fn from_response(status: u16, latency: Duration, host: &str) -> Self {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        if status != StatusCode::OK.as_u16() {
            return Self::failed(LinkState::Error(Some(status)), host);
        }
        let (state, indicator) = if latency_ms < FAST_LATENCY_MS {
            (LinkState::Connected, "#00AA00")
        } else if latency_ms < MODERATE_LATENCY_MS {
            (LinkState::Connected, "#FFAA00")
        } else {
            (LinkState::Slow, "#FF6600")
        };
        Self {
            state,
            latency_ms,
            indicator,
            host: host.to_string(),
        }
    }

    pub fn failed(state: LinkState, host: &str) -> Self {
        Self {
            state,
            latency_ms: 0.0,
            indicator: "#FF0000",
            host: host.to_string(),
        }
    }

    pub fn label(&self) -> String {
        match &self.state {
            LinkState::Connected => format!("Connected to engine @ {}", self.host),
            LinkState::Slow => format!("Slow to engine @ {}", self.host),
            LinkState::Error(Some(status)) => format!("Error {status}"),
            LinkState::Error(None) => "Error".to_string(),
            LinkState::Timeout => "Timeout".to_string(),
            LinkState::Offline => "Offline".to_string(),
        }
    }

    pub fn latency_label(&self) -> String {
        if self.latency_ms > 0.0 {
            format!("{:.1} ms", self.latency_ms)
        } else {
            "-- ms".to_string()
        }
    }
}

pub struct HeartbeatProbe {
    http: Client,
    endpoint: watch::Receiver<Endpoint>,
}

impl HeartbeatProbe {
    pub fn new(endpoint: watch::Receiver<Endpoint>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build heartbeat http client")?;
        Ok(Self { http, endpoint })
    }

    pub async fn check(&self) -> StatusReport {
        let endpoint = self.endpoint.borrow().clone();
        let started = Instant::now();
        match self.http.get(endpoint.product_url()).send().await {
            Ok(response) => {
                StatusReport::from_response(response.status().as_u16(), started.elapsed(), endpoint.host())
            }
            Err(err) if err.is_timeout() => StatusReport::failed(LinkState::Timeout, endpoint.host()),
            Err(err) if err.is_connect() => StatusReport::failed(LinkState::Offline, endpoint.host()),
            Err(err) => {
                debug!(error = %err, "heartbeat request failed");
                StatusReport::failed(LinkState::Error(None), endpoint.host())
            }
        }
    }

    /// Polls forever, handing every report to `on_status`.
    pub fn spawn<F>(self, handle: &Handle, interval: Duration, mut on_status: F) -> JoinHandle<()>
    where
        F: FnMut(StatusReport) + Send + 'static,
    {
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                on_status(self.check().await);
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/heartbeat_tests.rs"]
mod tests;
