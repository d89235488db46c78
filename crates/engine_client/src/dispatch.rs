use std::sync::Arc;

use shared::protocol::{Endpoint, LayerWrite, OutboundRequest, WireFormat};
use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{self, error::TrySendError},
        watch, Mutex,
    },
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::EngineWriter;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Outcome of handing writes to the pool. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub submitted: usize,
    pub dropped: usize,
}

impl DispatchReport {
    pub fn merge(self, other: Self) -> Self {
        Self {
            submitted: self.submitted + other.submitted,
            dropped: self.dropped + other.dropped,
        }
    }
}

/// The seam the console talks to; implemented by [`Dispatcher`] and by
/// test recorders.
pub trait WriteSubmitter {
    fn submit(&self, writes: &[LayerWrite]) -> DispatchReport;
    fn retarget(&self, endpoint: Endpoint);
}

pub struct Dispatcher {
    tx: mpsc::Sender<OutboundRequest>,
    format: WireFormat,
    endpoint: watch::Sender<Endpoint>,
}

pub struct DispatchWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl DispatchWorkers {
    /// Waits for every worker to drain the queue. Workers exit once all
    /// dispatchers feeding them have been dropped.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "dispatch worker ended abnormally");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Dispatcher {
    pub fn spawn(
        handle: &Handle,
        writer: Arc<dyn EngineWriter>,
        format: WireFormat,
        endpoint: Endpoint,
        config: DispatchConfig,
    ) -> (Self, DispatchWorkers) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..config.workers.max(1))
            .map(|worker| handle.spawn(run_worker(worker, Arc::clone(&rx), Arc::clone(&writer))))
            .collect();
        let (endpoint, _) = watch::channel(endpoint);
        (
            Self {
                tx,
                format,
                endpoint,
            },
            DispatchWorkers { handles },
        )
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint.borrow().clone()
    }

    /// Follows endpoint changes; used by the heartbeat.
    pub fn endpoint_watch(&self) -> watch::Receiver<Endpoint> {
        self.endpoint.subscribe()
    }

    fn enqueue(&self, request: OutboundRequest) -> bool {
        let column = request.column.clone();
        match self.tx.try_send(request) {
            Ok(()) => {
                debug!(column = %column, "queued engine write");
                true
            }
            Err(TrySendError::Full(request)) => {
                warn!(column = %column, url = %request.url, "dispatch queue full; write dropped");
                false
            }
            Err(TrySendError::Closed(request)) => {
                warn!(column = %column, url = %request.url, "dispatch workers gone; write dropped");
                false
            }
        }
    }
}

impl WriteSubmitter for Dispatcher {
    fn submit(&self, writes: &[LayerWrite]) -> DispatchReport {
        let endpoint = self.endpoint();
        writes
            .iter()
            .map(|write| self.format.request(&endpoint, write))
            .fold(DispatchReport::default(), |report, request| {
                if self.enqueue(request) {
                    report.merge(DispatchReport {
                        submitted: 1,
                        dropped: 0,
                    })
                } else {
                    report.merge(DispatchReport {
                        submitted: 0,
                        dropped: 1,
                    })
                }
            })
    }

    fn retarget(&self, endpoint: Endpoint) {
        debug!(endpoint = %endpoint, "engine endpoint changed");
        self.endpoint.send_replace(endpoint);
    }
}

async fn run_worker(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<OutboundRequest>>>,
    writer: Arc<dyn EngineWriter>,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(request) = next else {
            debug!(worker, "dispatch queue closed; worker exiting");
            return;
        };

        match writer.send(&request).await {
            Ok(status) if (200..300).contains(&status) => {
                debug!(worker, column = %request.column, status, "engine write applied");
            }
            Ok(status) => {
                warn!(
                    worker,
                    column = %request.column,
                    method = %request.method,
                    url = %request.url,
                    status,
                    "engine rejected write"
                );
            }
            Err(err) => {
                warn!(
                    worker,
                    column = %request.column,
                    error = ?err,
                    "engine write failed"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
mod tests;
