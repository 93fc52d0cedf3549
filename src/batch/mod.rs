/// Batch optimizer: coalesces requests into single upstream calls
///
/// Concurrent requests for one resource class are merged by a dispatcher
/// task into a single physical fetch. A batch is dispatched when it reaches
/// `max_batch_size` or when `max_wait` elapses since its first request,
/// whichever comes first.
///
/// Every enqueued request receives exactly one result keyed to its own
/// request. If the physical call fails terminally, every request in that
/// batch fails with the same underlying error; there is no partial-success
/// fabrication.
use crate::config::BatchSettings;
use crate::errors::{MiddlewareError, MiddlewareResult};
use crate::logger::{self, LogTag};
use crate::retry::RetryExecutor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Upstream call merging many keys into one response
///
/// The implementation is caller-supplied and opaque to the middleware; it
/// usually wraps a multi-symbol quote endpoint.
#[async_trait]
pub trait BatchFetcher<V>: Send + Sync {
    async fn fetch_batch(&self, keys: Vec<String>) -> anyhow::Result<HashMap<String, V>>;
}

struct PendingRequest<V> {
    key: String,
    responder: oneshot::Sender<MiddlewareResult<V>>,
}

/// Handle for enqueueing requests into the dispatcher
#[derive(Clone)]
pub struct BatchOptimizer<V> {
    tx: mpsc::Sender<PendingRequest<V>>,
}

impl<V> BatchOptimizer<V>
where
    V: Clone + Send + 'static,
{
    /// Spawn the dispatcher task for one resource class
    ///
    /// The physical call runs through the given retry executor, so a batch
    /// only fails after that executor's attempts are exhausted.
    pub fn new(
        settings: BatchSettings,
        fetcher: Arc<dyn BatchFetcher<V>>,
        retry: RetryExecutor,
    ) -> MiddlewareResult<Self> {
        if settings.max_batch_size == 0 {
            return Err(MiddlewareError::Configuration(
                "batch max_batch_size must be greater than 0".to_string(),
            ));
        }
        if settings.max_wait_ms == 0 {
            return Err(MiddlewareError::Configuration(
                "batch max_wait must be greater than 0".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(1024);
        tokio::spawn(run_dispatcher(rx, settings, fetcher, Arc::new(retry)));
        Ok(Self { tx })
    }

    /// Register a request for a resource key and await its result
    ///
    /// Requests arriving within the coalescing window share one upstream
    /// call; each caller still receives the value for its own key.
    pub async fn enqueue(&self, key: impl Into<String>) -> MiddlewareResult<V> {
        let (responder, receiver) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                key: key.into(),
                responder,
            })
            .await
            .map_err(|_| MiddlewareError::FetchFailed {
                attempts: 0,
                source: anyhow::anyhow!("batch dispatcher is no longer running"),
            })?;

        receiver.await.map_err(|_| MiddlewareError::FetchFailed {
            attempts: 0,
            source: anyhow::anyhow!("batch dispatcher dropped the request"),
        })?
    }
}

async fn run_dispatcher<V>(
    mut rx: mpsc::Receiver<PendingRequest<V>>,
    settings: BatchSettings,
    fetcher: Arc<dyn BatchFetcher<V>>,
    retry: Arc<RetryExecutor>,
) where
    V: Clone + Send + 'static,
{
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];

        // The coalescing window starts at the first request of the batch.
        let wait = tokio::time::sleep(settings.max_wait());
        tokio::pin!(wait);

        while batch.len() < settings.max_batch_size {
            tokio::select! {
                _ = &mut wait => break,
                request = rx.recv() => match request {
                    Some(r) => batch.push(r),
                    None => break,
                },
            }
        }

        // The physical call runs on its own task so the next batch's
        // coalescing window is not stretched by a slow upstream.
        tokio::spawn(dispatch_batch(
            batch,
            Arc::clone(&fetcher),
            Arc::clone(&retry),
        ));
    }
}

async fn dispatch_batch<V>(
    batch: Vec<PendingRequest<V>>,
    fetcher: Arc<dyn BatchFetcher<V>>,
    retry: Arc<RetryExecutor>,
) where
    V: Clone + Send + 'static,
{
    // Duplicate keys in one batch are fetched once and fanned out.
    let mut keys: Vec<String> = Vec::new();
    for request in &batch {
        if !keys.contains(&request.key) {
            keys.push(request.key.clone());
        }
    }

    logger::debug(
        LogTag::Batch,
        &format!(
            "dispatching batch: {} request(s), {} unique key(s)",
            batch.len(),
            keys.len()
        ),
    );

    let result = retry
        .execute(|| {
            let keys = keys.clone();
            let fetcher = Arc::clone(&fetcher);
            async move { fetcher.fetch_batch(keys).await }
        })
        .await;

    match result {
        Ok(values) => {
            for request in batch {
                let outcome = values.get(&request.key).cloned().ok_or_else(|| {
                    MiddlewareError::FetchFailed {
                        attempts: 1,
                        source: anyhow::anyhow!(
                            "upstream response missing key '{}'",
                            request.key
                        ),
                    }
                });
                // A receiver that went away already got its answer by
                // cancellation; nothing to do.
                let _ = request.responder.send(outcome);
            }
        }
        Err(err) => {
            let attempts = match &err {
                MiddlewareError::FetchFailed { attempts, .. } => *attempts,
                _ => retry.max_attempts(),
            };
            let message = err.to_string();
            logger::warning(
                LogTag::Batch,
                &format!("batch of {} request(s) failed: {}", batch.len(), message),
            );
            for request in batch {
                let _ = request.responder.send(Err(MiddlewareError::FetchFailed {
                    attempts,
                    source: anyhow::anyhow!(message.clone()),
                }));
            }
        }
    }
}
