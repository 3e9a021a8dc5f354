//! Object worker: dequeues inbound objects and runs them through the
//! processor, a bounded number at a time.
//!
//! Processing is synchronous and may block on storage, so each object runs on
//! the blocking pool under a semaphore permit. On shutdown the worker stops
//! taking new objects and waits for the ones in flight.

use std::sync::Arc;

use bitpost_core::config::ProcessingConfig;
use bitpost_core::NetworkObject;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::processor::ObjectProcessor;

pub struct ObjectWorker {
    processor: Arc<ObjectProcessor>,
    object_rx: mpsc::Receiver<NetworkObject>,
    shutdown: broadcast::Receiver<()>,
    permits: Arc<Semaphore>,
}

impl ObjectWorker {
    /// Bounded inbound queue sized from config.
    pub fn channel(
        config: &ProcessingConfig,
    ) -> (mpsc::Sender<NetworkObject>, mpsc::Receiver<NetworkObject>) {
        mpsc::channel(config.queue_capacity.max(1))
    }

    pub fn new(
        processor: Arc<ObjectProcessor>,
        config: &ProcessingConfig,
        object_rx: mpsc::Receiver<NetworkObject>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            processor,
            object_rx,
            shutdown,
            permits: Arc::new(Semaphore::new(config.effective_workers())),
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        tracing::info!(
            workers = self.permits.available_permits(),
            "object worker started"
        );
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("object worker shutting down");
                    break;
                }

                object = self.object_rx.recv() => {
                    let Some(object) = object else {
                        tracing::info!("object_tx dropped, object worker exiting");
                        break;
                    };
                    let permit = self.permits.clone().acquire_owned().await?;
                    let processor = self.processor.clone();
                    in_flight.spawn_blocking(move || {
                        processor.receive(&object);
                        drop(permit);
                    });
                }

                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = done {
                        tracing::warn!(error = %e, "object task panicked");
                    }
                }
            }
        }

        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                tracing::warn!(error = %e, "object task panicked");
            }
        }
        Ok(())
    }
}
