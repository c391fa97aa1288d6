//! Wires a transport, the ingest worker and the shared window together.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::MonitorConfig;
use crate::ingest::{self, IngestStats, Ingestor};
use crate::transport::{Transport, TransportError};
use crate::window::SampleWindow;

/// A running ingestion pipeline.
///
/// Dropping a pipeline without calling [`Pipeline::shutdown`] leaves the
/// ingest worker detached; it exits once the transport is dropped.
pub struct Pipeline<T: Transport> {
    transport: T,
    window: Arc<SampleWindow>,
    stats: Arc<IngestStats>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Transport> Pipeline<T> {
    /// Build the window and worker, subscribe, and start the transport.
    pub fn start(config: &MonitorConfig, mut transport: T) -> Result<Self, TransportError> {
        let window = Arc::new(SampleWindow::new(config.max_points));
        let stats = Arc::new(IngestStats::new());
        let ingestor = Arc::new(Ingestor::new(Arc::clone(&window), Arc::clone(&stats)));

        let (sender, rx) = ingest::channel(config.queue_capacity, Arc::clone(&stats));
        let worker = ingest::spawn_ingest_worker(rx, ingestor)?;

        transport.subscribe(&config.topic)?;
        transport.start(sender)?;

        Ok(Self {
            transport,
            window,
            stats,
            worker: Some(worker),
        })
    }

    pub fn window(&self) -> &Arc<SampleWindow> {
        &self.window
    }

    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Stop the transport's background loop, then wait for the ingest worker
    /// to drain and exit.
    pub fn shutdown(mut self) {
        if let Err(e) = self.transport.stop() {
            log::warn!("error stopping transport: {e}");
        }
        // The transport may still hold a sender; drop it so the worker's
        // queue disconnects.
        drop(self.transport);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::error!("ingest worker panicked");
        }
        log::info!("pipeline stopped");
    }
}
