//! Client facade: owns the worker thread and the store handle.

use crate::config::Config;
use crate::http::Requester;
use crate::poller::PollingFetcher;
use crate::polling::PollingProcessor;
use crate::processor::UpdateProcessor;
use crate::readiness::ReadyGate;
use crate::stream::StreamingProcessor;
use crate::telemetry::{NullTelemetry, TelemetrySink};
use flagsync_store::{FeatureStore, MemoryStore};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;

/// A running synchronization client.
///
/// `start` spawns one worker thread that keeps the store current; the
/// caller reads flags and segments from [`store`](SyncClient::store) at
/// any point. Dropping the client signals the worker to stop; [`close`]
/// additionally joins it.
///
/// [`close`]: SyncClient::close
pub struct SyncClient {
    config: Arc<Config>,
    store: Arc<dyn FeatureStore>,
    ready: Arc<ReadyGate>,
    processor: Option<Arc<dyn UpdateProcessor>>,
    worker: Option<JoinHandle<()>>,
}

impl SyncClient {
    /// Starts a client with an in-memory store and no telemetry.
    pub fn start(config: Config, requester: Arc<dyn Requester>) -> SyncClient {
        SyncClient::start_with(
            config,
            requester,
            Arc::new(MemoryStore::new()),
            Arc::new(NullTelemetry),
        )
    }

    /// Starts a client with explicit store and telemetry collaborators.
    pub fn start_with(
        config: Config,
        requester: Arc<dyn Requester>,
        store: Arc<dyn FeatureStore>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> SyncClient {
        config.log_validation();
        let config = Arc::new(config);
        let ready = Arc::new(ReadyGate::new());

        if config.offline {
            info!("client started in offline mode, no connections will be made");
            return SyncClient {
                config,
                store,
                ready,
                processor: None,
                worker: None,
            };
        }

        let fetcher = Arc::new(PollingFetcher::new(config.clone(), requester.clone()));
        let processor: Arc<dyn UpdateProcessor> = if config.streaming {
            Arc::new(StreamingProcessor::new(
                config.clone(),
                requester,
                store.clone(),
                fetcher,
                ready.clone(),
                telemetry,
            ))
        } else {
            info!("streaming disabled, using interval polling");
            Arc::new(PollingProcessor::new(
                config.clone(),
                fetcher,
                store.clone(),
                ready.clone(),
                telemetry,
            ))
        };

        let worker = {
            let processor = processor.clone();
            thread::Builder::new()
                .name("flagsync-worker".into())
                .spawn(move || processor.run())
                .expect("failed to spawn sync worker thread")
        };

        SyncClient {
            config,
            store,
            ready,
            processor: Some(processor),
            worker: Some(worker),
        }
    }

    /// Blocks until initialization completes or `timeout` elapses.
    /// Returns [`initialized`](SyncClient::initialized) after the wait,
    /// so `false` covers both a timeout and a permanent failure.
    pub fn wait_for_ready(&self, timeout: Duration) -> bool {
        if self.processor.is_none() {
            return false;
        }
        self.ready.wait_timeout(timeout);
        self.initialized()
    }

    /// Waits using the configured start wait.
    pub fn wait_for_ready_default(&self) -> bool {
        self.wait_for_ready(self.config.start_wait)
    }

    /// True once the store holds a complete data set and the worker is
    /// healthy.
    pub fn initialized(&self) -> bool {
        self.processor
            .as_ref()
            .map(|p| p.initialized())
            .unwrap_or(false)
    }

    /// The synchronized store.
    pub fn store(&self) -> &Arc<dyn FeatureStore> {
        &self.store
    }

    /// Stops the worker and waits for it to exit.
    pub fn close(&mut self) {
        if let Some(processor) = &self.processor {
            processor.stop();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for SyncClient {
    // Signal only; joining can block on an in-flight read, which is not
    // acceptable in a destructor.
    fn drop(&mut self) {
        if let Some(processor) = &self.processor {
            processor.stop();
        }
    }
}
