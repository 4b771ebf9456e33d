//! Interval polling as a standalone update mode.

use crate::config::Config;
use crate::poller::PollingFetcher;
use crate::processor::UpdateProcessor;
use crate::readiness::ReadyGate;
use crate::telemetry::{TelemetryEvent, TelemetrySink};
use flagsync_store::{sort_data_set, FeatureStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Periodically refetches the full data set instead of streaming.
///
/// Used when streaming is disabled. Each cycle re-initializes the store
/// from a conditional fetch; 304 cycles are cheap because the cached
/// payload is reused. Recoverable failures skip the cycle and wait for
/// the next tick; unrecoverable ones stop the processor.
pub struct PollingProcessor {
    config: Arc<Config>,
    fetcher: Arc<PollingFetcher>,
    store: Arc<dyn FeatureStore>,
    ready: Arc<ReadyGate>,
    telemetry: Arc<dyn TelemetrySink>,
    stop: ReadyGate,
}

impl PollingProcessor {
    /// Wires a processor; nothing is fetched until `run`.
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<PollingFetcher>,
        store: Arc<dyn FeatureStore>,
        ready: Arc<ReadyGate>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> PollingProcessor {
        PollingProcessor {
            config,
            fetcher,
            store,
            ready,
            telemetry,
            stop: ReadyGate::new(),
        }
    }
}

impl UpdateProcessor for PollingProcessor {
    fn run(&self) {
        info!(interval = ?self.config.poll_interval, "starting polling processor");
        let init_started = Instant::now();

        while !self.stop.is_set() {
            match self.fetcher.fetch_all() {
                Ok(set) => {
                    self.store.init(sort_data_set(set));
                    if !self.ready.is_set() {
                        info!("polling processor initialized");
                        self.telemetry.record(TelemetryEvent::InitComplete {
                            ok: true,
                            elapsed: init_started.elapsed(),
                        });
                        self.ready.set();
                    }
                }
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "poll failed, waiting for next cycle");
                }
                Err(err) => {
                    error!(error = %err, "unrecoverable poll failure, giving up");
                    self.telemetry.record(TelemetryEvent::InitComplete {
                        ok: false,
                        elapsed: init_started.elapsed(),
                    });
                    self.ready.set();
                    return;
                }
            }
            if self.stop.wait_timeout(self.config.poll_interval) {
                break;
            }
        }
        info!("polling processor stopped");
    }

    fn stop(&self) {
        info!("stopping polling processor");
        self.stop.set();
    }

    fn initialized(&self) -> bool {
        !self.stop.is_set() && self.ready.is_set() && self.store.initialized()
    }
}
