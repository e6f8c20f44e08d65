// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Publish cadence: reload, generate, emit, sleep

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ConfigStore};
use crate::sensors::simulate_cycle;
use crate::streaming::Publisher;

/// Jitter bounds as fractions of the configured interval
const JITTER_LOW: f64 = 0.8;
const JITTER_HIGH: f64 = 1.2;

/// Outcome of one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub reloaded: bool,
    pub published: usize,
    pub failed: usize,
}

impl CycleReport {
    pub fn attempted(&self) -> usize {
        self.published + self.failed
    }
}

/// Drives the simulator until a fatal config error
pub struct SimulationLoop {
    store: ConfigStore,
    publisher: Publisher,
    domain: String,
    interval: Duration,
    rng: StdRng,
}

impl SimulationLoop {
    pub fn new(store: ConfigStore, publisher: Publisher, domain: impl Into<String>, interval: Duration) -> Self {
        Self {
            store,
            publisher,
            domain: domain.into(),
            interval,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replace the random source, for reproducible runs
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Run cycles forever. Returns only when the config file disappears.
    pub async fn run(&mut self) -> Result<(), ConfigError> {
        loop {
            let report = self.tick().await?;
            if report.failed > 0 {
                warn!(
                    "Cycle finished with {} of {} readings unpublished",
                    report.failed,
                    report.attempted()
                );
            }

            let pause = jittered(self.interval, &mut self.rng);
            debug!("Next cycle in {:.2}s", pause.as_secs_f64());
            tokio::time::sleep(pause).await;
        }
    }

    /// One cycle: refresh config, then generate and publish every reading.
    ///
    /// A broken config file keeps the previous snapshot; publish failures are
    /// counted and skipped.
    pub async fn tick(&mut self) -> Result<CycleReport, ConfigError> {
        let mut report = CycleReport::default();

        let config = match self.store.refresh() {
            Ok(refresh) => {
                report.reloaded = refresh.is_reloaded();
                refresh.into_config()
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Keeping previous configuration: {}", e);
                self.store.current()
            }
        };

        for reading in simulate_cycle(&config, &mut self.rng) {
            match self.publisher.emit(&self.domain, &reading).await {
                Ok(delivery) => {
                    report.published += 1;
                    info!("Published to {}: {}", delivery.topic, delivery.payload);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        "Failed to publish {}/{}/{}: {}",
                        reading.location, reading.sensor_type, reading.sensor_id, e
                    );
                }
            }
        }

        Ok(report)
    }
}

/// Uniform pause in `[interval * 0.8, interval * 1.2]`.
///
/// Falls back to `interval` when the scaled bound does not fit a `Duration`.
pub fn jittered<R: Rng + ?Sized>(interval: Duration, rng: &mut R) -> Duration {
    let secs = interval.as_secs_f64();
    Duration::try_from_secs_f64(rng.gen_range(secs * JITTER_LOW..=secs * JITTER_HIGH)).unwrap_or(interval)
}
