//! Periodic heartbeat extension.
//!
//! Ticks on a fixed interval until stopped, or until an optional number of
//! beats has elapsed. Handlers can read the beat count to tell the background
//! machinery is alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::extensions::{Extension, ExtensionMap};
use crate::lifecycle::shutdown::Shutdown;
use crate::services::ServiceMap;

pub struct Heartbeat {
    interval: Duration,
    max_beats: Option<u64>,
    beats: AtomicU64,
    stop: Shutdown,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_beats: None,
            beats: AtomicU64::new(0),
            stop: Shutdown::new(),
        }
    }

    /// Finish on its own after `beats` ticks.
    pub fn with_max_beats(mut self, beats: u64) -> Self {
        self.max_beats = Some(beats);
        self
    }

    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_triggered()
    }
}

#[async_trait]
impl Extension for Heartbeat {
    async fn run(&self, services: Arc<ServiceMap>, extensions: Arc<ExtensionMap>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            services = services.len(),
            extensions = extensions.len(),
            "Heartbeat started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            if self.max_beats.is_some_and(|max| self.beats() >= max) {
                break;
            }
            tokio::select! {
                _ = self.stop.wait() => break,
                _ = ticker.tick() => {
                    let n = self.beats.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::trace!(beat = n, "Heartbeat");
                }
            }
        }

        tracing::info!(beats = self.beats(), "Heartbeat finished");
    }

    async fn stop(&self) {
        self.stop.trigger();
    }
}
