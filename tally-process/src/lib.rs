//! Process resource usage gauges for the `tally` metrics facade.
//!
//! This crate polls procfs on a fixed interval and reports the process's
//! resource usage -- memory sizes, CPU time, start time, and file descriptor
//! counts -- through [`Gauge`](tally::Gauge)s, using whichever backend the
//! process has bootstrapped.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! let _poller = tally_process::ProcessMetricsBuilder::new()
//!     .with_prefix("myapp")
//!     .with_interval(Duration::from_secs(5))
//!     .install()
//!     .expect("failed to install process metrics");
//!
//! // `myapp_resident_memory_bytes`, `myapp_cpu_seconds_total`, and friends
//! // now update every five seconds until the poller is dropped.
//! ```
//!
//! Gauges are constructed afresh on every poll, so installing the poller
//! before [`tally::bootstrap`] is fine: polls start landing on the real
//! backend as soon as one is installed.
#![deny(missing_docs)]

mod collector;
pub use collector::{collect, ProcessUsage};

use std::{sync::Arc, thread, time::Duration};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

use tally::{Gauge, SharedString};

/// Errors that could occur while installing the process metrics poller.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Process resource usage cannot be collected on this platform.
    #[error("process metrics are not supported on this platform")]
    UnsupportedPlatform,

    /// The background polling thread could not be spawned.
    #[error("failed to spawn background thread for polling")]
    FailedToSpawn,
}

/// Builder for the process metrics poller.
///
/// Reported gauges are named `<prefix>_<field>`, with the prefix defaulting
/// to `process`: `process_virtual_memory_bytes`,
/// `process_resident_memory_bytes`, `process_start_time_seconds`,
/// `process_cpu_seconds_total`, `process_max_fds`, and `process_open_fds`.
pub struct ProcessMetricsBuilder {
    prefix: SharedString,
    interval: Duration,
}

impl ProcessMetricsBuilder {
    /// Creates a new `ProcessMetricsBuilder` with a `process` name prefix
    /// and a two-second poll interval.
    pub fn new() -> ProcessMetricsBuilder {
        ProcessMetricsBuilder {
            prefix: SharedString::Borrowed("process"),
            interval: Duration::from_secs(2),
        }
    }

    /// Sets the prefix the reported gauge names are built from.
    pub fn with_prefix<P: Into<SharedString>>(mut self, prefix: P) -> ProcessMetricsBuilder {
        self.prefix = prefix.into();
        self
    }

    /// Sets the interval between polls.
    pub fn with_interval(mut self, interval: Duration) -> ProcessMetricsBuilder {
        self.interval = interval;
        self
    }

    /// Installs the poller, spawning its background thread.
    ///
    /// # Errors
    ///
    /// Returns an error if resource usage cannot be collected on the current
    /// platform, or if the background thread could not be spawned.
    pub fn install(self) -> Result<ProcessMetrics, BuildError> {
        if collector::collect().is_none() {
            return Err(BuildError::UnsupportedPlatform);
        }

        let shutdown = Arc::new(Shutdown::default());
        let thread = thread::Builder::new()
            .name("tally-process".to_string())
            .spawn({
                let shutdown = Arc::clone(&shutdown);
                let prefix = self.prefix;
                let interval = self.interval;
                move || poll_loop(&shutdown, &prefix, interval)
            })
            .map_err(|_| BuildError::FailedToSpawn)?;

        Ok(ProcessMetrics { shutdown, thread: Some(thread) })
    }
}

impl Default for ProcessMetricsBuilder {
    fn default() -> Self {
        ProcessMetricsBuilder::new()
    }
}

/// Handle to a running process metrics poller.
///
/// The poller stops when the handle is dropped or explicitly stopped through
/// [`stop`](ProcessMetrics::stop).
pub struct ProcessMetrics {
    shutdown: Arc<Shutdown>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ProcessMetrics {
    /// Stops the poller and waits for its background thread to finish.
    pub fn stop(self) {
        // Shutdown happens in `drop`.
    }
}

impl Drop for ProcessMetrics {
    fn drop(&mut self) {
        self.shutdown.signal();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[derive(Default)]
struct Shutdown {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl Shutdown {
    fn signal(&self) {
        *self.stopped.lock() = true;
        self.condvar.notify_all();
    }

    /// Waits out one poll interval, returning `true` once shutdown has been
    /// signaled.
    fn wait(&self, interval: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            let _ = self.condvar.wait_for(&mut stopped, interval);
        }
        *stopped
    }
}

fn poll_loop(shutdown: &Shutdown, prefix: &str, interval: Duration) {
    while !shutdown.wait(interval) {
        match collector::collect() {
            Some(usage) => report(prefix, &usage),
            None => warn!("process resource usage unavailable, skipping poll"),
        }
    }
    debug!("process metrics poller stopped");
}

fn report(prefix: &str, usage: &ProcessUsage) {
    // Gauges are rebuilt per poll against the current factory; backends
    // dedupe by name, and a backend bootstrapped after install is picked up
    // on the next poll.
    let gauge = |field: &str| Gauge::new(format!("{prefix}_{field}"));

    if let Some(value) = usage.virtual_memory_bytes {
        gauge("virtual_memory_bytes").record(value);
    }
    if let Some(value) = usage.resident_memory_bytes {
        gauge("resident_memory_bytes").record(value);
    }
    if let Some(value) = usage.start_time_seconds {
        gauge("start_time_seconds").record(value);
    }
    if let Some(value) = usage.cpu_seconds_total {
        gauge("cpu_seconds_total").record(value);
    }
    if let Some(value) = usage.max_file_descriptors {
        gauge("max_fds").record(value);
    }
    if let Some(value) = usage.open_file_descriptors {
        gauge("open_fds").record(value);
    }
}
