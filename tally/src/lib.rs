//! A lightweight, backend-agnostic metrics instrumentation facade.
//!
//! The `tally` crate provides a single metrics API that abstracts over the
//! actual metrics implementation.  Libraries instrument their code against
//! the metric types provided here, and the consumer of those libraries
//! chooses the backend that is most suitable for its use case -- or none at
//! all, in which case every update is a cheap no-op.
//!
//! # Overview
//!
//! `tally` exposes two main concepts: emitting a metric, and handling it.
//!
//! ## Metric types
//!
//! - [`Counter`]: a monotonically increasing integer value.  Requests
//!   served, errors observed.
//! - [`FloatCounter`]: a counter accepting fractional increments, backed by
//!   an integer counter through an accumulating adapter unless the backend
//!   supports it natively.
//! - [`Gauge`]: a last-value measurement of an external quantity.  Memory
//!   usage, temperature, queue depth.
//! - [`Meter`]: a value that moves up and down and can be set outright.
//!   Active connections, items in flight.
//! - [`Recorder`]: individual observations, aggregated by the backend.
//!   Request sizes, latencies as raw samples.
//! - [`Timer`]: durations, canonically as 64-bit signed nanosecond counts,
//!   with convenience operations for coarser units.
//!
//! Constructing a metric resolves a [`Factory`] -- explicitly passed, bound
//! to the current thread, or the process-wide global -- and asks it for a
//! handler.  The handler and factory are captured once, at construction, and
//! every update delegates straight to the handler.  Metrics never fail and
//! never block: illegal update values are dropped, and arithmetic that would
//! overflow the canonical representation saturates.
//!
//! ## Backends
//!
//! A backend implements [`Factory`], which creates and destroys the
//! per-metric handlers ([`CounterFn`], [`RecorderFn`], [`TimerFn`], and
//! friends).  Backends that implement only counters, recorders, and timers
//! get floating-point counters and meters for free through the default
//! accumulating adapters.
//!
//! Exactly one backend is active per process: install it once, early, with
//! [`bootstrap`].  A second bootstrap panics -- silently switching backends
//! mid-run would send metrics somewhere else without anyone noticing.  Tests
//! can replace the backend freely with [`bootstrap_unchecked`], or better,
//! bind a backend to the current thread with [`with_scoped_factory`] /
//! [`set_scoped_factory`] without touching global state at all.
//!
//! # Example
//!
//! ```rust
//! use tally::{Counter, Timer};
//! # use std::time::Instant;
//! # fn run_query(_: &str) -> u64 { 42 }
//!
//! pub fn process(query: &str) -> u64 {
//!     let requests = Counter::new("process.queries");
//!     let latency = Timer::new("process.query_time");
//!
//!     let start = Instant::now();
//!     let row_count = run_query(query);
//!     latency.record(start.elapsed());
//!     requests.increment(1);
//!
//!     row_count
//! }
//! ```
#![deny(missing_docs)]

mod adapters;
pub use self::adapters::{AccumulatingFloatCounter, AccumulatingMeter};

mod common;
pub use self::common::*;

mod counter;
pub use self::counter::{Counter, FloatCounter};

mod factory;
pub use self::factory::*;

mod handles;
pub use self::handles::*;

mod key;
pub use self::key::*;

mod label;
pub use self::label::*;

mod meter;
pub use self::meter::Meter;

mod recorder;
pub use self::recorder::{Gauge, Recorder};

mod timer;
pub use self::timer::Timer;
