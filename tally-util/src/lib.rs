//! Helper backends for the `tally` metrics facade.
//!
//! Two reference implementations of the [`Factory`](tally::Factory)
//! contract live here:
//!
//! - [`Fanout`]: multiplexes every handler operation across an ordered list
//!   of sub-backends, for processes that ship metrics to more than one
//!   destination.
//! - [`CapturingFactory`]: stores every created handler, keyed by metric
//!   name and (order-normalized) dimensions, and exposes accessors over the
//!   raw update history -- the backend to install in tests that assert on
//!   emitted metrics.
#![deny(missing_docs)]

pub mod debugging;
pub use debugging::{CapturingFactory, LookupError};

pub mod fanout;
pub use fanout::{Fanout, FanoutBuilder};

mod kind;
pub use kind::MetricKind;
