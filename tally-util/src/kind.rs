use std::fmt;

/// Metric kind.
///
/// Defines the fundamental handler kinds a backend stores: counters,
/// recorders, and timers.  The derived kinds (floating-point counters,
/// meters) are adapters over these, so handlers created for them register
/// under their base kind.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum MetricKind {
    /// Counter kind.
    Counter,
    /// Recorder kind.
    Recorder,
    /// Timer kind.
    Timer,
}

impl MetricKind {
    /// Gets the string form of this `MetricKind`.
    pub fn as_str(&self) -> &str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Recorder => "recorder",
            MetricKind::Timer => "timer",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
