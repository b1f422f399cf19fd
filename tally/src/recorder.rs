use std::{fmt, sync::Arc};

use crate::{
    current_factory, Factory, IntoObservation, Key, NoopFactory, Observation, RecorderHandle,
};

/// A recorder.
///
/// Recorders report individual observations: request sizes, queue depths,
/// batch latencies.  A backend is free to aggregate the observations (sum,
/// min/max, quantiles) internally; recording is never an addition to a
/// running total.  Integer and floating-point observations keep their
/// representation all the way to the handler.
#[derive(Clone)]
pub struct Recorder {
    key: Key,
    handle: RecorderHandle,
    factory: Arc<dyn Factory>,
    aggregate: bool,
}

impl Recorder {
    /// Creates a `Recorder` that aggregates observations.
    ///
    /// The effective factory is resolved once, here: a scoped factory if one
    /// is bound to the current thread, the global factory otherwise.
    pub fn new<K: Into<Key>>(key: K) -> Recorder {
        Self::with_aggregate(key, true)
    }

    /// Creates a `Recorder`, choosing whether observations are aggregated.
    ///
    /// With `aggregate` set to `false`, the backend is told to treat each
    /// observation as a last-value measurement instead of a statistical
    /// sample; this is how [`Gauge`] is built.
    pub fn with_aggregate<K: Into<Key>>(key: K, aggregate: bool) -> Recorder {
        Self::with_factory(key, aggregate, current_factory())
    }

    /// Creates a `Recorder` with handlers provided by the given factory.
    pub fn with_factory<K: Into<Key>>(
        key: K,
        aggregate: bool,
        factory: Arc<dyn Factory>,
    ) -> Recorder {
        let key = key.into();
        let handle = factory.make_recorder(&key, aggregate);
        Recorder { key, handle, factory, aggregate }
    }

    /// Creates a `Recorder` around an existing handle.
    ///
    /// Meant for tests that inject a handler directly;
    /// [`destroy`](Recorder::destroy) on a recorder built this way is inert.
    pub fn from_handle<K: Into<Key>>(key: K, handle: RecorderHandle) -> Recorder {
        Recorder { key: key.into(), handle, factory: NoopFactory::shared(), aggregate: true }
    }

    /// Key of this recorder.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The handle this recorder delegates to.
    pub fn handle(&self) -> &RecorderHandle {
        &self.handle
    }

    /// Whether this recorder's observations are aggregated by the backend.
    pub fn aggregate(&self) -> bool {
        self.aggregate
    }

    /// Records one observation.
    pub fn record<V: IntoObservation>(&self, value: V) {
        match value.into_observation() {
            Observation::Int(value) => self.handle.record_int(value),
            Observation::Float(value) => self.handle.record(value),
        }
    }

    /// Signals the originating factory that the handler may be released.
    pub fn destroy(self) {
        let Recorder { handle, factory, .. } = self;
        factory.destroy_recorder(handle);
    }
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("key", &self.key)
            .field("aggregate", &self.aggregate)
            .finish_non_exhaustive()
    }
}

/// A gauge.
///
/// A gauge is a recorder with aggregation disabled: each recorded value
/// replaces the last, making it suitable for measured external quantities
/// like temperature, memory usage, or queue length at a point in time.
#[derive(Clone)]
pub struct Gauge {
    inner: Recorder,
}

impl Gauge {
    /// Creates a `Gauge`.
    ///
    /// The effective factory is resolved once, here: a scoped factory if one
    /// is bound to the current thread, the global factory otherwise.
    pub fn new<K: Into<Key>>(key: K) -> Gauge {
        Gauge { inner: Recorder::with_aggregate(key, false) }
    }

    /// Creates a `Gauge` with handlers provided by the given factory.
    pub fn with_factory<K: Into<Key>>(key: K, factory: Arc<dyn Factory>) -> Gauge {
        Gauge { inner: Recorder::with_factory(key, false, factory) }
    }

    /// Creates a `Gauge` around an existing handle.
    ///
    /// Meant for tests that inject a handler directly;
    /// [`destroy`](Gauge::destroy) on a gauge built this way is inert.
    pub fn from_handle<K: Into<Key>>(key: K, handle: RecorderHandle) -> Gauge {
        let mut inner = Recorder::from_handle(key, handle);
        inner.aggregate = false;
        Gauge { inner }
    }

    /// Key of this gauge.
    pub fn key(&self) -> &Key {
        self.inner.key()
    }

    /// The handle this gauge delegates to.
    pub fn handle(&self) -> &RecorderHandle {
        self.inner.handle()
    }

    /// Records the current value.
    pub fn record<V: IntoObservation>(&self, value: V) {
        self.inner.record(value);
    }

    /// Signals the originating factory that the handler may be released.
    pub fn destroy(self) {
        self.inner.destroy();
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gauge").field("key", self.inner.key()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Gauge, Recorder};
    use crate::{RecorderFn, RecorderHandle};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingRecorder {
        values: Mutex<Vec<(bool, f64)>>,
    }

    impl RecorderFn for RecordingRecorder {
        fn record(&self, value: f64) {
            self.values.lock().push((false, value));
        }

        fn record_int(&self, value: i64) {
            self.values.lock().push((true, value as f64));
        }
    }

    #[test]
    fn observations_keep_their_representation() {
        let backing = Arc::new(RecordingRecorder::default());
        let recorder =
            Recorder::from_handle("sizes", RecorderHandle::from_arc(backing.clone()));

        recorder.record(42u32);
        recorder.record(1.25f64);
        recorder.record(u64::MAX);

        assert_eq!(
            *backing.values.lock(),
            vec![(true, 42.0), (false, 1.25), (true, i64::MAX as f64)]
        );
    }

    #[test]
    fn gauges_are_recorders_without_aggregation() {
        let backing = Arc::new(RecordingRecorder::default());
        let gauge = Gauge::from_handle("depth", RecorderHandle::from_arc(backing.clone()));

        gauge.record(3);
        gauge.record(2.5);
        assert_eq!(*backing.values.lock(), vec![(true, 3.0), (false, 2.5)]);

        gauge.destroy();
    }
}
