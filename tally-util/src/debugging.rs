//! A capturing backend for debugging and test assertions.
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use parking_lot::Mutex;
use thiserror::Error;

use tally::{
    CounterFn, CounterHandle, Factory, Key, RecorderFn, RecorderHandle, SharedString, TimeUnit,
    TimerFn, TimerHandle,
};

use crate::MetricKind;

/// Errors returned by the [`CapturingFactory`] accessors.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No handler was ever created for the key.
    #[error("no metric was created for key: {0}")]
    MissingMetric(Key),

    /// A handler exists for the key, but it is of a different kind.
    #[error("metric created for key {key} is a {actual}, not a {expected}")]
    IllegalKind {
        /// The key that was looked up.
        key: Key,
        /// The kind the caller asked for.
        expected: MetricKind,
        /// The kind actually registered under the key.
        actual: MetricKind,
    },
}

/// The identity a handler is stored under.
///
/// Dimensions are normalized into an ordered map, so two keys with the same
/// pairs in a different order resolve to the same handler, and a duplicated
/// dimension key keeps the value written last.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MetricId {
    name: String,
    dimensions: BTreeMap<SharedString, SharedString>,
}

impl MetricId {
    fn from_key(key: &Key) -> Self {
        let mut dimensions = BTreeMap::new();
        for label in key.labels() {
            let (k, v) = label.clone().into_parts();
            dimensions.insert(k, v);
        }
        MetricId { name: key.name().to_string(), dimensions }
    }
}

/// A captured counter handler.
///
/// Keeps every increment as an individual event, so tests can assert on both
/// the total and the sequence of updates.
pub struct CapturedCounter {
    key: Key,
    values: Mutex<Vec<i64>>,
}

impl CapturedCounter {
    /// The key the handler was created for.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Every increment received, in arrival order.
    pub fn values(&self) -> Vec<i64> {
        self.values.lock().clone()
    }

    /// The sum of all increments received, saturating at the `i64` bounds.
    pub fn sum(&self) -> i64 {
        self.values.lock().iter().fold(0i64, |sum, value| sum.saturating_add(*value))
    }
}

impl CounterFn for CapturedCounter {
    fn increment(&self, value: i64) {
        self.values.lock().push(value);
    }

    fn reset(&self) {
        self.values.lock().clear();
    }
}

/// A captured recorder handler.
pub struct CapturedRecorder {
    key: Key,
    aggregate: bool,
    values: Mutex<Vec<f64>>,
}

impl CapturedRecorder {
    /// The key the handler was created for.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Whether the recorder was created with aggregation enabled.
    ///
    /// Gauges and the default meter adapter create their recorders with
    /// aggregation disabled.
    pub fn aggregate(&self) -> bool {
        self.aggregate
    }

    /// Every observation received, in arrival order.
    pub fn values(&self) -> Vec<f64> {
        self.values.lock().clone()
    }

    /// The most recent observation, if any.
    pub fn last(&self) -> Option<f64> {
        self.values.lock().last().copied()
    }
}

impl RecorderFn for CapturedRecorder {
    fn record(&self, value: f64) {
        self.values.lock().push(value);
    }

    fn record_int(&self, value: i64) {
        self.values.lock().push(value as f64);
    }
}

/// A captured timer handler.
pub struct CapturedTimer {
    key: Key,
    values: Mutex<Vec<i64>>,
    display_unit: Mutex<Option<TimeUnit>>,
}

impl CapturedTimer {
    /// The key the handler was created for.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Every recorded duration, in nanoseconds, in arrival order.
    pub fn values(&self) -> Vec<i64> {
        self.values.lock().clone()
    }

    /// Every recorded duration converted to the given unit.
    pub fn values_in(&self, unit: TimeUnit) -> Vec<f64> {
        let scale = unit.scale_from_nanos() as f64;
        self.values.lock().iter().map(|nanos| *nanos as f64 / scale).collect()
    }

    /// The display unit most recently hinted at the handler, if any.
    pub fn preferred_display_unit(&self) -> Option<TimeUnit> {
        *self.display_unit.lock()
    }
}

impl TimerFn for CapturedTimer {
    fn record_nanos(&self, value: i64) {
        self.values.lock().push(value);
    }

    fn prefer_display_unit(&self, unit: TimeUnit) {
        *self.display_unit.lock() = Some(unit);
    }
}

#[derive(Default)]
struct Registries {
    counters: HashMap<MetricId, (CounterHandle, Arc<CapturedCounter>)>,
    recorders: HashMap<MetricId, (RecorderHandle, Arc<CapturedRecorder>)>,
    timers: HashMap<MetricId, (TimerHandle, Arc<CapturedTimer>)>,
}

impl Registries {
    fn kind_of(&self, id: &MetricId) -> Option<MetricKind> {
        if self.counters.contains_key(id) {
            Some(MetricKind::Counter)
        } else if self.recorders.contains_key(id) {
            Some(MetricKind::Recorder)
        } else if self.timers.contains_key(id) {
            Some(MetricKind::Timer)
        } else {
            None
        }
    }
}

/// A backend that stores every handler it creates, for test assertions.
///
/// Handlers are stored keyed by metric name and normalized dimensions, so a
/// lookup finds the handler regardless of dimension ordering.  Repeated
/// creation for an equal key returns the existing handler; destroying a
/// handler removes it, so a subsequent creation starts from fresh state.
///
/// The derived kinds are deliberately not overridden: a floating-point
/// counter or meter created against this backend goes through the default
/// accumulating adapter, and its updates land on the captured counter or
/// recorder stored under the same key.
///
/// Clones share the same storage, so a test can hold one clone for
/// assertions while another is installed as the backend.
#[derive(Clone, Default)]
pub struct CapturingFactory {
    state: Arc<Mutex<Registries>>,
}

impl CapturingFactory {
    /// Creates a new `CapturingFactory`.
    pub fn new() -> CapturingFactory {
        CapturingFactory::default()
    }

    /// Fetches the captured counter for the given key.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::MissingMetric`] if no handler was created for
    /// the key, or [`LookupError::IllegalKind`] if the key holds a handler
    /// of a different kind.
    pub fn counter<K: Into<Key>>(&self, key: K) -> Result<Arc<CapturedCounter>, LookupError> {
        let key = key.into();
        let id = MetricId::from_key(&key);
        let state = self.state.lock();
        match state.counters.get(&id) {
            Some((_, captured)) => Ok(captured.clone()),
            None => Err(Self::lookup_error(&state, &id, key, MetricKind::Counter)),
        }
    }

    /// Fetches the captured recorder for the given key.
    ///
    /// Gauges and default-adapted meters resolve here as well, since both
    /// are backed by recorder handlers.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::MissingMetric`] if no handler was created for
    /// the key, or [`LookupError::IllegalKind`] if the key holds a handler
    /// of a different kind.
    pub fn recorder<K: Into<Key>>(&self, key: K) -> Result<Arc<CapturedRecorder>, LookupError> {
        let key = key.into();
        let id = MetricId::from_key(&key);
        let state = self.state.lock();
        match state.recorders.get(&id) {
            Some((_, captured)) => Ok(captured.clone()),
            None => Err(Self::lookup_error(&state, &id, key, MetricKind::Recorder)),
        }
    }

    /// Fetches the captured timer for the given key.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::MissingMetric`] if no handler was created for
    /// the key, or [`LookupError::IllegalKind`] if the key holds a handler
    /// of a different kind.
    pub fn timer<K: Into<Key>>(&self, key: K) -> Result<Arc<CapturedTimer>, LookupError> {
        let key = key.into();
        let id = MetricId::from_key(&key);
        let state = self.state.lock();
        match state.timers.get(&id) {
            Some((_, captured)) => Ok(captured.clone()),
            None => Err(Self::lookup_error(&state, &id, key, MetricKind::Timer)),
        }
    }

    /// Removes every stored handler.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.counters.clear();
        state.recorders.clear();
        state.timers.clear();
    }

    fn lookup_error(
        state: &Registries,
        id: &MetricId,
        key: Key,
        expected: MetricKind,
    ) -> LookupError {
        match state.kind_of(id) {
            Some(actual) => LookupError::IllegalKind { key, expected, actual },
            None => LookupError::MissingMetric(key),
        }
    }
}

impl Factory for CapturingFactory {
    fn make_counter(&self, key: &Key) -> CounterHandle {
        let id = MetricId::from_key(key);
        let mut state = self.state.lock();
        let (handle, _) = state.counters.entry(id).or_insert_with(|| {
            let captured =
                Arc::new(CapturedCounter { key: key.clone(), values: Mutex::new(Vec::new()) });
            (CounterHandle::from_arc(captured.clone()), captured)
        });
        handle.clone()
    }

    fn make_recorder(&self, key: &Key, aggregate: bool) -> RecorderHandle {
        let id = MetricId::from_key(key);
        let mut state = self.state.lock();
        let (handle, _) = state.recorders.entry(id).or_insert_with(|| {
            let captured = Arc::new(CapturedRecorder {
                key: key.clone(),
                aggregate,
                values: Mutex::new(Vec::new()),
            });
            (RecorderHandle::from_arc(captured.clone()), captured)
        });
        handle.clone()
    }

    fn make_timer(&self, key: &Key) -> TimerHandle {
        let id = MetricId::from_key(key);
        let mut state = self.state.lock();
        let (handle, _) = state.timers.entry(id).or_insert_with(|| {
            let captured = Arc::new(CapturedTimer {
                key: key.clone(),
                values: Mutex::new(Vec::new()),
                display_unit: Mutex::new(None),
            });
            (TimerHandle::from_arc(captured.clone()), captured)
        });
        handle.clone()
    }

    fn destroy_counter(&self, handle: CounterHandle) {
        self.state.lock().counters.retain(|_, (stored, _)| stored.id() != handle.id());
    }

    fn destroy_recorder(&self, handle: RecorderHandle) {
        self.state.lock().recorders.retain(|_, (stored, _)| stored.id() != handle.id());
    }

    fn destroy_timer(&self, handle: TimerHandle) {
        self.state.lock().timers.retain(|_, (stored, _)| stored.id() != handle.id());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{CapturingFactory, LookupError};
    use crate::MetricKind;
    use tally::{
        with_scoped_factory, Counter, Factory, FloatCounter, Gauge, Key, Meter, TimeUnit, Timer,
    };

    fn shared(factory: &CapturingFactory) -> Arc<dyn Factory> {
        Arc::new(factory.clone())
    }

    #[test]
    fn lookup_finds_handlers_by_key_and_kind() {
        let factory = CapturingFactory::new();

        let counter = Counter::with_factory("reqs", shared(&factory));
        counter.increment(3);
        let timer = Timer::with_factory("latency", shared(&factory));
        timer.record_millis(5);

        assert_eq!(factory.counter("reqs").unwrap().sum(), 3);
        assert_eq!(factory.timer("latency").unwrap().values(), vec![5_000_000]);

        assert!(matches!(
            factory.counter("latency"),
            Err(LookupError::IllegalKind {
                expected: MetricKind::Counter,
                actual: MetricKind::Timer,
                ..
            })
        ));
        assert!(matches!(
            factory.recorder("nothing"),
            Err(LookupError::MissingMetric(_))
        ));
    }

    #[test]
    fn dimension_order_does_not_matter() {
        let factory = CapturingFactory::new();

        let counter = Counter::with_factory(
            ("reqs", &[("a", "1"), ("b", "2")]),
            shared(&factory),
        );
        counter.increment(1);

        let reordered: Key = ("reqs", &[("b", "2"), ("a", "1")]).into();
        assert_eq!(factory.counter(reordered).unwrap().sum(), 1);

        // A second creation with reordered dimensions resolves to the same
        // handler rather than registering a new one.
        let same = Counter::with_factory(("reqs", &[("b", "2"), ("a", "1")]), shared(&factory));
        same.increment(1);
        assert_eq!(factory.counter(("reqs", &[("a", "1"), ("b", "2")])).unwrap().sum(), 2);
    }

    #[test]
    fn duplicate_dimension_keys_keep_the_last_value() {
        let factory = CapturingFactory::new();

        let counter = Counter::with_factory(
            ("reqs", &[("a", "old"), ("a", "new")]),
            shared(&factory),
        );
        counter.increment(1);

        assert_eq!(factory.counter(("reqs", &[("a", "new")])).unwrap().sum(), 1);
        assert!(factory.counter(("reqs", &[("a", "old")])).is_err());
    }

    #[test]
    fn destroy_then_recreate_yields_a_fresh_handler() {
        let factory = CapturingFactory::new();
        let key = Key::from_name("reqs");

        let first = factory.make_counter(&key);
        first.increment(7);
        let first_id = first.id();
        factory.destroy_counter(first);

        assert!(matches!(factory.counter("reqs"), Err(LookupError::MissingMetric(_))));

        let second = factory.make_counter(&key);
        assert_ne!(second.id(), first_id);
        assert_eq!(factory.counter("reqs").unwrap().sum(), 0);
    }

    #[test]
    fn repeated_creation_shares_the_handler() {
        let factory = CapturingFactory::new();

        let a = Counter::with_factory("reqs", shared(&factory));
        let b = Counter::with_factory("reqs", shared(&factory));
        a.increment(1);
        b.increment(1);

        assert_eq!(a.handle().id(), b.handle().id());
        assert_eq!(factory.counter("reqs").unwrap().values(), vec![1, 1]);
    }

    #[test]
    fn float_counters_resolve_to_the_underlying_counter() {
        let factory = CapturingFactory::new();

        let work = FloatCounter::with_factory("work", shared(&factory));
        work.increment(0.75);
        work.increment(1.5);

        let captured = factory.counter("work").unwrap();
        assert_eq!(captured.values(), vec![2]);
        assert_eq!(captured.sum(), 2);
    }

    #[test]
    fn meters_resolve_to_a_last_value_recorder() {
        let factory = CapturingFactory::new();

        let in_flight = Meter::with_factory("in_flight", shared(&factory));
        in_flight.set(5);
        in_flight.increment(2.0);
        in_flight.decrement(3.0);

        let captured = factory.recorder("in_flight").unwrap();
        assert!(!captured.aggregate());
        assert_eq!(captured.values(), vec![5.0, 7.0, 4.0]);
        assert_eq!(captured.last(), Some(4.0));
    }

    #[test]
    fn gauges_register_without_aggregation() {
        let factory = CapturingFactory::new();

        let depth = Gauge::with_factory("depth", shared(&factory));
        depth.record(3);
        depth.record(1.5);

        let captured = factory.recorder("depth").unwrap();
        assert!(!captured.aggregate());
        assert_eq!(captured.values(), vec![3.0, 1.5]);
    }

    #[test]
    fn timer_values_convert_to_the_preferred_unit() {
        let factory = CapturingFactory::new();

        let latency = Timer::with_factory("latency", shared(&factory));
        latency.prefer_display_unit(TimeUnit::Milliseconds);
        latency.record_millis(250);
        latency.record_seconds(1);

        let captured = factory.timer("latency").unwrap();
        assert_eq!(captured.preferred_display_unit(), Some(TimeUnit::Milliseconds));
        assert_eq!(captured.values_in(TimeUnit::Milliseconds), vec![250.0, 1_000.0]);
        assert_eq!(captured.values(), vec![250_000_000, 1_000_000_000]);
    }

    #[test]
    fn concurrent_increments_are_each_captured() {
        let factory = CapturingFactory::new();

        let counter = with_scoped_factory(shared(&factory), || Counter::new("reqs"));
        counter.increment(5);

        std::thread::scope(|s| {
            for _ in 0..100 {
                let counter = counter.clone();
                s.spawn(move || counter.increment(1));
            }
        });

        let captured = factory.counter("reqs").unwrap();
        assert_eq!(captured.sum(), 105);
        assert_eq!(captured.values().len(), 101);
    }

    #[test]
    fn clear_empties_the_registries() {
        let factory = CapturingFactory::new();

        Counter::with_factory("a", shared(&factory)).increment(1);
        Gauge::with_factory("b", shared(&factory)).record(1);

        factory.clear();
        assert!(factory.counter("a").is_err());
        assert!(factory.recorder("b").is_err());
    }
}
