use std::{fmt, sync::Arc, time::Duration};

use crate::{current_factory, Factory, IntoI64, Key, NoopFactory, TimeUnit, TimerHandle};

/// A timer.
///
/// Timers record durations: request latency, time spent in a queue, batch
/// flush time.  The handler's canonical representation is a signed 64-bit
/// nanosecond count; the convenience operations for coarser units multiply
/// into nanoseconds and saturate instead of wrapping when the result would
/// overflow.
#[derive(Clone)]
pub struct Timer {
    key: Key,
    handle: TimerHandle,
    factory: Arc<dyn Factory>,
}

impl Timer {
    /// Creates a `Timer`.
    ///
    /// The effective factory is resolved once, here: a scoped factory if one
    /// is bound to the current thread, the global factory otherwise.
    pub fn new<K: Into<Key>>(key: K) -> Timer {
        Self::with_factory(key, current_factory())
    }

    /// Creates a `Timer`, hinting the unit the backend should prefer when
    /// displaying its values.
    pub fn with_display_unit<K: Into<Key>>(key: K, unit: TimeUnit) -> Timer {
        let timer = Self::new(key);
        timer.handle.prefer_display_unit(unit);
        timer
    }

    /// Creates a `Timer` with handlers provided by the given factory.
    pub fn with_factory<K: Into<Key>>(key: K, factory: Arc<dyn Factory>) -> Timer {
        let key = key.into();
        let handle = factory.make_timer(&key);
        Timer { key, handle, factory }
    }

    /// Creates a `Timer` around an existing handle.
    ///
    /// Meant for tests that inject a handler directly;
    /// [`destroy`](Timer::destroy) on a timer built this way is inert.
    pub fn from_handle<K: Into<Key>>(key: K, handle: TimerHandle) -> Timer {
        Timer { key: key.into(), handle, factory: NoopFactory::shared() }
    }

    /// Key of this timer.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The handle this timer delegates to.
    pub fn handle(&self) -> &TimerHandle {
        &self.handle
    }

    /// Records a duration in nanoseconds.
    pub fn record_nanos<V: IntoI64>(&self, value: V) {
        self.handle.record_nanos(value.into_i64());
    }

    /// Records a duration in microseconds.
    pub fn record_micros<V: IntoI64>(&self, value: V) {
        self.handle.record_nanos(value.into_i64().saturating_mul(1_000));
    }

    /// Records a duration in milliseconds.
    pub fn record_millis<V: IntoI64>(&self, value: V) {
        self.handle.record_nanos(value.into_i64().saturating_mul(1_000_000));
    }

    /// Records a duration in seconds.
    pub fn record_seconds<V: IntoI64>(&self, value: V) {
        self.handle.record_nanos(value.into_i64().saturating_mul(1_000_000_000));
    }

    /// Records a [`Duration`].
    pub fn record(&self, duration: Duration) {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        self.handle.record_nanos(nanos);
    }

    /// Signals the unit the backend should prefer when displaying recorded
    /// durations.
    pub fn prefer_display_unit(&self, unit: TimeUnit) {
        self.handle.prefer_display_unit(unit);
    }

    /// Signals the originating factory that the handler may be released.
    pub fn destroy(self) {
        let Timer { handle, factory, .. } = self;
        factory.destroy_timer(handle);
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer").field("key", &self.key).finish_non_exhaustive()
    }
}
