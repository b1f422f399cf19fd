use std::{fmt, sync::Arc};

use crate::{
    current_factory, CounterHandle, Factory, FloatCounterHandle, IntoF64, IntoI64, Key,
    NoopFactory,
};

/// A counter.
///
/// Counters are integer values that only ever go up (or are reset to zero on
/// restart): requests served, bytes sent, errors observed.  Increment amounts
/// can be any primitive integer; they are converted to the handler's `i64`
/// representation with saturation.
#[derive(Clone)]
pub struct Counter {
    key: Key,
    handle: CounterHandle,
    factory: Arc<dyn Factory>,
}

impl Counter {
    /// Creates a `Counter`.
    ///
    /// The effective factory is resolved once, here: a scoped factory if one
    /// is bound to the current thread, the global factory otherwise.
    pub fn new<K: Into<Key>>(key: K) -> Counter {
        Self::with_factory(key, current_factory())
    }

    /// Creates a `Counter` with handlers provided by the given factory.
    pub fn with_factory<K: Into<Key>>(key: K, factory: Arc<dyn Factory>) -> Counter {
        let key = key.into();
        let handle = factory.make_counter(&key);
        Counter { key, handle, factory }
    }

    /// Creates a `Counter` around an existing handle.
    ///
    /// Meant for tests that inject a handler directly; [`destroy`](Counter::destroy)
    /// on a counter built this way is inert.
    pub fn from_handle<K: Into<Key>>(key: K, handle: CounterHandle) -> Counter {
        Counter { key: key.into(), handle, factory: NoopFactory::shared() }
    }

    /// Key of this counter.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The handle this counter delegates to.
    pub fn handle(&self) -> &CounterHandle {
        &self.handle
    }

    /// Increments the counter.
    pub fn increment<V: IntoI64>(&self, value: V) {
        self.handle.increment(value.into_i64());
    }

    /// Resets the counter back to zero.
    pub fn reset(&self) {
        self.handle.reset();
    }

    /// Signals the originating factory that the handler may be released.
    ///
    /// Clones of this counter keep their handle and may still race an update
    /// against the destruction; the factory contract makes that benign.
    pub fn destroy(self) {
        let Counter { handle, factory, .. } = self;
        factory.destroy_counter(handle);
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counter").field("key", &self.key).finish_non_exhaustive()
    }
}

/// A floating-point counter.
///
/// Behaves like [`Counter`], but accepts fractional increment amounts.  Most
/// backends provide it through the default accumulating adapter, which
/// forwards whole-number increments to an integer counter as the fractional
/// parts add up; NaN, infinite, and non-positive amounts are silently
/// dropped.
#[derive(Clone)]
pub struct FloatCounter {
    key: Key,
    handle: FloatCounterHandle,
    factory: Arc<dyn Factory>,
}

impl FloatCounter {
    /// Creates a `FloatCounter`.
    ///
    /// The effective factory is resolved once, here: a scoped factory if one
    /// is bound to the current thread, the global factory otherwise.
    pub fn new<K: Into<Key>>(key: K) -> FloatCounter {
        Self::with_factory(key, current_factory())
    }

    /// Creates a `FloatCounter` with handlers provided by the given factory.
    pub fn with_factory<K: Into<Key>>(key: K, factory: Arc<dyn Factory>) -> FloatCounter {
        let key = key.into();
        let handle = factory.make_float_counter(&key);
        FloatCounter { key, handle, factory }
    }

    /// Creates a `FloatCounter` around an existing handle.
    ///
    /// Meant for tests that inject a handler directly;
    /// [`destroy`](FloatCounter::destroy) on a counter built this way is inert.
    pub fn from_handle<K: Into<Key>>(key: K, handle: FloatCounterHandle) -> FloatCounter {
        FloatCounter { key: key.into(), handle, factory: NoopFactory::shared() }
    }

    /// Key of this counter.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The handle this counter delegates to.
    pub fn handle(&self) -> &FloatCounterHandle {
        &self.handle
    }

    /// Increments the counter.
    pub fn increment<V: IntoF64>(&self, value: V) {
        self.handle.increment(value.into_f64());
    }

    /// Resets the counter back to zero.
    pub fn reset(&self) {
        self.handle.reset();
    }

    /// Signals the originating factory that the handler may be released.
    pub fn destroy(self) {
        let FloatCounter { handle, factory, .. } = self;
        factory.destroy_float_counter(handle);
    }
}

impl fmt::Debug for FloatCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FloatCounter").field("key", &self.key).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::Counter;
    use crate::CounterHandle;
    use std::sync::{atomic::AtomicI64, atomic::Ordering, Arc};

    #[test]
    fn increments_accept_any_integer_width() {
        let state = Arc::new(AtomicI64::new(0));
        let counter = Counter::from_handle("reqs", CounterHandle::from_arc(state.clone()));

        counter.increment(1u8);
        counter.increment(2i32);
        counter.increment(3usize);
        assert_eq!(state.load(Ordering::Acquire), 6);

        counter.increment(u64::MAX);
        assert_eq!(state.load(Ordering::Acquire), i64::MAX);

        counter.reset();
        assert_eq!(state.load(Ordering::Acquire), 0);
    }

    #[test]
    fn clones_share_the_handler() {
        let state = Arc::new(AtomicI64::new(0));
        let counter = Counter::from_handle("reqs", CounterHandle::from_arc(state.clone()));
        let clone = counter.clone();

        counter.increment(1);
        clone.increment(1);
        assert_eq!(state.load(Ordering::Acquire), 2);

        // Destroying a handle-injected counter is inert.
        counter.destroy();
        clone.increment(1);
        assert_eq!(state.load(Ordering::Acquire), 3);
    }

    #[test]
    fn key_round_trips() {
        let counter = Counter::from_handle(("reqs", &[("route", "/")]), CounterHandle::noop());
        assert_eq!(counter.key().name(), "reqs");
        assert_eq!(counter.key().labels().count(), 1);
        assert!(format!("{counter:?}").starts_with("Counter"));
    }
}
