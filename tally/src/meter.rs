use std::{fmt, sync::Arc};

use crate::{
    current_factory, Factory, IntoF64, IntoObservation, Key, MeterHandle, NoopFactory, Observation,
};

/// A meter.
///
/// Meters track a value that goes up and down over time and can also be set
/// outright: active connections, queue occupancy, items in flight.  Most
/// backends provide it through the default accumulating adapter, which keeps
/// the running value and reports it to a last-value recorder after every
/// change; NaN, infinite, and non-positive increment/decrement amounts are
/// silently dropped.
#[derive(Clone)]
pub struct Meter {
    key: Key,
    handle: MeterHandle,
    factory: Arc<dyn Factory>,
}

impl Meter {
    /// Creates a `Meter`.
    ///
    /// The effective factory is resolved once, here: a scoped factory if one
    /// is bound to the current thread, the global factory otherwise.
    pub fn new<K: Into<Key>>(key: K) -> Meter {
        Self::with_factory(key, current_factory())
    }

    /// Creates a `Meter` with handlers provided by the given factory.
    pub fn with_factory<K: Into<Key>>(key: K, factory: Arc<dyn Factory>) -> Meter {
        let key = key.into();
        let handle = factory.make_meter(&key);
        Meter { key, handle, factory }
    }

    /// Creates a `Meter` around an existing handle.
    ///
    /// Meant for tests that inject a handler directly;
    /// [`destroy`](Meter::destroy) on a meter built this way is inert.
    pub fn from_handle<K: Into<Key>>(key: K, handle: MeterHandle) -> Meter {
        Meter { key: key.into(), handle, factory: NoopFactory::shared() }
    }

    /// Key of this meter.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// The handle this meter delegates to.
    pub fn handle(&self) -> &MeterHandle {
        &self.handle
    }

    /// Sets the meter to the given value.
    pub fn set<V: IntoObservation>(&self, value: V) {
        match value.into_observation() {
            Observation::Int(value) => self.handle.set_int(value),
            Observation::Float(value) => self.handle.set(value),
        }
    }

    /// Increments the meter.
    pub fn increment<V: IntoF64>(&self, value: V) {
        self.handle.increment(value.into_f64());
    }

    /// Decrements the meter.
    pub fn decrement<V: IntoF64>(&self, value: V) {
        self.handle.decrement(value.into_f64());
    }

    /// Signals the originating factory that the handler may be released.
    pub fn destroy(self) {
        let Meter { handle, factory, .. } = self;
        factory.destroy_meter(handle);
    }
}

impl fmt::Debug for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter").field("key", &self.key).finish_non_exhaustive()
    }
}
