use std::{cell::RefCell, marker::PhantomData, sync::Arc};

use once_cell::sync::Lazy;

mod errors;
pub use self::errors::BootstrapError;

mod global;
use self::global::GlobalFactory;

mod noop;
pub use self::noop::NoopFactory;

use crate::{
    AccumulatingFloatCounter, AccumulatingMeter, CounterHandle, FloatCounterHandle, Key,
    MeterHandle, RecorderHandle, TimerHandle,
};

static GLOBAL_FACTORY: Lazy<GlobalFactory> = Lazy::new(GlobalFactory::new);

thread_local! {
    static SCOPED_FACTORY: RefCell<Option<Arc<dyn Factory>>> = RefCell::new(None);
}

/// A trait for creating and destroying metric handlers.
///
/// This is the core trait that backends implement: the metric types in this
/// crate resolve a factory at construction time, ask it for a handler, and
/// hand the handler back through `destroy_*` when the metric is explicitly
/// destroyed.
///
/// # Contract
///
/// `make_*` must always succeed and return a handle that is immediately
/// usable; there is no error channel.  `destroy_*` is a hint that the handler
/// will no longer be updated through the destroying metric: stateless
/// backends may ignore it, while backends holding per-handler resources
/// should release them, keyed on the handle's [`id`](CounterHandle::id).  A
/// clone of a destroyed metric can still race an update against destruction;
/// backends must tolerate that by, at worst, dropping the update.
///
/// # Derived kinds
///
/// Floating-point counters and meters have default implementations built
/// from the base kinds: [`AccumulatingFloatCounter`] over an integer counter
/// and [`AccumulatingMeter`] over a non-aggregating recorder.  A backend with
/// native support for either kind overrides both the `make_*` and
/// `destroy_*` halves; the handles built by the defaults remember the base
/// handle they adapt, which is how the default `destroy_*` releases the
/// backend's underlying handler.
pub trait Factory: Send + Sync {
    /// Creates a counter handler for the given key.
    fn make_counter(&self, key: &Key) -> CounterHandle;

    /// Creates a floating-point counter handler for the given key.
    fn make_float_counter(&self, key: &Key) -> FloatCounterHandle {
        let counter = self.make_counter(key);
        let adapter = Arc::new(AccumulatingFloatCounter::new(counter.clone()));
        FloatCounterHandle::from_adapter(adapter, counter)
    }

    /// Creates a recorder handler for the given key.
    ///
    /// When `aggregate` is `false` the backend should treat recorded values
    /// as a last-value gauge rather than a statistical sample.
    fn make_recorder(&self, key: &Key, aggregate: bool) -> RecorderHandle;

    /// Creates a meter handler for the given key.
    fn make_meter(&self, key: &Key) -> MeterHandle {
        let recorder = self.make_recorder(key, false);
        let adapter = Arc::new(AccumulatingMeter::new(recorder.clone()));
        MeterHandle::from_adapter(adapter, recorder)
    }

    /// Creates a timer handler for the given key.
    fn make_timer(&self, key: &Key) -> TimerHandle;

    /// Releases a counter handler.
    fn destroy_counter(&self, handle: CounterHandle);

    /// Releases a floating-point counter handler.
    fn destroy_float_counter(&self, handle: FloatCounterHandle) {
        if let Some(counter) = handle.into_origin() {
            self.destroy_counter(counter);
        }
    }

    /// Releases a recorder handler.
    fn destroy_recorder(&self, handle: RecorderHandle);

    /// Releases a meter handler.
    fn destroy_meter(&self, handle: MeterHandle) {
        if let Some(recorder) = handle.into_origin() {
            self.destroy_recorder(recorder);
        }
    }

    /// Releases a timer handler.
    fn destroy_timer(&self, handle: TimerHandle);
}

// Blanket implementations.
macro_rules! impl_factory {
    ($inner_ty:ident, $ptr_ty:ty) => {
        impl<$inner_ty> $crate::Factory for $ptr_ty
        where
            $inner_ty: $crate::Factory + ?Sized,
        {
            fn make_counter(&self, key: &$crate::Key) -> $crate::CounterHandle {
                std::ops::Deref::deref(self).make_counter(key)
            }

            fn make_float_counter(&self, key: &$crate::Key) -> $crate::FloatCounterHandle {
                std::ops::Deref::deref(self).make_float_counter(key)
            }

            fn make_recorder(&self, key: &$crate::Key, aggregate: bool) -> $crate::RecorderHandle {
                std::ops::Deref::deref(self).make_recorder(key, aggregate)
            }

            fn make_meter(&self, key: &$crate::Key) -> $crate::MeterHandle {
                std::ops::Deref::deref(self).make_meter(key)
            }

            fn make_timer(&self, key: &$crate::Key) -> $crate::TimerHandle {
                std::ops::Deref::deref(self).make_timer(key)
            }

            fn destroy_counter(&self, handle: $crate::CounterHandle) {
                std::ops::Deref::deref(self).destroy_counter(handle)
            }

            fn destroy_float_counter(&self, handle: $crate::FloatCounterHandle) {
                std::ops::Deref::deref(self).destroy_float_counter(handle)
            }

            fn destroy_recorder(&self, handle: $crate::RecorderHandle) {
                std::ops::Deref::deref(self).destroy_recorder(handle)
            }

            fn destroy_meter(&self, handle: $crate::MeterHandle) {
                std::ops::Deref::deref(self).destroy_meter(handle)
            }

            fn destroy_timer(&self, handle: $crate::TimerHandle) {
                std::ops::Deref::deref(self).destroy_timer(handle)
            }
        }
    };
}

impl_factory!(T, &T);
impl_factory!(T, &mut T);
impl_factory!(T, std::boxed::Box<T>);
impl_factory!(T, std::sync::Arc<T>);

/// Guard for a scoped factory binding.
///
/// Returned by [`set_scoped_factory`]; while the guard lives, metrics
/// constructed on the current thread resolve the bound factory instead of the
/// global one.  Dropping the guard restores whatever binding was active
/// before, so scopes nest.  The guard is deliberately not `Send`: a scoped
/// binding belongs to the thread that created it.
pub struct ScopedFactoryGuard {
    prev: Option<Arc<dyn Factory>>,
    _not_send: PhantomData<*const ()>,
}

impl ScopedFactoryGuard {
    fn new(factory: Arc<dyn Factory>) -> Self {
        let prev = SCOPED_FACTORY.with(|scoped| scoped.borrow_mut().replace(factory));
        Self { prev, _not_send: PhantomData }
    }
}

impl Drop for ScopedFactoryGuard {
    fn drop(&mut self) {
        SCOPED_FACTORY.with(|scoped| {
            *scoped.borrow_mut() = self.prev.take();
        });
    }
}

/// Bootstraps the metrics system with the given factory.
///
/// This may be called at most once in the lifetime of a program; metrics
/// constructed before it is called are bound to the no-op factory and stay
/// that way.
///
/// # Panics
///
/// Panics if the metrics system was already bootstrapped.  Silently switching
/// backends mid-run would make metrics quietly land somewhere else, so a
/// second bootstrap is treated as a programming error rather than a
/// recoverable condition.  Use [`try_bootstrap`] to observe the failure
/// instead.
pub fn bootstrap<F>(factory: F)
where
    F: Factory + 'static,
{
    if try_bootstrap(factory).is_err() {
        panic!("the metrics system may only be bootstrapped once per process");
    }
}

/// Bootstraps the metrics system with the given factory, failing if it was
/// already bootstrapped.
///
/// # Errors
///
/// Returns an error carrying the rejected factory if a factory has already
/// been installed through [`bootstrap`] or `try_bootstrap`.
pub fn try_bootstrap<F>(factory: F) -> Result<(), BootstrapError<F>>
where
    F: Factory + 'static,
{
    GLOBAL_FACTORY.install(factory)
}

/// Replaces the global factory without enforcing the once-only rule.
///
/// This exists for test harnesses that need to install a fresh factory per
/// test case; production code should use [`bootstrap`].  Metrics constructed
/// before the replacement keep the factory they were constructed with.
pub fn bootstrap_unchecked<F>(factory: F)
where
    F: Factory + 'static,
{
    GLOBAL_FACTORY.replace(factory)
}

/// Binds a factory to the current thread for the lifetime of the returned
/// guard.
///
/// While bound, the factory takes priority over the global one for every
/// metric constructed on this thread, including by code this thread calls
/// into.  The binding is captured at metric construction time only: metrics
/// constructed inside the scope keep the bound factory after the guard is
/// dropped, and metrics constructed before the scope are unaffected.
///
/// Suitable for capturing metrics in tests and in single-threaded async
/// code; the binding does not follow work spawned onto other threads.
#[must_use]
pub fn set_scoped_factory(factory: Arc<dyn Factory>) -> ScopedFactoryGuard {
    ScopedFactoryGuard::new(factory)
}

/// Runs a closure with the given factory bound to the current thread,
/// returning whatever the closure returns.
///
/// Closure form of [`set_scoped_factory`]; the binding is removed when the
/// closure finishes, even if it panics.
pub fn with_scoped_factory<T>(factory: Arc<dyn Factory>, f: impl FnOnce() -> T) -> T {
    let _scoped = ScopedFactoryGuard::new(factory);
    f()
}

/// Returns the factory a metric constructed right now would bind to.
///
/// The scoped binding takes priority if one is active on the current thread;
/// otherwise the global factory is returned, which is the shared no-op
/// factory until [`bootstrap`] is called.
pub fn current_factory() -> Arc<dyn Factory> {
    SCOPED_FACTORY
        .with(|scoped| scoped.borrow().clone())
        .unwrap_or_else(|| GLOBAL_FACTORY.current())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        bootstrap, bootstrap_unchecked, set_scoped_factory, try_bootstrap, with_scoped_factory,
        Factory, NoopFactory,
    };
    use crate::{Counter, Key};

    use self::test_factories::{DestroyTrackingFactory, SimpleCounterFactory};

    #[test]
    fn blanket_implementations() {
        fn is_factory<T: Factory>(_factory: T) {}

        let mut local = NoopFactory;

        is_factory(NoopFactory);
        is_factory(Arc::new(NoopFactory));
        is_factory(Box::new(NoopFactory));
        is_factory(&local);
        is_factory(&mut local);

        let shared: Arc<dyn Factory> = NoopFactory::shared();
        is_factory(shared);
    }

    #[test]
    fn noop_factory_hands_out_noop_handles() {
        let key = Key::from_name("anything");
        let factory = NoopFactory;

        let counter = factory.make_counter(&key);
        counter.increment(42);
        factory.destroy_counter(counter);

        // The overridden derived kinds skip the adapter entirely.
        let float_counter = factory.make_float_counter(&key);
        assert!(float_counter.origin().is_none());
        factory.destroy_float_counter(float_counter);
    }

    #[test]
    fn bootstrap_once_is_enforced() {
        // The only test that touches the production bootstrap path, so the
        // sequence below is deterministic regardless of test ordering.
        assert!(try_bootstrap(SimpleCounterFactory::new()).is_ok());

        let rejected = try_bootstrap(SimpleCounterFactory::new());
        assert!(rejected.is_err());

        let result = std::panic::catch_unwind(|| bootstrap(SimpleCounterFactory::new()));
        assert!(result.is_err());

        // The unchecked entry point stays usable for repeated test setup.
        bootstrap_unchecked(SimpleCounterFactory::new());
        bootstrap_unchecked(SimpleCounterFactory::new());
    }

    #[test]
    fn thread_scoped_factory_bindings_do_not_interfere() {
        let t1_factory = SimpleCounterFactory::new();
        let t2_factory = SimpleCounterFactory::new();
        let t3_factory = SimpleCounterFactory::new();

        std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = set_scoped_factory(Arc::new(t1_factory.clone()));
                Counter::new("t1_counter").increment(1);
            });

            s.spawn(|| {
                with_scoped_factory(Arc::new(t2_factory.clone()), || {
                    Counter::new("t2_counter").increment(2);
                })
            });

            s.spawn(|| {
                let _guard = set_scoped_factory(Arc::new(t3_factory.clone()));
                Counter::new("t3_counter").increment(3);
            });
        });

        assert_eq!(t1_factory.value(), 1);
        assert_eq!(t2_factory.value(), 2);
        assert_eq!(t3_factory.value(), 3);
    }

    #[test]
    fn scoped_binding_restored_when_guard_drops() {
        let outer = SimpleCounterFactory::new();
        let inner = SimpleCounterFactory::new();

        let _outer_guard = set_scoped_factory(Arc::new(outer.clone()));
        Counter::new("c").increment(1);

        {
            let _inner_guard = set_scoped_factory(Arc::new(inner.clone()));
            Counter::new("c").increment(10);
        }

        Counter::new("c").increment(2);

        assert_eq!(outer.value(), 3);
        assert_eq!(inner.value(), 10);
    }

    #[test]
    fn metrics_capture_the_binding_at_construction() {
        let first = SimpleCounterFactory::new();
        let second = SimpleCounterFactory::new();

        let counter = with_scoped_factory(Arc::new(first.clone()), || Counter::new("captured"));

        // Updating outside the scope, and even inside a different scope,
        // still lands on the factory captured at construction.
        counter.increment(1);
        with_scoped_factory(Arc::new(second.clone()), || counter.increment(1));

        assert_eq!(first.value(), 2);
        assert_eq!(second.value(), 0);
    }

    #[test]
    fn default_float_counter_accumulates_into_the_base_counter() {
        let factory = SimpleCounterFactory::new();
        let key = Key::from_name("fractions");

        let handle = factory.make_float_counter(&key);
        handle.increment(0.5);
        handle.increment(0.25);
        handle.increment(0.25);

        assert_eq!(factory.value(), 1);
        assert!(handle.origin().is_some());
    }

    #[test]
    fn default_destroy_releases_the_base_handler() {
        let factory = DestroyTrackingFactory::default();
        let key = Key::from_name("derived");

        let float_counter = factory.make_float_counter(&key);
        let base_id = float_counter.origin().map(|origin| origin.id());
        factory.destroy_float_counter(float_counter);
        assert_eq!(factory.destroyed(), base_id.into_iter().collect::<Vec<_>>());

        let meter = factory.make_meter(&key);
        let base_id = meter.origin().map(|origin| origin.id()).expect("adapted meter");
        factory.destroy_meter(meter);
        assert!(factory.destroyed().contains(&base_id));
    }

    mod test_factories {
        use std::sync::{atomic::AtomicI64, atomic::Ordering, Arc};

        use parking_lot::Mutex;

        use super::Factory;
        use crate::{
            CounterHandle, HandleId, Key, RecorderFn, RecorderHandle, TimerFn, TimerHandle,
        };

        // A factory whose counters all share one atomic cell.
        #[derive(Clone)]
        pub struct SimpleCounterFactory {
            state: Arc<AtomicI64>,
        }

        impl SimpleCounterFactory {
            pub fn new() -> Self {
                Self { state: Arc::new(AtomicI64::new(0)) }
            }

            pub fn value(&self) -> i64 {
                self.state.load(Ordering::Acquire)
            }
        }

        impl Factory for SimpleCounterFactory {
            fn make_counter(&self, _key: &Key) -> CounterHandle {
                CounterHandle::from_arc(self.state.clone())
            }

            fn make_recorder(&self, _key: &Key, _aggregate: bool) -> RecorderHandle {
                RecorderHandle::noop()
            }

            fn make_timer(&self, _key: &Key) -> TimerHandle {
                TimerHandle::noop()
            }

            fn destroy_counter(&self, _handle: CounterHandle) {}
            fn destroy_recorder(&self, _handle: RecorderHandle) {}
            fn destroy_timer(&self, _handle: TimerHandle) {}
        }

        struct Sink;

        impl RecorderFn for Sink {
            fn record(&self, _value: f64) {}
            fn record_int(&self, _value: i64) {}
        }

        impl TimerFn for Sink {
            fn record_nanos(&self, _value: i64) {}
        }

        impl crate::CounterFn for Sink {
            fn increment(&self, _value: i64) {}
            fn reset(&self) {}
        }

        // A factory that remembers which handler ids were destroyed.
        #[derive(Default)]
        pub struct DestroyTrackingFactory {
            destroyed: Mutex<Vec<HandleId>>,
        }

        impl DestroyTrackingFactory {
            pub fn destroyed(&self) -> Vec<HandleId> {
                self.destroyed.lock().clone()
            }
        }

        impl Factory for DestroyTrackingFactory {
            fn make_counter(&self, _key: &Key) -> CounterHandle {
                CounterHandle::from_arc(Arc::new(Sink))
            }

            fn make_recorder(&self, _key: &Key, _aggregate: bool) -> RecorderHandle {
                RecorderHandle::from_arc(Arc::new(Sink))
            }

            fn make_timer(&self, _key: &Key) -> TimerHandle {
                TimerHandle::from_arc(Arc::new(Sink))
            }

            fn destroy_counter(&self, handle: CounterHandle) {
                self.destroyed.lock().push(handle.id());
            }

            fn destroy_recorder(&self, handle: RecorderHandle) {
                self.destroyed.lock().push(handle.id());
            }

            fn destroy_timer(&self, handle: TimerHandle) {
                self.destroyed.lock().push(handle.id());
            }
        }
    }
}
