use std::sync::{
    atomic::{AtomicI64, AtomicU64, Ordering},
    Arc,
};

use crate::TimeUnit;

/// A counter handler.
///
/// Handlers are the backend-owned side of a metric: shared, internally
/// mutable objects that receive every update made through the user-facing
/// metric types.  Handler methods are fire-and-forget: they must not block
/// for any meaningful amount of time and must not fail.
pub trait CounterFn: Send + Sync {
    /// Increments the counter by the given amount.
    fn increment(&self, value: i64);

    /// Resets the counter back to zero.
    fn reset(&self);
}

/// A floating-point counter handler.
pub trait FloatCounterFn: Send + Sync {
    /// Increments the counter by the given amount.
    fn increment(&self, value: f64);

    /// Resets the counter back to zero.
    fn reset(&self);
}

/// A meter handler.
pub trait MeterFn: Send + Sync {
    /// Sets the meter to the given value.
    fn set(&self, value: f64);

    /// Sets the meter to the given integer value.
    fn set_int(&self, value: i64);

    /// Increments the meter by the given amount.
    fn increment(&self, value: f64);

    /// Decrements the meter by the given amount.
    fn decrement(&self, value: f64);
}

/// A recorder handler.
///
/// A recorded value is a single observation, not an addition to a running
/// total: a backend that aggregates (sum, min/max, quantiles) does so
/// internally, per call.
pub trait RecorderFn: Send + Sync {
    /// Records one observation.
    fn record(&self, value: f64);

    /// Records one integer observation.
    fn record_int(&self, value: i64);
}

/// A timer handler.
pub trait TimerFn: Send + Sync {
    /// Records one duration, in nanoseconds.
    fn record_nanos(&self, value: i64);

    /// Signals the unit the backend should prefer when displaying recorded
    /// durations.
    ///
    /// A display hint only: it must never change the values recorded through
    /// [`record_nanos`](TimerFn::record_nanos).
    fn prefer_display_unit(&self, _unit: TimeUnit) {}
}

/// An opaque token identifying a live handler.
///
/// Factories assign a fresh `HandleId` to every handler they create, and the
/// same id is handed back through `destroy_*`, so backends that keep
/// per-handler bookkeeping can key it on the id rather than on object
/// identity.  No-op handles all share the reserved zero id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    const NOOP: HandleId = HandleId(0);

    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        HandleId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

macro_rules! delegate {
    ($self:ident, $inner:ident => $body:expr) => {
        if let Some(ref $inner) = $self.inner {
            $body
        }
    };
}

/// A handle to a counter handler.
///
/// Handles are cheap to clone and delegate every operation to the shared
/// handler they were created from, or do nothing when no-op.
#[derive(Clone)]
pub struct CounterHandle {
    id: HandleId,
    inner: Option<Arc<dyn CounterFn>>,
}

impl CounterHandle {
    /// Creates a no-op `CounterHandle` which does nothing.
    pub const fn noop() -> Self {
        Self { id: HandleId::NOOP, inner: None }
    }

    /// Creates a `CounterHandle` based on a shared handler.
    pub fn from_arc<F: CounterFn + 'static>(handler: Arc<F>) -> Self {
        Self { id: HandleId::next(), inner: Some(handler) }
    }

    /// The token identifying this handler.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Increments the counter.
    pub fn increment(&self, value: i64) {
        delegate!(self, inner => inner.increment(value));
    }

    /// Resets the counter back to zero.
    pub fn reset(&self) {
        delegate!(self, inner => inner.reset());
    }
}

/// A handle to a floating-point counter handler.
#[derive(Clone)]
pub struct FloatCounterHandle {
    id: HandleId,
    inner: Option<Arc<dyn FloatCounterFn>>,
    origin: Option<CounterHandle>,
}

impl FloatCounterHandle {
    /// Creates a no-op `FloatCounterHandle` which does nothing.
    pub const fn noop() -> Self {
        Self { id: HandleId::NOOP, inner: None, origin: None }
    }

    /// Creates a `FloatCounterHandle` based on a shared handler.
    pub fn from_arc<F: FloatCounterFn + 'static>(handler: Arc<F>) -> Self {
        Self { id: HandleId::next(), inner: Some(handler), origin: None }
    }

    pub(crate) fn from_adapter<F: FloatCounterFn + 'static>(
        handler: Arc<F>,
        origin: CounterHandle,
    ) -> Self {
        Self { id: HandleId::next(), inner: Some(handler), origin: Some(origin) }
    }

    /// The token identifying this handler.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The integer counter handle this handler was adapted from, if any.
    ///
    /// Present only for handles built by the default factory adapter; a
    /// backend with native floating-point support creates handles with no
    /// origin.
    pub fn origin(&self) -> Option<&CounterHandle> {
        self.origin.as_ref()
    }

    /// Consumes the handle, returning the counter handle it was adapted from.
    pub fn into_origin(self) -> Option<CounterHandle> {
        self.origin
    }

    /// Increments the counter.
    pub fn increment(&self, value: f64) {
        delegate!(self, inner => inner.increment(value));
    }

    /// Resets the counter back to zero.
    pub fn reset(&self) {
        delegate!(self, inner => inner.reset());
    }
}

/// A handle to a meter handler.
#[derive(Clone)]
pub struct MeterHandle {
    id: HandleId,
    inner: Option<Arc<dyn MeterFn>>,
    origin: Option<RecorderHandle>,
}

impl MeterHandle {
    /// Creates a no-op `MeterHandle` which does nothing.
    pub const fn noop() -> Self {
        Self { id: HandleId::NOOP, inner: None, origin: None }
    }

    /// Creates a `MeterHandle` based on a shared handler.
    pub fn from_arc<F: MeterFn + 'static>(handler: Arc<F>) -> Self {
        Self { id: HandleId::next(), inner: Some(handler), origin: None }
    }

    pub(crate) fn from_adapter<F: MeterFn + 'static>(
        handler: Arc<F>,
        origin: RecorderHandle,
    ) -> Self {
        Self { id: HandleId::next(), inner: Some(handler), origin: Some(origin) }
    }

    /// The token identifying this handler.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The recorder handle this handler was adapted from, if any.
    pub fn origin(&self) -> Option<&RecorderHandle> {
        self.origin.as_ref()
    }

    /// Consumes the handle, returning the recorder handle it was adapted from.
    pub fn into_origin(self) -> Option<RecorderHandle> {
        self.origin
    }

    /// Sets the meter to the given value.
    pub fn set(&self, value: f64) {
        delegate!(self, inner => inner.set(value));
    }

    /// Sets the meter to the given integer value.
    pub fn set_int(&self, value: i64) {
        delegate!(self, inner => inner.set_int(value));
    }

    /// Increments the meter.
    pub fn increment(&self, value: f64) {
        delegate!(self, inner => inner.increment(value));
    }

    /// Decrements the meter.
    pub fn decrement(&self, value: f64) {
        delegate!(self, inner => inner.decrement(value));
    }
}

/// A handle to a recorder handler.
#[derive(Clone)]
pub struct RecorderHandle {
    id: HandleId,
    inner: Option<Arc<dyn RecorderFn>>,
}

impl RecorderHandle {
    /// Creates a no-op `RecorderHandle` which does nothing.
    pub const fn noop() -> Self {
        Self { id: HandleId::NOOP, inner: None }
    }

    /// Creates a `RecorderHandle` based on a shared handler.
    pub fn from_arc<F: RecorderFn + 'static>(handler: Arc<F>) -> Self {
        Self { id: HandleId::next(), inner: Some(handler) }
    }

    /// The token identifying this handler.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Records one observation.
    pub fn record(&self, value: f64) {
        delegate!(self, inner => inner.record(value));
    }

    /// Records one integer observation.
    pub fn record_int(&self, value: i64) {
        delegate!(self, inner => inner.record_int(value));
    }
}

/// A handle to a timer handler.
#[derive(Clone)]
pub struct TimerHandle {
    id: HandleId,
    inner: Option<Arc<dyn TimerFn>>,
}

impl TimerHandle {
    /// Creates a no-op `TimerHandle` which does nothing.
    pub const fn noop() -> Self {
        Self { id: HandleId::NOOP, inner: None }
    }

    /// Creates a `TimerHandle` based on a shared handler.
    pub fn from_arc<F: TimerFn + 'static>(handler: Arc<F>) -> Self {
        Self { id: HandleId::next(), inner: Some(handler) }
    }

    /// The token identifying this handler.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Records one duration, in nanoseconds.
    pub fn record_nanos(&self, value: i64) {
        delegate!(self, inner => inner.record_nanos(value));
    }

    /// Signals the unit the backend should prefer when displaying recorded
    /// durations.
    pub fn prefer_display_unit(&self, unit: TimeUnit) {
        delegate!(self, inner => inner.prefer_display_unit(unit));
    }
}

impl CounterFn for AtomicI64 {
    fn increment(&self, value: i64) {
        let _ = self.fetch_update(Ordering::AcqRel, Ordering::Relaxed, |curr| {
            Some(curr.saturating_add(value))
        });
    }

    fn reset(&self) {
        self.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::{CounterFn, CounterHandle, FloatCounterHandle, HandleId};
    use std::sync::{atomic::AtomicI64, atomic::Ordering, Arc};

    #[test]
    fn noop_handles_share_the_zero_id() {
        assert_eq!(CounterHandle::noop().id(), HandleId(0));
        assert_eq!(FloatCounterHandle::noop().id(), HandleId(0));
        CounterHandle::noop().increment(42);
        CounterHandle::noop().reset();
    }

    #[test]
    fn live_handles_get_distinct_ids() {
        let a = CounterHandle::from_arc(Arc::new(AtomicI64::new(0)));
        let b = CounterHandle::from_arc(Arc::new(AtomicI64::new(0)));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn handles_delegate_to_the_shared_handler() {
        let state = Arc::new(AtomicI64::new(0));
        let handle = CounterHandle::from_arc(state.clone());

        handle.increment(5);
        handle.increment(2);
        assert_eq!(state.load(Ordering::Acquire), 7);

        handle.reset();
        assert_eq!(state.load(Ordering::Acquire), 0);
    }

    #[test]
    fn atomic_counter_saturates() {
        let state = AtomicI64::new(i64::MAX - 1);
        state.increment(10);
        assert_eq!(state.load(Ordering::Acquire), i64::MAX);
    }
}
