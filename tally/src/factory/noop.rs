use std::sync::Arc;

use once_cell::sync::Lazy;

use super::Factory;
use crate::{CounterHandle, FloatCounterHandle, Key, MeterHandle, RecorderHandle, TimerHandle};

static INSTANCE: Lazy<Arc<NoopFactory>> = Lazy::new(|| Arc::new(NoopFactory));

/// A no-op factory.
///
/// Used as the registry's factory before the metrics system is bootstrapped,
/// and as a safe sentinel wherever a factory is required but no backend
/// should be involved.  Every handle it creates does nothing, and destroying
/// them does nothing.
pub struct NoopFactory;

impl NoopFactory {
    /// The shared `NoopFactory` instance.
    pub fn shared() -> Arc<dyn Factory> {
        let instance: Arc<NoopFactory> = INSTANCE.clone();
        instance
    }
}

impl Factory for NoopFactory {
    fn make_counter(&self, _key: &Key) -> CounterHandle {
        CounterHandle::noop()
    }

    fn make_float_counter(&self, _key: &Key) -> FloatCounterHandle {
        FloatCounterHandle::noop()
    }

    fn make_recorder(&self, _key: &Key, _aggregate: bool) -> RecorderHandle {
        RecorderHandle::noop()
    }

    fn make_meter(&self, _key: &Key) -> MeterHandle {
        MeterHandle::noop()
    }

    fn make_timer(&self, _key: &Key) -> TimerHandle {
        TimerHandle::noop()
    }

    fn destroy_counter(&self, _handle: CounterHandle) {}
    fn destroy_float_counter(&self, _handle: FloatCounterHandle) {}
    fn destroy_recorder(&self, _handle: RecorderHandle) {}
    fn destroy_meter(&self, _handle: MeterHandle) {}
    fn destroy_timer(&self, _handle: TimerHandle) {}
}
