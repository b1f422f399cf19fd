//! Fans out metrics to multiple backends.
use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use tally::{
    CounterFn, CounterHandle, Factory, FloatCounterFn, FloatCounterHandle, HandleId, Key, MeterFn,
    MeterHandle, RecorderFn, RecorderHandle, TimeUnit, TimerFn, TimerHandle,
};

struct FanoutCounter {
    handles: Vec<CounterHandle>,
}

impl CounterFn for FanoutCounter {
    fn increment(&self, value: i64) {
        for handle in &self.handles {
            handle.increment(value);
        }
    }

    fn reset(&self) {
        for handle in &self.handles {
            handle.reset();
        }
    }
}

struct FanoutFloatCounter {
    handles: Vec<FloatCounterHandle>,
}

impl FloatCounterFn for FanoutFloatCounter {
    fn increment(&self, value: f64) {
        for handle in &self.handles {
            handle.increment(value);
        }
    }

    fn reset(&self) {
        for handle in &self.handles {
            handle.reset();
        }
    }
}

struct FanoutMeter {
    handles: Vec<MeterHandle>,
}

impl MeterFn for FanoutMeter {
    fn set(&self, value: f64) {
        for handle in &self.handles {
            handle.set(value);
        }
    }

    fn set_int(&self, value: i64) {
        for handle in &self.handles {
            handle.set_int(value);
        }
    }

    fn increment(&self, value: f64) {
        for handle in &self.handles {
            handle.increment(value);
        }
    }

    fn decrement(&self, value: f64) {
        for handle in &self.handles {
            handle.decrement(value);
        }
    }
}

struct FanoutRecorder {
    handles: Vec<RecorderHandle>,
}

impl RecorderFn for FanoutRecorder {
    fn record(&self, value: f64) {
        for handle in &self.handles {
            handle.record(value);
        }
    }

    fn record_int(&self, value: i64) {
        for handle in &self.handles {
            handle.record_int(value);
        }
    }
}

struct FanoutTimer {
    handles: Vec<TimerHandle>,
}

impl TimerFn for FanoutTimer {
    fn record_nanos(&self, value: i64) {
        for handle in &self.handles {
            handle.record_nanos(value);
        }
    }

    fn prefer_display_unit(&self, unit: TimeUnit) {
        for handle in &self.handles {
            handle.prefer_display_unit(unit);
        }
    }
}

#[derive(Default)]
struct Subhandles {
    counters: HashMap<HandleId, Vec<CounterHandle>>,
    float_counters: HashMap<HandleId, Vec<FloatCounterHandle>>,
    recorders: HashMap<HandleId, Vec<RecorderHandle>>,
    meters: HashMap<HandleId, Vec<MeterHandle>>,
    timers: HashMap<HandleId, Vec<TimerHandle>>,
}

/// Fans out metrics to multiple backends.
///
/// Every `make_*` creates one handler per wrapped backend, in list order, and
/// returns a composite handle whose updates reach all of them; `destroy_*`
/// fans the destruction out the same way, handing each backend the
/// sub-handle it created.  Sub-handle bookkeeping is keyed by the composite
/// handle's id.
///
/// A fanout over a single backend elides the composite wrapper entirely, and
/// one over no backends hands out no-op handles.
pub struct Fanout {
    factories: Vec<Arc<dyn Factory>>,
    subhandles: Mutex<Subhandles>,
}

impl Fanout {
    fn fan_make<H>(&self, make: impl Fn(&Arc<dyn Factory>) -> H) -> Vec<H> {
        self.factories.iter().map(make).collect()
    }
}

impl Factory for Fanout {
    fn make_counter(&self, key: &Key) -> CounterHandle {
        match self.factories.as_slice() {
            [] => CounterHandle::noop(),
            [only] => only.make_counter(key),
            _ => {
                let handles = self.fan_make(|factory| factory.make_counter(key));
                let handle =
                    CounterHandle::from_arc(Arc::new(FanoutCounter { handles: handles.clone() }));
                self.subhandles.lock().counters.insert(handle.id(), handles);
                handle
            }
        }
    }

    fn make_float_counter(&self, key: &Key) -> FloatCounterHandle {
        match self.factories.as_slice() {
            [] => FloatCounterHandle::noop(),
            [only] => only.make_float_counter(key),
            _ => {
                let handles = self.fan_make(|factory| factory.make_float_counter(key));
                let handle = FloatCounterHandle::from_arc(Arc::new(FanoutFloatCounter {
                    handles: handles.clone(),
                }));
                self.subhandles.lock().float_counters.insert(handle.id(), handles);
                handle
            }
        }
    }

    fn make_recorder(&self, key: &Key, aggregate: bool) -> RecorderHandle {
        match self.factories.as_slice() {
            [] => RecorderHandle::noop(),
            [only] => only.make_recorder(key, aggregate),
            _ => {
                let handles = self.fan_make(|factory| factory.make_recorder(key, aggregate));
                let handle =
                    RecorderHandle::from_arc(Arc::new(FanoutRecorder { handles: handles.clone() }));
                self.subhandles.lock().recorders.insert(handle.id(), handles);
                handle
            }
        }
    }

    fn make_meter(&self, key: &Key) -> MeterHandle {
        match self.factories.as_slice() {
            [] => MeterHandle::noop(),
            [only] => only.make_meter(key),
            _ => {
                let handles = self.fan_make(|factory| factory.make_meter(key));
                let handle =
                    MeterHandle::from_arc(Arc::new(FanoutMeter { handles: handles.clone() }));
                self.subhandles.lock().meters.insert(handle.id(), handles);
                handle
            }
        }
    }

    fn make_timer(&self, key: &Key) -> TimerHandle {
        match self.factories.as_slice() {
            [] => TimerHandle::noop(),
            [only] => only.make_timer(key),
            _ => {
                let handles = self.fan_make(|factory| factory.make_timer(key));
                let handle =
                    TimerHandle::from_arc(Arc::new(FanoutTimer { handles: handles.clone() }));
                self.subhandles.lock().timers.insert(handle.id(), handles);
                handle
            }
        }
    }

    fn destroy_counter(&self, handle: CounterHandle) {
        match self.factories.as_slice() {
            [] => {}
            [only] => only.destroy_counter(handle),
            factories => {
                let handles = self.subhandles.lock().counters.remove(&handle.id());
                if let Some(handles) = handles {
                    for (factory, sub) in factories.iter().zip(handles) {
                        factory.destroy_counter(sub);
                    }
                }
            }
        }
    }

    fn destroy_float_counter(&self, handle: FloatCounterHandle) {
        match self.factories.as_slice() {
            [] => {}
            [only] => only.destroy_float_counter(handle),
            factories => {
                let handles = self.subhandles.lock().float_counters.remove(&handle.id());
                if let Some(handles) = handles {
                    for (factory, sub) in factories.iter().zip(handles) {
                        factory.destroy_float_counter(sub);
                    }
                }
            }
        }
    }

    fn destroy_recorder(&self, handle: RecorderHandle) {
        match self.factories.as_slice() {
            [] => {}
            [only] => only.destroy_recorder(handle),
            factories => {
                let handles = self.subhandles.lock().recorders.remove(&handle.id());
                if let Some(handles) = handles {
                    for (factory, sub) in factories.iter().zip(handles) {
                        factory.destroy_recorder(sub);
                    }
                }
            }
        }
    }

    fn destroy_meter(&self, handle: MeterHandle) {
        match self.factories.as_slice() {
            [] => {}
            [only] => only.destroy_meter(handle),
            factories => {
                let handles = self.subhandles.lock().meters.remove(&handle.id());
                if let Some(handles) = handles {
                    for (factory, sub) in factories.iter().zip(handles) {
                        factory.destroy_meter(sub);
                    }
                }
            }
        }
    }

    fn destroy_timer(&self, handle: TimerHandle) {
        match self.factories.as_slice() {
            [] => {}
            [only] => only.destroy_timer(handle),
            factories => {
                let handles = self.subhandles.lock().timers.remove(&handle.id());
                if let Some(handles) = handles {
                    for (factory, sub) in factories.iter().zip(handles) {
                        factory.destroy_timer(sub);
                    }
                }
            }
        }
    }
}

/// A builder for fanning out metrics to multiple backends.
///
/// More information on the behavior of the composite can be found in
/// [`Fanout`].
#[derive(Default)]
pub struct FanoutBuilder {
    factories: Vec<Arc<dyn Factory>>,
}

impl FanoutBuilder {
    /// Adds a backend to the fanout list.
    pub fn add_factory<F>(mut self, factory: F) -> FanoutBuilder
    where
        F: Factory + 'static,
    {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Builds the `Fanout`.
    pub fn build(self) -> Fanout {
        Fanout { factories: self.factories, subhandles: Mutex::new(Subhandles::default()) }
    }
}

#[cfg(test)]
mod tests {
    use super::FanoutBuilder;
    use crate::debugging::CapturingFactory;
    use tally::{Factory, Key, TimeUnit};

    #[test]
    fn updates_reach_every_backend_exactly_once() {
        let first = CapturingFactory::new();
        let second = CapturingFactory::new();
        let fanout = FanoutBuilder::default()
            .add_factory(first.clone())
            .add_factory(second.clone())
            .build();

        let key = Key::from_name("reqs");
        let counter = fanout.make_counter(&key);
        counter.increment(47);

        for backend in [&first, &second] {
            let captured = backend.counter("reqs").unwrap();
            assert_eq!(captured.values(), vec![47]);
        }

        let key = Key::from_name("latency");
        let timer = fanout.make_timer(&key);
        timer.record_nanos(512);
        timer.prefer_display_unit(TimeUnit::Microseconds);

        for backend in [&first, &second] {
            let captured = backend.timer("latency").unwrap();
            assert_eq!(captured.values(), vec![512]);
            assert_eq!(captured.preferred_display_unit(), Some(TimeUnit::Microseconds));
        }
    }

    #[test]
    fn derived_kinds_fan_out_through_each_backend() {
        let first = CapturingFactory::new();
        let second = CapturingFactory::new();
        let fanout = FanoutBuilder::default()
            .add_factory(first.clone())
            .add_factory(second.clone())
            .build();

        let key = Key::from_name("work");
        let float_counter = fanout.make_float_counter(&key);
        float_counter.increment(0.75);
        float_counter.increment(1.5);

        // Each backend runs its own accumulating adapter over its own
        // captured counter.
        for backend in [&first, &second] {
            assert_eq!(backend.counter("work").unwrap().values(), vec![2]);
        }

        let key = Key::from_name("in_flight");
        let meter = fanout.make_meter(&key);
        meter.set(3.0);
        meter.increment(1.0);

        for backend in [&first, &second] {
            assert_eq!(backend.recorder("in_flight").unwrap().values(), vec![3.0, 4.0]);
        }
    }

    #[test]
    fn destroy_fans_out_to_every_backend() {
        let first = CapturingFactory::new();
        let second = CapturingFactory::new();
        let fanout = FanoutBuilder::default()
            .add_factory(first.clone())
            .add_factory(second.clone())
            .build();

        let key = Key::from_name("reqs");
        let counter = fanout.make_counter(&key);
        counter.increment(1);
        fanout.destroy_counter(counter);

        assert!(first.counter("reqs").is_err());
        assert!(second.counter("reqs").is_err());
    }

    #[test]
    fn single_backend_fanouts_pass_straight_through() {
        let backend = CapturingFactory::new();
        let fanout = FanoutBuilder::default().add_factory(backend.clone()).build();

        let key = Key::from_name("reqs");
        let counter = fanout.make_counter(&key);
        counter.increment(9);

        // The handle is the backend's own, not a composite.
        let captured = backend.counter("reqs").unwrap();
        assert_eq!(captured.values(), vec![9]);

        fanout.destroy_counter(counter);
        assert!(backend.counter("reqs").is_err());
    }

    #[test]
    fn empty_fanouts_hand_out_noop_handles() {
        let fanout = FanoutBuilder::default().build();

        let key = Key::from_name("reqs");
        let counter = fanout.make_counter(&key);
        counter.increment(1);
        fanout.destroy_counter(counter);

        let meter = fanout.make_meter(&key);
        meter.set(1.0);
        fanout.destroy_meter(meter);
    }
}
