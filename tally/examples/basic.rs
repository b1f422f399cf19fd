//! This example is part unit test and part demonstration.
//!
//! We bootstrap a backend that just prints every handler operation it sees,
//! then walk through each of the metric types and their update operations.
use std::{sync::Arc, time::Duration};

use tally::{
    Counter, CounterFn, Factory, FloatCounter, Gauge, Key, Label, Meter, Recorder, RecorderFn,
    RecorderHandle, TimeUnit, Timer, TimerFn,
};
use tally::{CounterHandle, TimerHandle};

struct PrintHandle(Key);

impl CounterFn for PrintHandle {
    fn increment(&self, value: i64) {
        println!("counter increment for '{}': {}", self.0, value);
    }

    fn reset(&self) {
        println!("counter reset for '{}'", self.0);
    }
}

impl RecorderFn for PrintHandle {
    fn record(&self, value: f64) {
        println!("recorder record for '{}': {}", self.0, value);
    }

    fn record_int(&self, value: i64) {
        println!("recorder record for '{}': {}", self.0, value);
    }
}

impl TimerFn for PrintHandle {
    fn record_nanos(&self, value: i64) {
        println!("timer record for '{}': {}ns", self.0, value);
    }

    fn prefer_display_unit(&self, unit: TimeUnit) {
        println!("timer display unit for '{}': {}", self.0, unit.as_str());
    }
}

#[derive(Default)]
struct PrintFactory;

impl Factory for PrintFactory {
    fn make_counter(&self, key: &Key) -> CounterHandle {
        CounterHandle::from_arc(Arc::new(PrintHandle(key.clone())))
    }

    fn make_recorder(&self, key: &Key, aggregate: bool) -> RecorderHandle {
        println!("(recorder) created key {} with aggregate {}", key, aggregate);
        RecorderHandle::from_arc(Arc::new(PrintHandle(key.clone())))
    }

    fn make_timer(&self, key: &Key) -> TimerHandle {
        TimerHandle::from_arc(Arc::new(PrintHandle(key.clone())))
    }

    fn destroy_counter(&self, handle: CounterHandle) {
        println!("counter destroyed: {:?}", handle.id());
    }

    fn destroy_recorder(&self, handle: RecorderHandle) {
        println!("recorder destroyed: {:?}", handle.id());
    }

    fn destroy_timer(&self, handle: TimerHandle) {
        println!("timer destroyed: {:?}", handle.id());
    }
}

fn main() {
    tally::bootstrap(PrintFactory);

    let server_name = "web03".to_string();

    let requests = Counter::new("requests_processed");
    requests.increment(1);
    requests.increment(64u8);

    let dimensioned = Counter::new(("requests_processed", &[("request_type", "admin")]));
    dimensioned.increment(1);
    let owned_dims =
        Counter::new(("requests_processed", vec![Label::new("server", server_name)]));
    owned_dims.increment(1);

    // Floating-point increments accumulate into the integer counter above.
    let work = FloatCounter::new("work_done");
    work.increment(0.5);
    work.increment(2.75);
    work.increment(0.75);

    let connections = Gauge::new("connection_count");
    connections.record(300);
    connections.record(287.5);

    let in_flight = Meter::new("requests_in_flight");
    in_flight.set(10);
    in_flight.increment(2.0);
    in_flight.decrement(1.0);

    let sizes = Recorder::new("payload_size");
    sizes.record(512);
    sizes.record(0.57721);

    let latency = Timer::with_display_unit("svc.execution_time", TimeUnit::Milliseconds);
    latency.record_millis(70);
    latency.record(Duration::from_micros(3_500));

    requests.destroy();
    latency.destroy();
}
