use parking_lot::Mutex;

use crate::{CounterHandle, FloatCounterFn, MeterFn, RecorderHandle};

/// Extracts the unbiased binary exponent of a double-precision value.
///
/// Only the exponent bits are inspected: the boundary for "too large to
/// split" below is deliberately a bit-exponent test, so that 2⁶³ itself is
/// clamped while the largest double below it still splits normally.
fn exponent(value: f64) -> i32 {
    ((value.to_bits() >> 52) & 0x7ff) as i32 - 1023
}

/// Whether an amount is legal for an increment/decrement-style operation.
///
/// NaN, infinite, and non-positive amounts (including exactly zero) are
/// dropped without error: instrumentation must never be fatal to the
/// instrumented application.
fn is_legal_amount(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// A floating-point counter built on top of an integer counter handler.
///
/// The adapter accumulates the fractional parts of incoming increments and
/// forwards an integer increment to the wrapped counter whenever the
/// accumulated remainder crosses a whole-number boundary, so a sequence of
/// fractional increments summing to an integer produces exactly that integer
/// on the underlying counter.  The remainder always stays in `[0, 1)`.
///
/// This is the default floating-point counter used for backends that only
/// implement the integer counter kind.
pub struct AccumulatingFloatCounter {
    inner: CounterHandle,
    fraction: Mutex<f64>,
}

impl AccumulatingFloatCounter {
    /// Creates an `AccumulatingFloatCounter` wrapping the given counter.
    pub fn new(inner: CounterHandle) -> Self {
        Self { inner, fraction: Mutex::new(0.0) }
    }

    /// The wrapped counter handle.
    pub fn counter_handle(&self) -> &CounterHandle {
        &self.inner
    }
}

impl FloatCounterFn for AccumulatingFloatCounter {
    fn increment(&self, value: f64) {
        if !is_legal_amount(value) {
            return;
        }

        // Values at or beyond 2^63 cannot be split into an integer and a
        // fraction that fit the underlying representation; clamp to a single
        // saturated increment.
        if exponent(value) >= 63 {
            self.inner.increment(i64::MAX);
            return;
        }

        let mut fraction = self.fraction.lock();
        let mut increment = value.trunc() as i64;
        *fraction += value.fract();
        let carry = fraction.trunc();
        if carry != 0.0 {
            increment = increment.saturating_add(carry as i64);
            *fraction = fraction.fract();
        }
        if increment > 0 {
            self.inner.increment(increment);
        }
    }

    fn reset(&self) {
        let mut fraction = self.fraction.lock();
        *fraction = 0.0;
        self.inner.reset();
    }
}

/// A meter built on top of a recorder handler.
///
/// The adapter keeps the meter's running value and reports it to the wrapped
/// recorder after every change.  Updates happen inside a single critical
/// section, so concurrent increments are each observed exactly once, in some
/// order, by the recorder.
///
/// This is the default meter used for backends that only implement the
/// recorder kind.
pub struct AccumulatingMeter {
    inner: RecorderHandle,
    value: Mutex<f64>,
}

impl AccumulatingMeter {
    /// Creates an `AccumulatingMeter` wrapping the given recorder.
    pub fn new(inner: RecorderHandle) -> Self {
        Self { inner, value: Mutex::new(0.0) }
    }

    /// The wrapped recorder handle.
    pub fn recorder_handle(&self) -> &RecorderHandle {
        &self.inner
    }
}

impl MeterFn for AccumulatingMeter {
    fn set(&self, value: f64) {
        let mut current = self.value.lock();
        *current = value;
        self.inner.record(value);
    }

    fn set_int(&self, value: i64) {
        let mut current = self.value.lock();
        *current = value as f64;
        self.inner.record_int(value);
    }

    fn increment(&self, value: f64) {
        if !is_legal_amount(value) {
            return;
        }

        let mut current = self.value.lock();
        *current += value;
        self.inner.record(*current);
    }

    fn decrement(&self, value: f64) {
        if !is_legal_amount(value) {
            return;
        }

        let mut current = self.value.lock();
        *current -= value;
        self.inner.record(*current);
    }
}
