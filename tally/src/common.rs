use std::borrow::Cow;

/// An allocation-optimized string.
///
/// Metric names and dimension strings are frequently static, so `SharedString`
/// lets callers provide either a `&'static str` borrow or an owned `String`
/// without forcing an allocation in the static case.
pub type SharedString = Cow<'static, str>;

/// A unit of time, used as a display hint for timers.
///
/// The unit carries its scale relative to nanoseconds so that backends can
/// render a timer's recorded values at a more convenient magnitude.  It is
/// purely presentational: the values handed to a timer handler are always
/// nanoseconds, regardless of any preferred display unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// Nanoseconds.
    Nanoseconds,
    /// Microseconds.
    Microseconds,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// Gets the number of nanoseconds in one of this unit.
    pub fn scale_from_nanos(&self) -> u64 {
        match self {
            TimeUnit::Nanoseconds => 1,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Minutes => 60 * 1_000_000_000,
            TimeUnit::Hours => 3_600 * 1_000_000_000,
            TimeUnit::Days => 86_400 * 1_000_000_000,
        }
    }

    /// Gets the string form of this `TimeUnit`.
    pub fn as_str(&self) -> &str {
        match self {
            TimeUnit::Nanoseconds => "nanoseconds",
            TimeUnit::Microseconds => "microseconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }

    /// Gets the canonical display label for this unit.
    ///
    /// For example, the canonical label for `Seconds` is `s`, while for
    /// `Nanoseconds`, it is `ns`.
    pub fn as_canonical_label(&self) -> &str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "μs",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

/// An object which can be converted into an `i64` representation.
///
/// This trait provides the mechanism by which callers can pass integers of any
/// width or signedness to counters and timers.  Conversions saturate: a value
/// outside the range of `i64` becomes `i64::MAX` (or `i64::MIN`), never
/// wrapping.
pub trait IntoI64 {
    /// Converts this object to its `i64` representation.
    fn into_i64(self) -> i64;
}

macro_rules! into_i64_signed {
    ($($ty:ty),*) => {
        $(
            impl IntoI64 for $ty {
                fn into_i64(self) -> i64 {
                    self as i64
                }
            }
        )*
    };
}

macro_rules! into_i64_unsigned {
    ($($ty:ty),*) => {
        $(
            impl IntoI64 for $ty {
                fn into_i64(self) -> i64 {
                    i64::try_from(self).unwrap_or(i64::MAX)
                }
            }
        )*
    };
}

into_i64_signed!(i8, i16, i32, i64, isize);
into_i64_unsigned!(u8, u16, u32, u64, usize);

/// An object which can be converted into an `f64` representation.
///
/// This trait provides the mechanism by which callers can pass values with a
/// natural floating-point representation to float counters and meters.
pub trait IntoF64 {
    /// Converts this object to its `f64` representation.
    fn into_f64(self) -> f64;
}

impl IntoF64 for f64 {
    fn into_f64(self) -> f64 {
        self
    }
}

impl IntoF64 for f32 {
    fn into_f64(self) -> f64 {
        f64::from(self)
    }
}

/// An observed value, preserving whether it was integral or floating-point.
///
/// Recorders and meters accept both representations, and backends may store
/// them differently, so the distinction is kept all the way down to the
/// handler instead of eagerly widening everything to `f64`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Observation {
    /// A signed integer observation.
    Int(i64),
    /// A floating-point observation.
    Float(f64),
}

/// An object which can be converted into an [`Observation`].
///
/// Integer conversions saturate at the bounds of `i64`, matching [`IntoI64`].
pub trait IntoObservation {
    /// Converts this object into an [`Observation`].
    fn into_observation(self) -> Observation;
}

macro_rules! into_observation_int {
    ($($ty:ty),*) => {
        $(
            impl IntoObservation for $ty {
                fn into_observation(self) -> Observation {
                    Observation::Int(self.into_i64())
                }
            }
        )*
    };
}

into_observation_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl IntoObservation for f64 {
    fn into_observation(self) -> Observation {
        Observation::Float(self)
    }
}

impl IntoObservation for f32 {
    fn into_observation(self) -> Observation {
        Observation::Float(f64::from(self))
    }
}

#[cfg(test)]
mod tests {
    use super::{IntoI64, IntoObservation, Observation, TimeUnit};

    #[test]
    fn saturating_integer_conversions() {
        assert_eq!((-3i8).into_i64(), -3);
        assert_eq!(42u32.into_i64(), 42);
        assert_eq!(u64::MAX.into_i64(), i64::MAX);
        assert_eq!((i64::MAX as u64 + 1).into_i64(), i64::MAX);
        assert_eq!(i64::MIN.into_i64(), i64::MIN);
    }

    #[test]
    fn observations_keep_their_representation() {
        assert_eq!(7u16.into_observation(), Observation::Int(7));
        assert_eq!(u64::MAX.into_observation(), Observation::Int(i64::MAX));
        assert_eq!(1.5f64.into_observation(), Observation::Float(1.5));
        assert_eq!(2.0f32.into_observation(), Observation::Float(2.0));
    }

    #[test]
    fn time_unit_scales() {
        assert_eq!(TimeUnit::Nanoseconds.scale_from_nanos(), 1);
        assert_eq!(TimeUnit::Seconds.scale_from_nanos(), 1_000_000_000);
        assert_eq!(TimeUnit::Days.scale_from_nanos(), 86_400_000_000_000);
        assert_eq!(TimeUnit::Milliseconds.as_canonical_label(), "ms");
        assert_eq!(TimeUnit::Minutes.as_str(), "minutes");
    }
}
