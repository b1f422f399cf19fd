use std::{error::Error, fmt};

const BOOTSTRAP_ERROR: &str =
    "attempted to bootstrap the metrics system after it was already bootstrapped";

/// The type returned by [`try_bootstrap`](crate::try_bootstrap) when the
/// metrics system has already been bootstrapped.
///
/// Carries the rejected factory, so callers can recover it instead of having
/// it silently dropped.
pub struct BootstrapError<F>(pub F);

impl<F> BootstrapError<F> {
    /// Returns the factory that was attempted to be installed.
    pub fn into_inner(self) -> F {
        self.0
    }
}

impl<F> fmt::Debug for BootstrapError<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapError").finish_non_exhaustive()
    }
}

impl<F> fmt::Display for BootstrapError<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(BOOTSTRAP_ERROR)
    }
}

impl<F> Error for BootstrapError<F> {}
