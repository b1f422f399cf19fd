use std::sync::Arc;

use parking_lot::RwLock;

use super::{noop::NoopFactory, BootstrapError, Factory};

struct State {
    factory: Arc<dyn Factory>,
    initialized: bool,
}

/// The process-wide factory registry.
///
/// Two states: unbootstrapped (holding the shared no-op factory) and
/// bootstrapped (holding a user factory).  The transition may happen at most
/// once through [`install`](GlobalFactory::install); the test-only
/// [`replace`](GlobalFactory::replace) path swaps the factory without
/// consulting or touching the once-only flag.
///
/// Reads vastly outnumber writes (every metric construction reads, only
/// bootstrap writes), so the state sits behind a reader/writer lock and reads
/// only ever take the shared side.
pub(crate) struct GlobalFactory {
    state: RwLock<State>,
}

impl GlobalFactory {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(State { factory: NoopFactory::shared(), initialized: false }),
        }
    }

    pub(crate) fn install<F>(&self, factory: F) -> Result<(), BootstrapError<F>>
    where
        F: Factory + 'static,
    {
        let mut state = self.state.write();
        if state.initialized {
            return Err(BootstrapError(factory));
        }
        state.factory = Arc::new(factory);
        state.initialized = true;
        Ok(())
    }

    pub(crate) fn replace<F>(&self, factory: F)
    where
        F: Factory + 'static,
    {
        self.state.write().factory = Arc::new(factory);
    }

    pub(crate) fn current(&self) -> Arc<dyn Factory> {
        self.state.read().factory.clone()
    }
}
