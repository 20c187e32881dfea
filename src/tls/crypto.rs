//! Process-wide cryptographic context shared by every listen point.
//!
//! The context is created lazily by the first [`CryptoContext::acquire`] and counted per handle.
//! Only the handle that created it decides whether it is torn down: when that handle was acquired
//! in [`CryptoMode::Owned`], the context goes away together with the last handle, whoever holds
//! it. There is no default mode.

use std::sync::{Arc, Mutex, PoisonError};

use rustls::crypto::{CryptoProvider, aws_lc_rs};
use serde::Deserialize;

/// How a listen point participates in the process-wide crypto context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CryptoMode {
    /// If this handle creates the context, it is torn down once the last handle is released.
    Owned,
    /// A context created by this handle is never torn down, so other listen points in the process
    /// stay unaffected.
    Shared,
}

/// A snapshot of the registry counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextStats {
    /// Whether a provider is currently installed.
    pub initialized: bool,
    /// Live handles.
    pub owners: usize,
    /// How often the provider was created.
    pub initializations: usize,
    /// How often the provider was torn down.
    pub shutdowns: usize,
}

#[derive(Debug)]
struct RegistryState {
    provider: Option<Arc<CryptoProvider>>,
    /// Mode of the handle that created the current provider.
    initializer: Option<CryptoMode>,
    owners: usize,
    initializations: usize,
    shutdowns: usize,
}

/// Reference-counted slot holding the crypto provider.
#[derive(Debug)]
pub(crate) struct ContextRegistry {
    state: Mutex<RegistryState>,
}

static GLOBAL: ContextRegistry = ContextRegistry::new();

impl ContextRegistry {
    pub(crate) const fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                provider: None,
                initializer: None,
                owners: 0,
                initializations: 0,
                shutdowns: 0,
            }),
        }
    }

    pub(crate) fn global() -> &'static Self {
        &GLOBAL
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        // The state is plain counters; a panic while holding the lock cannot leave it torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn acquire(&'static self, mode: CryptoMode) -> CryptoContext {
        let mut state = self.lock();
        let provider = match &state.provider {
            Some(provider) => Arc::clone(provider),
            None => {
                let provider = Arc::new(aws_lc_rs::default_provider());
                state.provider = Some(Arc::clone(&provider));
                state.initializer = Some(mode);
                state.initializations += 1;
                tracing::debug!(initializations = state.initializations, ?mode, "crypto context initialized");
                provider
            }
        };
        state.owners += 1;

        CryptoContext {
            registry: self,
            provider,
            mode,
            released: false,
        }
    }

    fn release(&self) {
        let mut state = self.lock();
        state.owners = state.owners.saturating_sub(1);
        if state.owners == 0 && state.initializer == Some(CryptoMode::Owned) {
            state.provider = None;
            state.initializer = None;
            state.shutdowns += 1;
            tracing::debug!(shutdowns = state.shutdowns, "crypto context shut down");
        }
    }

    pub(crate) fn stats(&self) -> ContextStats {
        let state = self.lock();
        ContextStats {
            initialized: state.provider.is_some(),
            owners: state.owners,
            initializations: state.initializations,
            shutdowns: state.shutdowns,
        }
    }
}

/// A counted handle on the process-wide crypto context.
///
/// Holders keep their own `Arc` to the provider, so a configuration built from this handle stays
/// valid even after the context itself has been shut down.
#[derive(Debug)]
pub struct CryptoContext {
    registry: &'static ContextRegistry,
    provider: Arc<CryptoProvider>,
    mode: CryptoMode,
    released: bool,
}

impl CryptoContext {
    /// Joins the process-wide context, initializing it if this is the first handle.
    #[must_use]
    pub fn acquire(mode: CryptoMode) -> Self {
        GLOBAL.acquire(mode)
    }

    /// The provider every configuration derived from this context is built on.
    #[must_use]
    pub const fn provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    /// The mode this handle was acquired with.
    #[must_use]
    pub const fn mode(&self) -> CryptoMode {
        self.mode
    }

    /// Gives the handle back. The last handle tears the context down if it was created by an
    /// [`CryptoMode::Owned`] handle.
    ///
    /// Calling this more than once has no further effect.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.registry.release();
    }
}

impl Drop for CryptoContext {
    fn drop(&mut self) {
        self.release();
    }
}

/// Counters of the process-wide context.
#[must_use]
pub fn stats() -> ContextStats {
    GLOBAL.stats()
}
