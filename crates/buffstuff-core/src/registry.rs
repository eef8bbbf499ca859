//! Registry of buff kinds.
//!
//! Maps each kind identifier to a factory producing a default instance, so
//! persisted records can be turned back into live buffs.

use std::fmt;

use ahash::AHashMap;
use tracing::debug;

use crate::buff::Buff;
use crate::error::{BuffError, BuffResult};

/// Constructor for an empty instance of one buff kind.
pub type BuffFactory = Box<dyn Fn() -> Box<dyn Buff> + Send + Sync>;

/// Registration window state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryPhase {
    /// `initialize()` has not been called yet.
    #[default]
    Uninitialized,
    /// Kinds may be registered.
    Open,
    /// The manager started running; the kind set is frozen.
    Sealed,
}

/// Kind identifier -> factory.
#[derive(Default)]
pub struct BuffRegistry {
    phase: RegistryPhase,
    factories: AHashMap<String, BuffFactory>,
}

impl fmt::Debug for BuffRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuffRegistry")
            .field("phase", &self.phase)
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl BuffRegistry {
    /// Creates an empty, uninitialized registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> RegistryPhase {
        self.phase
    }

    /// Opens the registration window, clearing any previous registrations.
    pub fn begin_registration(&mut self) {
        self.factories.clear();
        self.phase = RegistryPhase::Open;
    }

    /// Freezes the kind set. No-op unless the window is open.
    pub fn seal(&mut self) {
        if self.phase == RegistryPhase::Open {
            debug!("Sealing buff registry with {} kinds", self.factories.len());
            self.phase = RegistryPhase::Sealed;
        }
    }

    /// Registers a factory for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> BuffResult<()>
    where
        F: Fn() -> Box<dyn Buff> + Send + Sync + 'static,
    {
        let kind = kind.into();
        match self.phase {
            RegistryPhase::Uninitialized => return Err(BuffError::NotInitialized),
            RegistryPhase::Sealed => return Err(BuffError::RegistrationClosed),
            RegistryPhase::Open => {},
        }
        if self.factories.contains_key(&kind) {
            return Err(BuffError::DuplicateKind(kind));
        }

        let sample = factory();
        if sample.kind() != kind {
            return Err(BuffError::KindMismatch {
                registered: kind,
                constructed: sample.kind().to_string(),
            });
        }

        debug!("Registered buff kind {kind}");
        self.factories.insert(kind, Box::new(factory));
        Ok(())
    }

    /// Registers `T` under the kind its default value reports.
    pub fn register_default<T>(&mut self) -> BuffResult<()>
    where
        T: Buff + Default + 'static,
    {
        let kind = T::default().kind().to_string();
        self.register(kind, || Box::new(T::default()) as Box<dyn Buff>)
    }

    /// Builds a fresh default instance of `kind`.
    pub fn construct(&self, kind: &str) -> BuffResult<Box<dyn Buff>> {
        self.factories
            .get(kind)
            .map(|factory| factory())
            .ok_or_else(|| BuffError::UnknownKind(kind.to_string()))
    }

    /// Whether `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no kinds are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
