use crate::error::{PipelineError, Result};
use crate::stage::Transform;
use crate::transforms::{Expander, Flipper, Logger, Rotator, Typewriter, Uppercaser};
use std::collections::BTreeMap;
use std::time::Duration;

type Factory = Box<dyn Fn() -> Box<dyn Transform> + Send + Sync>;

/// Resolves stage names to freshly constructed transforms
///
/// Every call to [`create`](Self::create) builds a new, independently owned transform, so
/// the same stage type can appear several times in one pipeline.
pub struct StageRegistry {
    factories: BTreeMap<String, Factory>,
}

impl StageRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A registry that knows every built-in transform
    pub fn with_builtins() -> Self {
        Self::with_typewriter_delay(crate::transforms::TYPEWRITER_DELAY)
    }

    /// Built-ins, with a custom per-character delay for `typewriter`
    pub fn with_typewriter_delay(delay: Duration) -> Self {
        let mut registry = Self::new();
        registry.register("logger", || Box::new(Logger::new()));
        registry.register("typewriter", move || Box::new(Typewriter::with_delay(delay)));
        registry.register("uppercaser", || Box::new(Uppercaser));
        registry.register("rotator", || Box::new(Rotator));
        registry.register("flipper", || Box::new(Flipper));
        registry.register("expander", || Box::new(Expander));
        registry
    }

    /// Add or replace a factory
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Transform> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Build a new transform for `name`
    pub fn create(&self, name: &str) -> Result<Box<dyn Transform>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| PipelineError::UnknownStage(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
