//! Loader definitions and the resolution-provider façade

use crate::context::GenerationContext;
use crate::dispatcher::{Dispatcher, Outcome};
use crate::error::{LoaderError, Result};
use crate::pattern::PatternSpec;
use crate::registry::RuleRegistry;
use crate::runtime::{Placeholder, ProviderResult, ResolutionProvider, Runtime};
use crate::LoaderConfig;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A named set of rules, built during a declaration phase.
///
/// Once [`sealed`](LoaderDefinition::seal) the definition is an immutable
/// snapshot that any number of [`Loader`] instances (on any thread) share.
#[derive(Debug)]
pub struct LoaderDefinition {
    name: String,
    config: LoaderConfig,
    registry: RuleRegistry,
}

impl LoaderDefinition {
    /// Start declaring a loader with the default configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, LoaderConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: LoaderConfig) -> Self {
        let registry = RuleRegistry::new(config.separator.clone());
        Self {
            name: name.into(),
            config,
            registry,
        }
    }

    /// Declare a rule; list patterns expand to one rule per element
    pub fn rule<P, G>(&mut self, pattern: P, generator: G) -> Result<&mut Self>
    where
        P: Into<PatternSpec>,
        G: Fn(&mut GenerationContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.registry.register(pattern, generator)?;
        Ok(self)
    }

    /// End the declaration phase
    pub fn seal(self) -> Arc<LoaderDefinition> {
        debug!("Sealed loader {} with {} rule(s)", self.name, self.registry.len());
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }
}

/// One active instance of a loader definition.
///
/// Owns no rules itself; it is what the runtime consults per lookup.
#[derive(Debug, Clone)]
pub struct Loader {
    definition: Arc<LoaderDefinition>,
}

impl Loader {
    /// An instance that is not yet registered with any runtime
    pub fn new(definition: Arc<LoaderDefinition>) -> Self {
        Self { definition }
    }

    /// Create an instance and append it to the runtime's provider chain
    pub fn create(definition: Arc<LoaderDefinition>, runtime: &mut Runtime) -> Arc<Loader> {
        let loader = Arc::new(Self::new(definition));
        runtime.add_provider(loader.clone());
        loader
    }

    pub fn definition(&self) -> &Arc<LoaderDefinition> {
        &self.definition
    }

    /// Turn a raw request into a logical module name.
    ///
    /// `App/Foo/Bar.pm` and `App::Foo::Bar` both become `App::Foo::Bar`.
    pub fn canonicalize(&self, raw_request: &str) -> Result<String> {
        let config = &self.definition.config;
        let suffix = format!(".{}", config.extension);
        let stem = if config.extension.is_empty() {
            raw_request
        } else {
            raw_request.strip_suffix(suffix.as_str()).unwrap_or(raw_request)
        };

        let segments: Vec<&str> = stem
            .split(|c: char| c == '/' || c == '\\')
            .filter(|s| !s.is_empty())
            .collect();
        let invalid = segments.is_empty()
            || segments.iter().any(|s| *s == "." || *s == "..")
            || stem.contains('\0');
        if invalid {
            warn!("Rejected module request: {:?}", raw_request);
            return Err(LoaderError::InvalidModuleName {
                name: raw_request.to_string(),
            });
        }

        Ok(segments.join(config.separator.as_str()))
    }

    /// Dispatch a logical module name against this loader's rules
    pub fn resolve(&self, name: &str, runtime: &mut Runtime) -> Result<Outcome> {
        Dispatcher::new(&self.definition.registry).resolve(name, runtime)
    }
}

impl ResolutionProvider for Loader {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn resolve_hook(&self, raw_request: &str, runtime: &mut Runtime) -> Result<ProviderResult> {
        let name = self.canonicalize(raw_request)?;
        trace!("{} resolving {} as {}", self.definition.name, raw_request, name);

        match self.resolve(&name, runtime)? {
            Outcome::Generated(module) => Ok(ProviderResult::Handled(Placeholder::new(module))),
            Outcome::NotFound => Ok(ProviderResult::Declined),
        }
    }
}
