//! Host-side module table and resolution-provider chain

use crate::error::{LoaderError, Result};
use crate::source::SourceEvaluator;
use crate::LoaderConfig;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use synthload_core::Module;
use tracing::{debug, trace, warn};

/// Marker returned by a provider that handled a request. The module itself
/// was published as a side effect; the marker only carries an empty body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub module: String,
}

impl Placeholder {
    pub fn new(module: impl Into<String>) -> Self {
        Self { module: module.into() }
    }

    /// Source body the host should evaluate for this module
    pub fn body(&self) -> &'static str {
        ""
    }
}

/// What a provider did with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResult {
    Handled(Placeholder),
    /// Not ours; try the next provider
    Declined,
}

/// Something the runtime consults, in order, for modules it does not have
pub trait ResolutionProvider: Send + Sync {
    /// Name used for logging and removal
    fn name(&self) -> &str;

    /// Handle a raw storage-style request such as `App/Foo.pm`
    fn resolve_hook(&self, raw_request: &str, runtime: &mut Runtime) -> Result<ProviderResult>;
}

/// Module table plus the ordered chain of resolution providers.
///
/// Resolution is synchronous and single-threaded; a provider may re-enter
/// [`Runtime::require`] while handling a request.
pub struct Runtime {
    config: LoaderConfig,
    modules: FxHashMap<String, Arc<Module>>,
    providers: Vec<Arc<dyn ResolutionProvider>>,
    loading: Vec<String>,
    evaluator: Option<Arc<dyn SourceEvaluator>>,
}

impl Runtime {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            modules: FxHashMap::default(),
            providers: Vec::new(),
            loading: Vec::new(),
            evaluator: None,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Append a provider to the end of the chain
    pub fn add_provider(&mut self, provider: Arc<dyn ResolutionProvider>) {
        debug!("Added resolution provider: {}", provider.name());
        self.providers.push(provider);
    }

    /// Remove every provider registered under `name`
    pub fn remove_provider(&mut self, name: &str) -> bool {
        let before = self.providers.len();
        self.providers.retain(|p| p.name() != name);
        before != self.providers.len()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Enable source injection with the given evaluator
    pub fn set_evaluator(&mut self, evaluator: Arc<dyn SourceEvaluator>) {
        self.evaluator = Some(evaluator);
    }

    pub fn evaluator(&self) -> Option<Arc<dyn SourceEvaluator>> {
        self.evaluator.clone()
    }

    /// Publish a module, replacing any previous definition
    pub fn define(&mut self, module: Module) -> Arc<Module> {
        let module = Arc::new(module);
        if self
            .modules
            .insert(module.name().to_string(), module.clone())
            .is_some()
        {
            debug!("Redefined module: {}", module.name());
        }
        module
    }

    pub fn module(&self, name: &str) -> Option<Arc<Module>> {
        self.modules.get(name).cloned()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Names of all defined modules, sorted
    pub fn defined_modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names currently being loaded, outermost first
    pub fn loading(&self) -> &[String] {
        &self.loading
    }

    /// Storage-style request for a module name (`App::Foo` -> `App/Foo.pm`)
    pub fn request_path(&self, name: &str) -> String {
        let path = if self.config.separator.is_empty() {
            name.to_string()
        } else {
            name.split(self.config.separator.as_str()).collect::<Vec<_>>().join("/")
        };
        if self.config.extension.is_empty() {
            path
        } else {
            format!("{}.{}", path, self.config.extension)
        }
    }

    /// Load a module, consulting providers only if it is not yet defined
    pub fn require(&mut self, name: &str) -> Result<Arc<Module>> {
        if !self.is_valid_name(name) {
            warn!("Rejected module name: {:?}", name);
            return Err(LoaderError::InvalidModuleName {
                name: name.to_string(),
            });
        }

        if let Some(module) = self.modules.get(name) {
            trace!("Module already defined: {}", name);
            return Ok(module.clone());
        }

        if self.loading.iter().any(|n| n == name) {
            if self.config.allow_circular {
                debug!("Circular require of {} allowed; returning placeholder", name);
                return Ok(Arc::new(Module::placeholder(name)));
            }
            return Err(LoaderError::CircularDependency {
                cycle: self.cycle_through(name),
            });
        }

        if self.loading.len() >= self.config.max_depth {
            return Err(LoaderError::CircularDependency {
                cycle: format!(
                    "{} (maximum depth {} exceeded)",
                    self.cycle_through(name),
                    self.config.max_depth
                ),
            });
        }

        self.loading.push(name.to_string());
        let result = self.consult_providers(name);
        self.loading.pop();
        result
    }

    /// A name is valid when its request path maps back to the same name:
    /// no path characters and no empty, `.` or `..` segments
    fn is_valid_name(&self, name: &str) -> bool {
        if name.is_empty()
            || name
                .chars()
                .any(|c| c.is_whitespace() || c == '\0' || c == '/' || c == '\\')
        {
            return false;
        }
        let separator = self.config.separator.as_str();
        if separator.is_empty() {
            return name != "." && name != "..";
        }
        name.split(separator)
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
    }

    fn cycle_through(&self, name: &str) -> String {
        let mut chain = self.loading.clone();
        chain.push(name.to_string());
        chain.join(" -> ")
    }

    fn consult_providers(&mut self, name: &str) -> Result<Arc<Module>> {
        let raw = self.request_path(name);
        // Snapshot: providers may re-enter `require` while we iterate
        let providers = self.providers.clone();

        for provider in providers {
            match provider.resolve_hook(&raw, self)? {
                ProviderResult::Handled(_) => {
                    trace!("{} handled {}", provider.name(), raw);
                    let module = match self.modules.get(name) {
                        Some(module) => module.clone(),
                        None => self.define(Module::placeholder(name)),
                    };
                    return Ok(module);
                }
                ProviderResult::Declined => {
                    trace!("{} declined {}", provider.name(), raw);
                }
            }
        }

        Err(LoaderError::ModuleNotFound {
            name: name.to_string(),
        })
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use synthload_core::ModuleBuilder;

    /// Handles every request without defining anything
    struct Permissive {
        calls: AtomicUsize,
    }

    impl ResolutionProvider for Permissive {
        fn name(&self) -> &str {
            "permissive"
        }

        fn resolve_hook(&self, raw_request: &str, _runtime: &mut Runtime) -> Result<ProviderResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderResult::Handled(Placeholder::new(raw_request)))
        }
    }

    struct Declining;

    impl ResolutionProvider for Declining {
        fn name(&self) -> &str {
            "declining"
        }

        fn resolve_hook(&self, _raw_request: &str, _runtime: &mut Runtime) -> Result<ProviderResult> {
            Ok(ProviderResult::Declined)
        }
    }

    /// Requires the module named by its own request again
    struct SelfRequiring;

    impl ResolutionProvider for SelfRequiring {
        fn name(&self) -> &str {
            "self-requiring"
        }

        fn resolve_hook(&self, raw_request: &str, runtime: &mut Runtime) -> Result<ProviderResult> {
            let name = raw_request.trim_end_matches(".pm").replace('/', "::");
            runtime.require(&name)?;
            Ok(ProviderResult::Handled(Placeholder::new(name)))
        }
    }

    #[test]
    fn test_request_path() {
        let runtime = Runtime::default();
        assert_eq!(runtime.request_path("App::Foo::Bar"), "App/Foo/Bar.pm");

        let runtime = Runtime::new(LoaderConfig {
            separator: ".".to_string(),
            extension: String::new(),
            ..Default::default()
        });
        assert_eq!(runtime.request_path("app.foo"), "app/foo");
    }

    #[test]
    fn test_defined_module_short_circuits() {
        let mut runtime = Runtime::default();
        let provider = Arc::new(Permissive { calls: AtomicUsize::new(0) });
        runtime.add_provider(provider.clone());
        runtime.define(ModuleBuilder::new("App::Ready").finish());

        let module = runtime.require("App::Ready").unwrap();
        assert!(!module.is_placeholder());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handled_without_definition_gets_placeholder() {
        let mut runtime = Runtime::default();
        runtime.add_provider(Arc::new(Declining));
        runtime.add_provider(Arc::new(Permissive { calls: AtomicUsize::new(0) }));

        let module = runtime.require("App::Stub").unwrap();
        assert!(module.is_placeholder());
        assert!(runtime.is_defined("App::Stub"));
    }

    #[test]
    fn test_all_declined_is_not_found() {
        let mut runtime = Runtime::default();
        runtime.add_provider(Arc::new(Declining));

        let err = runtime.require("App::Missing").unwrap_err();
        assert!(matches!(err, LoaderError::ModuleNotFound { .. }));
        assert!(runtime.loading().is_empty());
    }

    #[test]
    fn test_circular_require_detected() {
        let mut runtime = Runtime::default();
        runtime.add_provider(Arc::new(SelfRequiring));

        let err = runtime.require("App::Loop").unwrap_err();
        match err {
            LoaderError::CircularDependency { cycle } => assert_eq!(cycle, "App::Loop -> App::Loop"),
            other => panic!("Expected CircularDependency, got {:?}", other),
        }
        assert!(runtime.loading().is_empty());
        assert!(!runtime.is_defined("App::Loop"));
    }

    #[test]
    fn test_circular_require_allowed() {
        let mut runtime = Runtime::new(LoaderConfig {
            allow_circular: true,
            ..Default::default()
        });
        runtime.add_provider(Arc::new(SelfRequiring));

        let module = runtime.require("App::Loop").unwrap();
        assert!(module.is_placeholder());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut runtime = Runtime::default();
        for name in ["", "App Foo", "evil\0module"] {
            assert!(
                matches!(runtime.require(name), Err(LoaderError::InvalidModuleName { .. })),
                "Should reject {:?}",
                name
            );
        }
    }

    #[test]
    fn test_names_that_do_not_round_trip_are_rejected() {
        let mut runtime = Runtime::default();
        let provider = Arc::new(Permissive { calls: AtomicUsize::new(0) });
        runtime.add_provider(provider.clone());

        for name in ["App::", "::App", "App::::Foo", "App/Foo", "App\\Foo", "App::..::Foo"] {
            assert!(
                matches!(runtime.require(name), Err(LoaderError::InvalidModuleName { .. })),
                "Should reject {:?}",
                name
            );
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(runtime.defined_modules().is_empty());

        runtime.require("App::Foo").unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_name_validation_follows_configured_separator() {
        let mut runtime = Runtime::new(LoaderConfig {
            separator: ".".to_string(),
            ..Default::default()
        });
        assert_eq!(runtime.config().separator, ".");
        runtime.add_provider(Arc::new(Permissive { calls: AtomicUsize::new(0) }));

        assert!(runtime.require("app.db").is_ok());
        assert!(matches!(
            runtime.require("app..db"),
            Err(LoaderError::InvalidModuleName { .. })
        ));
        assert!(matches!(
            runtime.require("app.db."),
            Err(LoaderError::InvalidModuleName { .. })
        ));
    }

    #[test]
    fn test_remove_provider() {
        let mut runtime = Runtime::default();
        runtime.add_provider(Arc::new(Declining));
        runtime.add_provider(Arc::new(Permissive { calls: AtomicUsize::new(0) }));
        assert_eq!(runtime.provider_names(), vec!["declining", "permissive"]);

        assert!(runtime.remove_provider("declining"));
        assert!(!runtime.remove_provider("declining"));
        assert_eq!(runtime.provider_names(), vec!["permissive"]);
    }

    #[test]
    fn test_defined_modules_sorted() {
        let mut runtime = Runtime::default();
        runtime.define(ModuleBuilder::new("B").finish());
        runtime.define(ModuleBuilder::new("A").finish());
        assert_eq!(runtime.defined_modules(), vec!["A", "B"]);
    }
}
