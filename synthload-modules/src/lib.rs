//! Synthload Module System
//!
//! Synthesizes modules on demand instead of reading them from storage:
//! - Pattern compilation (literal names, globs, regexes, lists)
//! - Ordered, first-match-wins rule dispatch
//! - Generation contexts exposing captures and declarative operations
//! - A loader façade plugged into a runtime's resolution-provider chain

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod loader;
pub mod pattern;
pub mod registry;
pub mod runtime;
pub mod source;

pub use context::{Collection, GenerationContext};
pub use dispatcher::{Dispatcher, Outcome};
pub use error::{LoaderError, Result};
pub use loader::{Loader, LoaderDefinition};
pub use pattern::{Captures, Pattern, PatternSpec};
pub use registry::{Generator, Rule, RuleRegistry};
pub use runtime::{Placeholder, ProviderResult, ResolutionProvider, Runtime};
pub use source::{DirectiveEvaluator, SourceEvaluator};

pub use synthload_core::{Callable, Module, Value};

use serde::{Deserialize, Serialize};

/// Loader and runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Namespace separator token in module names
    pub separator: String,

    /// Storage suffix stripped from raw requests (without the dot)
    pub extension: String,

    /// Whether a module may be required again while it is being generated
    pub allow_circular: bool,

    /// Maximum nesting of re-entrant resolution
    pub max_depth: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            separator: "::".to_string(),
            extension: "pm".to_string(),
            allow_circular: false,
            max_depth: 64,
        }
    }
}

impl LoaderConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
