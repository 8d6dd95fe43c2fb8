//! Module synthesis error types

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for module synthesis results
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while declaring rules or generating modules.
///
/// "No rule matched" is not an error; see [`crate::Outcome::NotFound`].
#[derive(Error, Debug)]
pub enum LoaderError {
    /// A caller-supplied regular expression was rejected
    #[error("Invalid pattern {pattern:?}: {source}")]
    PatternCompile {
        /// The pattern text as supplied
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A declared dependency could not be located or generated
    #[error("Module {module} failed to load dependency {dependency}")]
    DependencyResolution {
        /// Module whose generator declared the dependency
        module: String,
        /// The dependency that failed
        dependency: String,
        #[source]
        source: Box<LoaderError>,
    },

    /// A generator or declarative operation failed
    #[error("Generation of {module} failed: {message}")]
    Generation {
        /// Module being generated
        module: String,
        /// What went wrong
        message: String,
    },

    /// A module was required again while it was still being generated
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency {
        /// The chain of in-flight modules
        cycle: String,
    },

    /// No resolution provider handled the module
    #[error("Module not found: {name}")]
    ModuleNotFound {
        /// The requested module name
        name: String,
    },

    /// The request could not be turned into a module name
    #[error("Invalid module name: {name:?}")]
    InvalidModuleName {
        /// The rejected request
        name: String,
    },

    /// Injected source text failed to evaluate
    #[error("Source evaluation failed in {module} at line {line}: {message}")]
    SourceEvaluation {
        /// Module the source was injected into
        module: String,
        /// 1-based line of the offending directive
        line: usize,
        /// Error message
        message: String,
    },

    /// Source injection was requested but no evaluator is installed
    #[error("Source injection is not enabled (module {module})")]
    UnsupportedSource {
        /// Module the source was meant for
        module: String,
    },

    /// I/O error while reading injected source
    #[error("IO error reading {path}: {error}")]
    Io {
        /// File that failed to read
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Configuration could not be parsed
    #[error("Invalid loader configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Error raised by the module shape layer
    #[error("Core error: {0}")]
    Core(#[from] synthload_core::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoaderError {
    /// Shorthand for a [`LoaderError::Generation`] error
    pub fn generation(module: impl Into<String>, message: impl Into<String>) -> Self {
        LoaderError::Generation {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Whether this error, or any error it wraps, is a circular dependency
    pub fn is_circular(&self) -> bool {
        match self {
            LoaderError::CircularDependency { .. } => true,
            LoaderError::DependencyResolution { source, .. } => source.is_circular(),
            _ => false,
        }
    }
}
