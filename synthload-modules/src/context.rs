//! Request-scoped generation context
//!
//! A [`GenerationContext`] exists for exactly one generator invocation. It
//! carries the target name and captures, stages the module in a detached
//! [`ModuleBuilder`], and holds the runtime so dependencies can be resolved
//! re-entrantly. Nested resolution gets its own context on the stack, so an
//! inner generation can never disturb the outer one's name or captures.

use crate::error::{LoaderError, Result};
use crate::pattern::Captures;
use crate::runtime::Runtime;
use crate::source;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use synthload_core::{Callable, Dependency, Module, ModuleBuilder, Value};
use tracing::{debug, trace};

/// An ordered or keyed collection bound into a module
#[derive(Debug, Clone, PartialEq)]
pub enum Collection {
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl From<Vec<Value>> for Collection {
    fn from(values: Vec<Value>) -> Self {
        Collection::List(values)
    }
}

impl From<BTreeMap<String, Value>> for Collection {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Collection::Map(entries)
    }
}

/// The channel through which a generator shapes its module
pub struct GenerationContext<'a> {
    name: String,
    captures: Captures,
    builder: ModuleBuilder,
    runtime: &'a mut Runtime,
}

impl<'a> GenerationContext<'a> {
    pub(crate) fn new(name: &str, captures: Captures, runtime: &'a mut Runtime) -> Self {
        Self {
            name: name.to_string(),
            captures,
            builder: ModuleBuilder::new(name),
            runtime,
        }
    }

    /// The module being generated
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn captures(&self) -> &Captures {
        &self.captures
    }

    /// Capture `index`, 1-based
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index)
    }

    /// The staged module, as generated so far
    pub fn staged(&self) -> &ModuleBuilder {
        &self.builder
    }

    /// Append supertypes; repeated calls accumulate.
    ///
    /// A supertype that is already declared is skipped, so each appears
    /// once, at the position of its first declaration.
    pub fn declare_supertypes<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builder.add_supertypes(names)?;
        Ok(())
    }

    /// Require another module before this one is finished.
    ///
    /// The dependency is loaded through the runtime right away, which may
    /// recursively generate it. Any failure aborts this generation.
    pub fn declare_dependency(&mut self, name: &str, args: Vec<Value>) -> Result<Arc<Module>> {
        debug!("{} depends on {}", self.name, name);
        let dependency = self.runtime.require(name).map_err(|e| LoaderError::DependencyResolution {
            module: self.name.clone(),
            dependency: name.to_string(),
            source: Box::new(e),
        })?;
        self.builder.add_dependency(Dependency {
            name: name.to_string(),
            args,
        })?;
        Ok(dependency)
    }

    /// Bind a scalar value
    pub fn bind_value(&mut self, name: &str, value: Value) -> Result<()> {
        self.builder.bind_scalar(name, value)?;
        Ok(())
    }

    /// Bind a list or map
    pub fn bind_collection(&mut self, name: &str, collection: impl Into<Collection>) -> Result<()> {
        match collection.into() {
            Collection::List(values) => self.builder.bind_list(name, values)?,
            Collection::Map(entries) => self.builder.bind_map(name, entries)?,
        }
        Ok(())
    }

    /// Bind a callable under `name`
    pub fn bind_callable(&mut self, name: &str, callable: Callable) -> Result<()> {
        self.builder.bind_callable(callable.renamed(name))?;
        Ok(())
    }

    /// Bind a native function with a fixed arity
    pub fn bind_fn<F>(&mut self, name: &str, arity: usize, func: F) -> Result<()>
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.bind_callable(name, Callable::fixed(name, arity, func))
    }

    /// Evaluate source text into this module.
    ///
    /// `$1`, `$2`, … and `$name` are replaced with captures and the module
    /// name first. Substitution is raw text: a capture holding `"` or `\`
    /// breaks a JSON literal like `scalar x = "$1"`, which then fails to
    /// evaluate. The runtime must have a source evaluator installed; no
    /// sandboxing is applied, so the text must be trusted.
    pub fn inject_source(&mut self, text: &str) -> Result<()> {
        let evaluator = self
            .runtime
            .evaluator()
            .ok_or_else(|| LoaderError::UnsupportedSource {
                module: self.name.clone(),
            })?;
        let expanded = source::interpolate(text, &self.name, &self.captures)?;
        trace!("Injecting {} byte(s) of source into {}", expanded.len(), self.name);
        evaluator.evaluate(&expanded, self)?;
        self.builder.record_source(expanded);
        Ok(())
    }

    /// Read a file and inject its contents
    pub fn inject_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|error| LoaderError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        self.inject_source(&text)
    }

    /// Whether the runtime already has `name` defined
    pub fn is_defined(&self, name: &str) -> bool {
        self.runtime.is_defined(name)
    }

    pub(crate) fn finish(self) -> Module {
        self.builder.finish()
    }
}
