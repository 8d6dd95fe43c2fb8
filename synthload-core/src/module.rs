//! Staged and published module shapes
//!
//! A generator never writes into a live module. It fills a detached
//! [`ModuleBuilder`], and only a successful generation turns that builder
//! into an immutable [`Module`] via [`ModuleBuilder::finish`].

use crate::error::{Error, Result};
use crate::value::{BindingKind, Callable, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A module this one depends on, with optional import arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub args: Vec<Value>,
}

/// Detached staging namespace for a module under generation
#[derive(Debug, Clone, Default)]
pub struct ModuleBuilder {
    name: String,
    supertypes: Vec<String>,
    dependencies: Vec<Dependency>,
    scalars: FxHashMap<String, Value>,
    lists: FxHashMap<String, Vec<Value>>,
    maps: FxHashMap<String, BTreeMap<String, Value>>,
    callables: FxHashMap<String, Callable>,
    sources: Vec<String>,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append supertypes, skipping any already declared
    pub fn add_supertypes<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            validate_qualified_name(&name)?;
            if !self.supertypes.contains(&name) {
                self.supertypes.push(name);
            }
        }
        Ok(())
    }

    pub fn add_dependency(&mut self, dependency: Dependency) -> Result<()> {
        validate_qualified_name(&dependency.name)?;
        self.dependencies.push(dependency);
        Ok(())
    }

    pub fn bind_scalar(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        let name = validated_member(name.into())?;
        self.scalars.insert(name, value);
        Ok(())
    }

    pub fn bind_list(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = validated_member(name.into())?;
        self.lists.insert(name, values);
        Ok(())
    }

    pub fn bind_map(&mut self, name: impl Into<String>, entries: BTreeMap<String, Value>) -> Result<()> {
        let name = validated_member(name.into())?;
        self.maps.insert(name, entries);
        Ok(())
    }

    /// Attach a callable under its own name
    pub fn bind_callable(&mut self, callable: Callable) -> Result<()> {
        let name = validated_member(callable.name().to_string())?;
        self.callables.insert(name, callable);
        Ok(())
    }

    /// Record a source fragment that was evaluated into this module
    pub fn record_source(&mut self, source: impl Into<String>) {
        self.sources.push(source.into());
    }

    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Freeze the staged namespace into a publishable module
    pub fn finish(self) -> Module {
        Module {
            name: self.name,
            supertypes: self.supertypes,
            dependencies: self.dependencies,
            scalars: self.scalars,
            lists: self.lists,
            maps: self.maps,
            callables: self.callables,
            sources: self.sources,
            placeholder: false,
        }
    }
}

/// A published, immutable module
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    supertypes: Vec<String>,
    dependencies: Vec<Dependency>,
    scalars: FxHashMap<String, Value>,
    lists: FxHashMap<String, Vec<Value>>,
    maps: FxHashMap<String, BTreeMap<String, Value>>,
    callables: FxHashMap<String, Callable>,
    sources: Vec<String>,
    placeholder: bool,
}

impl Module {
    /// An empty module standing in for a provider that reported success
    /// without publishing anything
    pub fn placeholder(name: impl Into<String>) -> Self {
        let mut module = ModuleBuilder::new(name).finish();
        module.placeholder = true;
        module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    /// Whether `name` was declared as a direct supertype
    pub fn isa(&self, name: &str) -> bool {
        self.supertypes.iter().any(|s| s == name)
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn scalar(&self, name: &str) -> Option<&Value> {
        self.scalars.get(name)
    }

    pub fn list(&self, name: &str) -> Option<&[Value]> {
        self.lists.get(name).map(Vec::as_slice)
    }

    pub fn map(&self, name: &str) -> Option<&BTreeMap<String, Value>> {
        self.maps.get(name)
    }

    pub fn callable(&self, name: &str) -> Option<&Callable> {
        self.callables.get(name)
    }

    /// Invoke a callable member by name
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let callable = self.callables.get(name).ok_or_else(|| Error::UnknownMember {
            module: self.name.clone(),
            kind: BindingKind::Callable,
            name: name.to_string(),
        })?;
        callable.call(args)
    }

    /// Whether a member of the given kind exists
    pub fn has_member(&self, kind: BindingKind, name: &str) -> bool {
        match kind {
            BindingKind::Scalar => self.scalars.contains_key(name),
            BindingKind::List => self.lists.contains_key(name),
            BindingKind::Map => self.maps.contains_key(name),
            BindingKind::Callable => self.callables.contains_key(name),
        }
    }

    /// Sorted names of every member of the given kind
    pub fn member_names(&self, kind: BindingKind) -> Vec<&str> {
        let mut names: Vec<&str> = match kind {
            BindingKind::Scalar => self.scalars.keys().map(String::as_str).collect(),
            BindingKind::List => self.lists.keys().map(String::as_str).collect(),
            BindingKind::Map => self.maps.keys().map(String::as_str).collect(),
            BindingKind::Callable => self.callables.keys().map(String::as_str).collect(),
        };
        names.sort_unstable();
        names
    }

    /// Source fragments evaluated while generating this module
    pub fn sources(&self) -> &[String] {
        &self.sources
    }
}

fn validated_member(name: String) -> Result<String> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidMemberName(name))
    }
}

/// Module names may contain separators, but never whitespace or be empty
fn validate_qualified_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::InvalidMemberName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "module_tests.rs"]
mod tests;
