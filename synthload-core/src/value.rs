//! Values and callable members attached to synthesized modules

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Runtime value stored in a module namespace
pub type Value = serde_json::Value;

/// Native function implementation backing a callable member
pub type NativeFn = Arc<dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// The namespace a member lives in. Scalars, lists and maps never alias
/// each other even when they share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingKind {
    Scalar,
    List,
    Map,
    Callable,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingKind::Scalar => "scalar",
            BindingKind::List => "list",
            BindingKind::Map => "map",
            BindingKind::Callable => "callable",
        };
        f.write_str(name)
    }
}

/// A named function attached to a module
#[derive(Clone)]
pub struct Callable {
    name: String,

    /// Minimum number of arguments
    min_args: usize,

    /// Maximum number of arguments (None for variadic)
    max_args: Option<usize>,

    func: NativeFn,
}

impl Callable {
    /// Create a callable accepting between `min_args` and `max_args` arguments
    pub fn new<F>(name: impl Into<String>, min_args: usize, max_args: Option<usize>, func: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            min_args,
            max_args,
            func: Arc::new(func),
        }
    }

    /// Create a callable with an exact arity
    pub fn fixed<F>(name: impl Into<String>, arity: usize, func: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, arity, Some(arity), func)
    }

    /// Create a callable accepting any number of arguments
    pub fn variadic<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, 0, None, func)
    }

    /// The same function under a different name
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> (usize, Option<usize>) {
        (self.min_args, self.max_args)
    }

    /// Validate argument count
    pub fn validate_args(&self, arg_count: usize) -> Result<()> {
        let too_few = arg_count < self.min_args;
        let too_many = self.max_args.is_some_and(|max| arg_count > max);
        if too_few || too_many {
            let expected = match self.max_args {
                Some(max) if max == self.min_args => max.to_string(),
                Some(max) => format!("{}..={}", self.min_args, max),
                None => format!("at least {}", self.min_args),
            };
            return Err(Error::InvalidArity {
                name: self.name.clone(),
                expected,
                got: arg_count,
            });
        }
        Ok(())
    }

    /// Call the function with argument validation
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        self.validate_args(args.len())?;
        (self.func)(args).map_err(|e| Error::CallFailed {
            name: self.name.clone(),
            message: format!("{:#}", e),
        })
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish_non_exhaustive()
    }
}
