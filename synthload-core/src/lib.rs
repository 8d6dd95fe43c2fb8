//! Synthload Core
//!
//! Shared types describing the *shape* of a synthesized module:
//! - Runtime values and callable members
//! - The detached `ModuleBuilder` a generator writes into
//! - The immutable `Module` published once generation succeeds

pub mod error;
pub mod module;
pub mod value;

pub use error::{Error, Result};
pub use module::{Dependency, Module, ModuleBuilder};
pub use value::{BindingKind, Callable, NativeFn, Value};
