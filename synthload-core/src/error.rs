//! Error types for module shapes

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown {kind} member {name} in module {module}")]
    UnknownMember {
        module: String,
        kind: crate::BindingKind,
        name: String,
    },

    #[error("{name}: expected {expected} arguments, got {got}")]
    InvalidArity {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("Call to {name} failed: {message}")]
    CallFailed { name: String, message: String },

    #[error("Invalid member name: {0:?}")]
    InvalidMemberName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
