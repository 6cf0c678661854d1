use std::path::PathBuf;
use std::result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = result::Result<T, Error>;

/// Reasons an index sub-expression could not be evaluated against the locals snapshot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("name '{0}' is not defined")]
    UndefinedName(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i128, len: usize },
    #[error("key {0} not found")]
    KeyNotFound(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("unsupported expression: {0}")]
    Unsupported(&'static str),
    #[error("expression nested too deeply")]
    TooDeep,
}

/// A value's string conversion failed (formatter error or panic).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ConversionError {
    pub message: String,
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::fmt::Error> for ConversionError {
    fn from(_: std::fmt::Error) -> Self {
        ConversionError::new("formatter returned an error")
    }
}
