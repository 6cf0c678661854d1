//! Command-line tooling around `peek_core`: extract call text from source files, resolve index
//! expressions against ad hoc locals, and find leftover `po!`/`pv!`/`pe!` calls.

pub mod commands;
pub mod config;

pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum CliError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error(transparent)]
        Core(#[from] peek_core::Error),

        #[error("Evaluation failed: {0}")]
        Eval(#[from] peek_core::EvalError),

        #[error("Invalid input: {0}")]
        InvalidInput(String),
    }

    pub type Result<T> = std::result::Result<T, CliError>;
}

pub use error::{CliError, Result};
