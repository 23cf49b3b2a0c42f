//! CLI support for mac-lang
//!
//! Provides programmatic access to the `mac` CLI operations for embedding
//! in other tools.

mod check;

pub use check::{check_source, emit_ir, run_source, CheckReport};

use std::fmt;
use std::io;

use crate::{CodecError, CompileError, RuntimeError};

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Compilation error (lex or parse phase)
    Compile(CompileError),
    /// Program execution error
    Runtime(RuntimeError),
    /// Program IR encoding error
    Codec(CodecError),
    /// IO error
    Io(io::Error),
    /// No source provided
    NoInput,
    /// An `-e` flag was not of the form `NAME=VALUE`
    BadEnvPair(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Compile(e) => write!(f, "{}", e),
            CliError::Runtime(e) => write!(f, "{}", e),
            CliError::Codec(e) => write!(f, "{}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => {
                write!(f, "No source provided. Pass a file or pipe source to stdin.")
            }
            CliError::BadEnvPair(pair) => {
                write!(f, "Invalid environment pair '{}'. Expected NAME=VALUE.", pair)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Compile(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Codec(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CompileError> for CliError {
    fn from(e: CompileError) -> Self {
        CliError::Compile(e)
    }
}

impl From<RuntimeError> for CliError {
    fn from(e: RuntimeError) -> Self {
        CliError::Runtime(e)
    }
}

impl From<CodecError> for CliError {
    fn from(e: CodecError) -> Self {
        CliError::Codec(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
