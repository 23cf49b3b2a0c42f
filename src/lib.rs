pub mod ast;
pub mod cli;
pub mod codec;
pub mod compile;
pub mod evaluator;
pub mod lexer;
pub mod machine;
pub mod parser;
pub mod registry;
pub mod value;

pub use ast::{node_equal, Node, NodeKind, NodeValue, Program, Token, TokenKind};
pub use codec::CodecError;
pub use compile::{compile_source, generate_source, CompileError};
pub use evaluator::{RuntimeError, RuntimeErrorCode};
pub use lexer::{Lexer, SourceError};
pub use machine::{run, Machine, MachineState};
pub use parser::{Parser, SyntaxError};
pub use registry::{Handler, HostCtx, ParamKind, Registry, RegistryError, ReturnShape};
pub use value::Value;

use std::fmt;

/// Any failure an embedding host can see: a compile-phase error, a runtime
/// error from a machine, or malformed program IR.
#[derive(Debug)]
pub enum Error {
    Compile(CompileError),
    Runtime(RuntimeError),
    Codec(CodecError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Compile(e) => write!(f, "{}", e),
            Error::Runtime(e) => write!(f, "{}", e),
            Error::Codec(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Compile(e) => Some(e),
            Error::Runtime(e) => Some(e),
            Error::Codec(e) => Some(e),
        }
    }
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Compile(e)
    }
}

impl From<SourceError> for Error {
    fn from(e: SourceError) -> Self {
        Error::Compile(CompileError::Source(e))
    }
}

impl From<SyntaxError> for Error {
    fn from(e: SyntaxError) -> Self {
        Error::Compile(CompileError::Syntax(e))
    }
}

impl From<RuntimeError> for Error {
    fn from(e: RuntimeError) -> Self {
        Error::Runtime(e)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}
