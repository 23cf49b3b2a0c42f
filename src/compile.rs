use std::fmt;

use log::debug;

use crate::ast::{Program, Token, TokenKind};
use crate::lexer::{Lexer, SourceError};
use crate::parser::{Parser, SyntaxError};

/// Errors that can occur while compiling source text.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// The source reader failed (lex phase).
    Source(SourceError),
    /// The parser rejected the token stream (parse phase).
    Syntax(SyntaxError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Source(e) => write!(f, "{}", e),
            CompileError::Syntax(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Source(e) => Some(e),
            CompileError::Syntax(e) => Some(e),
        }
    }
}

impl From<SourceError> for CompileError {
    fn from(e: SourceError) -> Self {
        CompileError::Source(e)
    }
}

impl From<SyntaxError> for CompileError {
    fn from(e: SyntaxError) -> Self {
        CompileError::Syntax(e)
    }
}

/// Compiles source text into a program.
///
/// Compilation runs in two phases, each aborting on its first error: the
/// lexer builds the token stream, then the parser builds the tree. The
/// program's `source` field is regenerated from the tokens, not copied from
/// the input, so it is canonical: compiling it again yields a structurally
/// equal tree.
///
/// # Examples
///
/// ```
/// use mac_lang::compile_source;
///
/// let program = compile_source("alert(cpu GTE 90).page();").unwrap();
///
/// assert_eq!(program.func_calls.get("alert"), Some(&1));
/// assert_eq!(program.func_calls.get("page"), Some(&1));
/// ```
pub fn compile_source(src: &str) -> Result<Program, CompileError> {
    let tokens = Lexer::new(src).tokenize()?;
    debug!("lexed {} tokens", tokens.len());

    let source = generate_source(&tokens);

    let (entry, func_calls) = Parser::new(&tokens).parse()?;
    debug!("parsed {} top-level statements", entry.children.len());

    Ok(Program::new(source, entry, func_calls))
}

/// Emits normalized source text from a token stream.
///
/// Comments, line breaks inside statements, and incidental whitespace are
/// gone; what remains is the one spelling the compiler itself would accept
/// back.
pub fn generate_source(tokens: &[Token]) -> String {
    let mut out = String::new();

    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Value => {
                out.push_str(&token.value);
                if separator_follows(tokens, i) {
                    out.push(' ');
                }
            }
            TokenKind::Open => out.push('('),
            TokenKind::Close => {
                out.push(')');
                if separator_follows(tokens, i) {
                    out.push(' ');
                }
            }
            TokenKind::End => out.push_str(";\n"),
            TokenKind::Dot => out.push('.'),
            TokenKind::Pipe => out.push('|'),
            TokenKind::Assign => out.push_str(" = "),
            TokenKind::Var => out.push('$'),
        }
    }

    out
}

// A space is needed only when the next token would otherwise fuse with this
// one: another bare value, or a `$name` reference.
fn separator_follows(tokens: &[Token], i: usize) -> bool {
    matches!(
        tokens.get(i + 1).map(|t| t.kind),
        Some(TokenKind::Value) | Some(TokenKind::Var)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_source_normalizes_whitespace() {
        let program = compile_source("alert( cpu   GTE 90 ).page();").unwrap();
        assert_eq!(program.source, "alert(cpu GTE 90).page();\n");
    }

    #[test]
    fn test_canonical_source_keeps_var_separator() {
        let program = compile_source("slack(ops $region);").unwrap();
        assert_eq!(program.source, "slack(ops $region);\n");
    }

    #[test]
    fn test_compile_reports_missing_terminator() {
        let err = compile_source("page()\nalert(cpu);").unwrap_err();
        match err {
            CompileError::Source(e) => {
                assert_eq!(e.line, 1);
                assert_eq!(e.column, 6);
            }
            other => panic!("expected a source error, got {:?}", other),
        }
    }
}
