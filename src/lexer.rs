use std::fmt;

use crate::ast::{Token, TokenKind};

/// Returned when the source reader encounters an error: a malformed UTF-8
/// character, or a statement left unterminated by a following line.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Source error (Ln {}, Col {}): {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for SourceError {}

/// Scans source text into a token stream.
///
/// The scan is line-oriented: each line is consumed left to right with a
/// single-character dispatch, and the rule "every statement ends with `;`"
/// is enforced when the *next* line begins. A `;` in column 1 comments out
/// the whole line.
pub struct Lexer<'a> {
    input: &'a str,
}

/// A value lexeme being accumulated, with the position where it began.
struct ValueBuffer {
    buf: String,
    start_line: u32,
    start_column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input }
    }

    /// Scans the full input. Fails on the first malformed character or
    /// unterminated statement.
    pub fn tokenize(&self) -> Result<Vec<Token>, SourceError> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut line_no: u32 = 0;

        for line in self.input.lines() {
            line_no += 1;

            if let Some(last) = tokens.last() {
                if last.kind != TokenKind::End {
                    return Err(SourceError {
                        line: last.line,
                        column: last.column,
                        message: "Line must end with a `;`".to_string(),
                    });
                }
            }

            self.scan_line(line, line_no, &mut tokens)?;
        }

        Ok(tokens)
    }

    fn scan_line(
        &self,
        line: &str,
        line_no: u32,
        tokens: &mut Vec<Token>,
    ) -> Result<(), SourceError> {
        let mut col: u32 = 0;
        let mut val: Option<ValueBuffer> = None;

        for ch in line.chars() {
            col += 1;

            // A str is always well-formed, so the decode failure marker is
            // the replacement character a lossy byte conversion leaves
            // behind. A literal U+FFFD in the source is rejected the same
            // way.
            if ch == char::REPLACEMENT_CHARACTER {
                return Err(SourceError {
                    line: line_no,
                    column: col,
                    message: "failed to decode UTF-8 character".to_string(),
                });
            }

            let mut breaking = false;
            let mut completing = false;
            let mut kind: Option<TokenKind> = None;

            match ch {
                ';' => {
                    breaking = true;
                    if col != 1 {
                        // In column 1 the rest of the line is a comment.
                        kind = Some(TokenKind::End);
                    }
                }
                '(' => {
                    completing = true;
                    kind = Some(TokenKind::Open);
                }
                ')' => {
                    completing = true;
                    kind = Some(TokenKind::Close);
                }
                ' ' => {
                    completing = true;
                }
                '|' => {
                    completing = true;
                    kind = Some(TokenKind::Pipe);
                }
                '.' => {
                    completing = true;
                    kind = Some(TokenKind::Dot);
                }
                '=' => {
                    completing = true;
                    kind = Some(TokenKind::Assign);
                }
                '$' => {
                    completing = true;
                    kind = Some(TokenKind::Var);
                }
                _ => {
                    val.get_or_insert_with(|| ValueBuffer {
                        buf: String::new(),
                        start_line: line_no,
                        start_column: col,
                    })
                    .buf
                    .push(ch);
                }
            }

            if completing || breaking {
                if let Some(v) = val.take() {
                    tokens.push(complete_value(v));
                }
            }

            if let Some(k) = kind {
                tokens.push(Token::new(k, line_no, col));
            }

            if breaking {
                break;
            }
        }

        if let Some(v) = val.take() {
            tokens.push(complete_value(v));
        }

        Ok(())
    }
}

fn complete_value(v: ValueBuffer) -> Token {
    Token::value(v.buf.trim(), v.start_line, v.start_column)
}

#[test]
fn test_single_statement() {
    let tokens = Lexer::new("page();").tokenize().unwrap();

    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens[0], Token::value("page", 1, 1));
    assert_eq!(tokens[1], Token::new(TokenKind::Open, 1, 5));
    assert_eq!(tokens[2], Token::new(TokenKind::Close, 1, 6));
    assert_eq!(tokens[3], Token::new(TokenKind::End, 1, 7));
}

#[test]
fn test_comment_line_emits_nothing() {
    let tokens = Lexer::new("; all of this is skipped\npage();")
        .tokenize()
        .unwrap();

    assert_eq!(tokens[0], Token::value("page", 2, 1));
}
