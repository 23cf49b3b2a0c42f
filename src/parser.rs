use std::collections::BTreeMap;
use std::fmt;

use crate::ast::{Node, NodeKind, NodeValue, Token, TokenKind};

/// Function names dispatched inside the evaluator instead of the registry.
pub const NATIVE_FUNCTIONS: &[&str] = &["_delete"];

/// Returned when the parser encounters a token it is not expecting. Carries
/// the offending token's position and the kind of the enclosing node.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub line: u32,
    pub column: u32,
    pub node_kind: NodeKind,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Syntax Error (Ln {}, Col {}, <{}>): {}",
            self.line, self.column, self.node_kind, self.message
        )
    }
}

impl std::error::Error for SyntaxError {}

/// Builds the tree IR from a token list.
///
/// The parser walks the list with an absolute index; at each position it
/// dispatches on the token kind and learns how many tokens that dispatch
/// consumed and whether the enclosing expression should close. Lookbehind
/// and lookahead always resolve against the raw token list, never against
/// the nodes built so far.
pub struct Parser<'a> {
    tokens: &'a [Token],
    func_calls: BTreeMap<String, u64>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Parser {
            tokens,
            func_calls: BTreeMap::new(),
        }
    }

    /// Consumes the full token list and produces the `Root` entry node plus
    /// the census of user function call sites.
    pub fn parse(mut self) -> Result<(Node, BTreeMap<String, u64>), SyntaxError> {
        let mut root = Node::new(NodeKind::Root);

        let mut i = 0;
        while i < self.tokens.len() {
            let (consumed, _) = self.parse_token(&mut root, i)?;
            i += consumed;
        }

        Ok((root, self.func_calls))
    }

    fn parse_token(&mut self, node: &mut Node, idx: usize) -> Result<(usize, bool), SyntaxError> {
        match self.tokens[idx].kind {
            TokenKind::Value => self.parse_value(node, idx),
            TokenKind::Open => self.parse_open(node, idx),
            TokenKind::End => Ok((1, true)),
            TokenKind::Close => self.parse_close(node, idx),
            TokenKind::Dot => self.parse_dot(node, idx),
            TokenKind::Pipe => self.parse_pipe(node, idx),
            TokenKind::Assign => self.parse_assign(node, idx),
            TokenKind::Var => self.parse_var(node, idx),
        }
    }

    fn prev(&self, idx: usize) -> Option<&Token> {
        idx.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    fn next(&self, idx: usize) -> Option<&Token> {
        self.tokens.get(idx + 1)
    }

    /// Lookahead for `name(`.
    fn next_is_probably_func(&self, idx: usize) -> bool {
        matches!(self.next(idx), Some(t) if t.kind == TokenKind::Value)
            && matches!(self.tokens.get(idx + 2), Some(t) if t.kind == TokenKind::Open)
    }

    /// Lookahead for `(name(`.
    fn next_is_probably_group(&self, idx: usize) -> bool {
        matches!(self.next(idx), Some(t) if t.kind == TokenKind::Open)
            && matches!(self.tokens.get(idx + 2), Some(t) if t.kind == TokenKind::Value)
            && matches!(self.tokens.get(idx + 3), Some(t) if t.kind == TokenKind::Open)
    }

    fn syntax(&self, idx: usize, node: &Node, message: impl Into<String>) -> SyntaxError {
        let token = &self.tokens[idx];
        SyntaxError {
            line: token.line,
            column: token.column,
            node_kind: node.kind,
            message: message.into(),
        }
    }

    fn syntax_at(&self, token: &Token, node: &Node, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            line: token.line,
            column: token.column,
            node_kind: node.kind,
            message: message.into(),
        }
    }

    /// Parses a run of tokens starting at `start` into `node`, stopping when
    /// a dispatch reports that the expression closed. Returns the number of
    /// tokens consumed.
    fn parse_into(&mut self, node: &mut Node, start: usize) -> Result<usize, SyntaxError> {
        let mut consumed = 0;
        while start + consumed < self.tokens.len() {
            let (c, done) = self.parse_token(node, start + consumed)?;
            consumed += c;
            if done {
                break;
            }
        }
        Ok(consumed)
    }

    fn parse_value(&mut self, node: &mut Node, idx: usize) -> Result<(usize, bool), SyntaxError> {
        if node.kind != NodeKind::Func && node.kind != NodeKind::Nat {
            // Something else will backtrack and consume this soon.
            return Ok((1, false));
        }

        if matches!(self.next(idx), Some(t) if t.kind == TokenKind::Open) {
            // This is probably a nested function call.
            return Ok((1, false));
        }

        let mut new = Node::new(NodeKind::Value);
        match self.tokens[idx].value.as_str() {
            "true" => new.set_value(NodeValue::Bool(true)),
            "false" => new.set_value(NodeValue::Bool(false)),
            lexeme => new.set_value(NodeValue::Str(lexeme.to_string())),
        }

        node.add_child(new);

        Ok((1, false))
    }

    fn parse_open(&mut self, node: &mut Node, idx: usize) -> Result<(usize, bool), SyntaxError> {
        if self.next(idx).is_none() {
            return Err(self.syntax(idx, node, "Unexpected Open. Found EOF, expected something."));
        }

        match node.kind {
            NodeKind::Root | NodeKind::Group | NodeKind::Func => {}
            _ => {
                return Err(self.syntax(
                    idx,
                    node,
                    "Unexpected Open. The open is not in a valid context.",
                ))
            }
        }

        let callee = match self.prev(idx) {
            Some(prev) if prev.kind == TokenKind::Value => Some(prev.value.clone()),
            _ => None,
        };

        let mut new = match callee {
            Some(name) => {
                let kind = if NATIVE_FUNCTIONS.contains(&name.as_str()) {
                    NodeKind::Nat
                } else {
                    *self.func_calls.entry(name.clone()).or_insert(0) += 1;
                    NodeKind::Func
                };
                let mut n = Node::new(kind);
                n.set_value(NodeValue::Str(name));
                n
            }
            None => Node::new(NodeKind::Group),
        };

        let consumed = 1 + self.parse_into(&mut new, idx + 1)?;

        node.add_child(new);

        Ok((consumed, false))
    }

    fn parse_close(&mut self, node: &mut Node, idx: usize) -> Result<(usize, bool), SyntaxError> {
        match node.kind {
            NodeKind::Group | NodeKind::Func | NodeKind::Nat => Ok((1, true)),
            _ => Err(self.syntax(
                idx,
                node,
                "Unexpected close. The thing you're attempting to close can't be closed.",
            )),
        }
    }

    fn parse_dot(&mut self, node: &mut Node, idx: usize) -> Result<(usize, bool), SyntaxError> {
        let last = match node.children.last() {
            Some(last) => last,
            None => {
                return Err(self.syntax(
                    idx,
                    node,
                    "Unexpected chain. The node has no children to chain from.",
                ))
            }
        };

        match last.kind {
            NodeKind::Group | NodeKind::Func => {
                if !self.next_is_probably_func(idx) && !self.next_is_probably_group(idx) {
                    return Err(self.syntax(
                        idx,
                        node,
                        "Unexpected chain. The next call doesn't appear to be a function or group.",
                    ));
                }

                let mut container = Node::new(NodeKind::Root);
                let consumed = 1 + self.parse_into(&mut container, idx + 1)?;

                if container.children.len() != 1 {
                    return Err(self.syntax(
                        idx,
                        node,
                        format!(
                            "Failed to chain. Only expected one root child. Got {}",
                            container.children.len()
                        ),
                    ));
                }

                let successor = container.children.remove(0);
                if let Some(last) = node.children.last_mut() {
                    last.chained = Some(Box::new(successor));
                }

                Ok((consumed, true))
            }
            NodeKind::Value => {
                let next = match self.next(idx) {
                    Some(next) if next.kind == TokenKind::Value => next.clone(),
                    _ => {
                        return Err(self.syntax(idx, node, "Expected to find a value after ."));
                    }
                };

                let lexeme = match last.value.as_ref().and_then(NodeValue::as_str) {
                    Some(s) if s.starts_with('f') => s.to_string(),
                    _ => {
                        return Err(self.syntax(
                            idx,
                            node,
                            format!(
                                "Unable to determine the value for {:?}.{}",
                                last.value, next.value
                            ),
                        ));
                    }
                };

                let raw = format!("{}.{}", &lexeme[1..], next.value);
                let flt: f64 = raw.parse().map_err(|e| {
                    self.syntax(idx, node, format!("Invalid float value: {}", e))
                })?;

                if let Some(last) = node.children.last_mut() {
                    last.set_value(NodeValue::Flt(flt));
                }

                Ok((2, false))
            }
            _ => Err(self.syntax(
                idx,
                node,
                "Unexpected chain. You can only chain from a group or a function.",
            )),
        }
    }

    fn parse_pipe(&mut self, node: &mut Node, idx: usize) -> Result<(usize, bool), SyntaxError> {
        if node.kind != NodeKind::Group {
            return Err(self.syntax(idx, node, "Unexpected Pipe. You can't pipe outside of a group."));
        }
        if !self.next_is_probably_func(idx) {
            return Err(self.syntax(
                idx,
                node,
                "Unexpected Pipe. The next call doesn't appear to be a function.",
            ));
        }

        // The pipe itself emits no node; it only separates grouped calls.
        Ok((1, false))
    }

    fn parse_assign(&mut self, node: &mut Node, idx: usize) -> Result<(usize, bool), SyntaxError> {
        if idx < 2 {
            return Err(self.syntax(
                idx,
                node,
                "Unexpected assignment. Expected a value and definition before.",
            ));
        }
        if self.next(idx).is_none() {
            return Err(self.syntax(
                idx,
                node,
                "Unexpected assignment. Nothing to assign to the variable.",
            ));
        }

        // The two tokens before the `=` were consumed as no-ops earlier;
        // claim them retroactively as the binding kind and the bound name.
        let kind_tok = &self.tokens[idx - 2];
        let name_tok = &self.tokens[idx - 1];

        if kind_tok.kind != TokenKind::Value || kind_tok.value != "const" {
            return Err(self.syntax_at(
                kind_tok,
                node,
                "The leading assignment is not a valid type.",
            ));
        }

        if name_tok.kind != TokenKind::Value {
            return Err(self.syntax_at(
                name_tok,
                node,
                "The leading assignment name is not a valid type.",
            ));
        }

        let mut new = Node::new(NodeKind::Assign);
        new.sub_type = kind_tok.value.clone();
        new.set_value(NodeValue::Str(name_tok.value.clone()));

        let mut container = Node::new(NodeKind::Root);
        let consumed = 1 + self.parse_into(&mut container, idx + 1)?;

        if container.children.len() != 1 {
            return Err(self.syntax(
                idx,
                node,
                format!(
                    "Failed to chain. Only expected one root child. Got {}",
                    container.children.len()
                ),
            ));
        }

        new.chained = Some(Box::new(container.children.remove(0)));

        node.add_child(new);

        Ok((consumed, true))
    }

    fn parse_var(&mut self, node: &mut Node, idx: usize) -> Result<(usize, bool), SyntaxError> {
        let next = match self.next(idx) {
            Some(next) => next,
            None => {
                return Err(self.syntax(idx, node, "Unexpected variable. Found EOF, expected a name."))
            }
        };

        if next.kind != TokenKind::Value {
            return Err(self.syntax_at(next, node, "Unexpected variable fetch. Expected a name."));
        }

        if node.kind != NodeKind::Func {
            return Err(self.syntax(idx, node, "Attempting to use a variable outside a function call."));
        }

        let mut new = Node::new(NodeKind::Var);
        new.set_value(NodeValue::Str(next.value.clone()));

        node.add_child(new);

        Ok((2, false))
    }
}
