//! Wire form for compiled programs.
//!
//! The wire schema mirrors the IR one-to-one and is deterministic: struct
//! fields serialize in declaration order and the call census is an ordered
//! map. Decoding validates every kind and value tag; the tree's *shape* is
//! not re-validated here; the evaluator owns that at run time.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{Node, NodeKind, NodeValue, Program};

/// Returned when program IR cannot be decoded.
#[derive(Debug)]
pub enum CodecError {
    /// The bytes are not a well-formed program, or a kind/value tag is
    /// unknown.
    Malformed(serde_json::Error),
    /// A tag decoded but names something the machine cannot hold, such as
    /// the `NONE` node kind.
    InvalidKind(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Malformed(e) => write!(f, "malformed program IR: {}", e),
            CodecError::InvalidKind(k) => write!(f, "program IR holds an invalid kind: {}", k),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Malformed(e) => Some(e),
            CodecError::InvalidKind(_) => None,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Malformed(e)
    }
}

#[derive(Serialize, Deserialize)]
struct WireProgram {
    id: Vec<u8>,
    source: String,
    entry: WireNode,
    func_calls: BTreeMap<String, u64>,
}

#[derive(Serialize, Deserialize)]
struct WireNode {
    id: Vec<u8>,
    kind: WireKind,
    children: Vec<WireNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chained: Option<Box<WireNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<WireValue>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    sub_type: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
enum WireKind {
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "ROOT")]
    Root,
    #[serde(rename = "GROUP")]
    Group,
    #[serde(rename = "FUNC")]
    Func,
    #[serde(rename = "VALUE")]
    Value,
    #[serde(rename = "ASSIGN")]
    Assign,
    #[serde(rename = "VAR")]
    Var,
    #[serde(rename = "NAT")]
    Nat,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "kind")]
enum WireValue {
    #[serde(rename = "STR")]
    Str { str: String },
    #[serde(rename = "FLT")]
    Flt { flt: f64 },
    #[serde(rename = "BOOL")]
    Bool {
        #[serde(rename = "bool")]
        flag: bool,
    },
}

/// Serializes a program to its portable IR bytes.
pub fn encode(program: &Program) -> Result<Vec<u8>, CodecError> {
    let wire = WireProgram {
        id: program.id.clone(),
        source: program.source.clone(),
        entry: encode_node(&program.entry),
        func_calls: program.func_calls.clone(),
    };

    Ok(serde_json::to_vec(&wire)?)
}

/// Recreates a program from IR bytes, validating every tag.
pub fn decode(bytes: &[u8]) -> Result<Program, CodecError> {
    let wire: WireProgram = serde_json::from_slice(bytes)?;

    Ok(Program {
        id: wire.id,
        source: wire.source,
        entry: decode_node(wire.entry)?,
        func_calls: wire.func_calls,
    })
}

fn encode_node(node: &Node) -> WireNode {
    WireNode {
        id: node.id.clone(),
        kind: match node.kind {
            NodeKind::Root => WireKind::Root,
            NodeKind::Group => WireKind::Group,
            NodeKind::Func => WireKind::Func,
            NodeKind::Value => WireKind::Value,
            NodeKind::Assign => WireKind::Assign,
            NodeKind::Var => WireKind::Var,
            NodeKind::Nat => WireKind::Nat,
        },
        children: node.children.iter().map(encode_node).collect(),
        chained: node
            .chained
            .as_deref()
            .map(|n| Box::new(encode_node(n))),
        value: node.value.as_ref().map(|v| match v {
            NodeValue::Str(s) => WireValue::Str { str: s.clone() },
            NodeValue::Flt(n) => WireValue::Flt { flt: *n },
            NodeValue::Bool(b) => WireValue::Bool { flag: *b },
        }),
        sub_type: node.sub_type.clone(),
    }
}

fn decode_node(wire: WireNode) -> Result<Node, CodecError> {
    let kind = match wire.kind {
        WireKind::None => return Err(CodecError::InvalidKind("NONE".to_string())),
        WireKind::Root => NodeKind::Root,
        WireKind::Group => NodeKind::Group,
        WireKind::Func => NodeKind::Func,
        WireKind::Value => NodeKind::Value,
        WireKind::Assign => NodeKind::Assign,
        WireKind::Var => NodeKind::Var,
        WireKind::Nat => NodeKind::Nat,
    };

    let chained = match wire.chained {
        Some(inner) => Some(Box::new(decode_node(*inner)?)),
        None => None,
    };

    Ok(Node {
        id: wire.id,
        kind,
        children: wire
            .children
            .into_iter()
            .map(decode_node)
            .collect::<Result<_, _>>()?,
        chained,
        value: wire.value.map(|v| match v {
            WireValue::Str { str } => NodeValue::Str(str),
            WireValue::Flt { flt } => NodeValue::Flt(flt),
            WireValue::Bool { flag } => NodeValue::Bool(flag),
        }),
        sub_type: wire.sub_type,
    })
}

impl Program {
    /// Serializes this program; see [`encode`].
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        encode(self)
    }

    /// Recreates a program from bytes produced by [`Program::to_bytes`];
    /// see [`decode`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Program, CodecError> {
        decode(bytes)
    }
}
