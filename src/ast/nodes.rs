use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// The kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Top-level container. Its children are statements; it has no value, no
    /// chain, and no sub-type.
    Root,
    /// A parenthesized sequence of expressions whose return values are
    /// collected for a following chain.
    Group,
    /// A host-registered function call. The value is the function name, the
    /// children are the argument expressions.
    Func,
    /// A literal. No children, no chain.
    Value,
    /// A write-once constant binding. The value is the bound name, the
    /// sub-type is the binding kind, and the single chained node produces
    /// the bound value.
    Assign,
    /// A reference to a bound constant. The value is the referenced name.
    Var,
    /// An evaluator-intrinsic call (`_delete`). Shaped like `Func` but
    /// dispatched inside the evaluator instead of the registry.
    Nat,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Root => "ROOT",
            NodeKind::Group => "GROUP",
            NodeKind::Func => "FUNC",
            NodeKind::Value => "VALUE",
            NodeKind::Assign => "ASSIGN",
            NodeKind::Var => "VAR",
            NodeKind::Nat => "NAT",
        };
        f.write_str(name)
    }
}

/// A literal payload attached to a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Str(String),
    Flt(f64),
    Bool(bool),
}

impl NodeValue {
    /// The string payload, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NodeValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque, process-unique identifier for tracing. Structural equality
/// never reads it.
pub(crate) fn next_id() -> Vec<u8> {
    NEXT_ID.fetch_add(1, Ordering::Relaxed).to_be_bytes().to_vec()
}

/// A node in the tree IR.
///
/// Nodes are produced by the parser, frozen on completion of compilation,
/// and consumed repeatedly by the evaluator without mutation.
#[derive(Debug, Clone)]
pub struct Node {
    /// Opaque unique identity, assigned at construction.
    pub id: Vec<u8>,
    pub kind: NodeKind,
    pub children: Vec<Node>,
    /// A single successor applied to this node's return value.
    pub chained: Option<Box<Node>>,
    pub value: Option<NodeValue>,
    /// Only `Assign` uses this; it records the binding kind (`const`).
    pub sub_type: String,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            id: next_id(),
            kind,
            children: Vec::new(),
            chained: None,
            value: None,
            sub_type: String::new(),
        }
    }

    pub fn set_value(&mut self, value: NodeValue) {
        self.value = Some(value);
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// The name payload, for `Func`/`Nat`/`Assign`/`Var` nodes.
    pub fn name(&self) -> &str {
        self.value.as_ref().and_then(NodeValue::as_str).unwrap_or("")
    }
}

/// Structural equality over two subtrees. Identities may differ; kind,
/// sub-type, value, chain, and children must all match.
///
/// Two absent nodes compare as NOT equal: structural equality is only
/// meaningful for real subtrees. Callers holding two `None`s almost
/// certainly lost the trees they meant to compare.
pub fn node_equal(lhs: Option<&Node>, rhs: Option<&Node>) -> bool {
    let (lhs, rhs) = match (lhs, rhs) {
        (Some(l), Some(r)) => (l, r),
        _ => return false,
    };

    if lhs.kind != rhs.kind {
        return false;
    }
    if lhs.sub_type != rhs.sub_type {
        return false;
    }
    if lhs.children.len() != rhs.children.len() {
        return false;
    }
    if !value_equal(lhs.value.as_ref(), rhs.value.as_ref()) {
        return false;
    }

    match (lhs.chained.as_deref(), rhs.chained.as_deref()) {
        (None, None) => {}
        (l, r) => {
            if !node_equal(l, r) {
                return false;
            }
        }
    }

    lhs.children
        .iter()
        .zip(rhs.children.iter())
        .all(|(l, r)| node_equal(Some(l), Some(r)))
}

/// Equality over two optional literal payloads. Unlike [`node_equal`], two
/// absent values ARE equal: most nodes legitimately carry no literal.
pub fn value_equal(lhs: Option<&NodeValue>, rhs: Option<&NodeValue>) -> bool {
    match (lhs, rhs) {
        (None, None) => true,
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(value: NodeValue) -> Node {
        let mut n = Node::new(NodeKind::Value);
        n.set_value(value);
        n
    }

    #[test]
    fn test_identity_is_ignored() {
        let a = leaf(NodeValue::Str("x".into()));
        let b = leaf(NodeValue::Str("x".into()));
        assert_ne!(a.id, b.id);
        assert!(node_equal(Some(&a), Some(&b)));
    }

    #[test]
    fn test_two_absent_nodes_are_not_equal() {
        assert!(!node_equal(None, None));
        assert!(!node_equal(Some(&Node::new(NodeKind::Root)), None));
    }

    #[test]
    fn test_two_absent_values_are_equal() {
        assert!(value_equal(None, None));
        assert!(!value_equal(Some(&NodeValue::Bool(true)), None));
    }

    #[test]
    fn test_chain_mismatch() {
        let mut a = Node::new(NodeKind::Func);
        a.set_value(NodeValue::Str("page".into()));
        let b = a.clone();

        let mut chained = a.clone();
        chained.chained = Some(Box::new(b.clone()));

        assert!(node_equal(Some(&a), Some(&b)));
        assert!(!node_equal(Some(&a), Some(&chained)));
    }
}
