use std::collections::BTreeMap;

use super::nodes::{next_id, node_equal, Node};

/// A compiled program, ready to hand to a machine.
///
/// Programs are immutable after compilation: re-running one does not alter
/// the tree, and the same program can be executed on any number of machines.
#[derive(Debug, Clone)]
pub struct Program {
    /// Opaque program identity.
    pub id: Vec<u8>,
    /// Canonicalized source, regenerated from the token stream. Compiling
    /// this string again yields a structurally equal tree.
    pub source: String,
    /// The entry node. Always a `Root` whose children are the top-level
    /// statements.
    pub entry: Node,
    /// Call-site count per referenced function name. Only user-visible
    /// `Func` calls are counted; native calls are not. The machine resolves
    /// every name here before running anything.
    pub func_calls: BTreeMap<String, u64>,
}

impl Program {
    pub fn new(source: String, entry: Node, func_calls: BTreeMap<String, u64>) -> Self {
        Program {
            id: next_id(),
            source,
            entry,
            func_calls,
        }
    }

    /// Structural equality against another program: entry trees compare via
    /// [`node_equal`] (identities ignored) and the call census must match.
    pub fn structurally_equal(&self, other: &Program) -> bool {
        self.func_calls == other.func_calls
            && node_equal(Some(&self.entry), Some(&other.entry))
    }
}
