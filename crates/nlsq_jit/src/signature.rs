// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! Graph canonicalization: a structural signature of a residual's subgraph
//! that is invariant under commutative-operand reordering.
//!
//! Two residuals built from unrelated [`Param`](nlsq_autodiff::OpCode::Param)
//! leaves but with the same shape — same operations, same constants, same
//! sharing pattern between leaves — canonicalize to the same signature
//! string, and so are evaluated by the same compiled kernel.

use nlsq_autodiff::Graph;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// The result of canonicalizing one residual's subgraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    /// Human-inspectable canonical form, used as the cache's primary key.
    pub signature: String,
    /// A cheap structural hash of `signature`, used to probe the cache
    /// before falling back to the full string compare.
    pub hash: u64,
    /// Graph node indices of the `Param` leaves this residual reads, in the
    /// order they were first discovered while building `signature`. Slot
    /// `k` in the signature's `P:k` tokens refers to `slots[k]`.
    pub slots: Vec<usize>,
}

/// Canonicalize the subgraph rooted at `root`.
#[must_use]
pub fn canonicalize(graph: &Graph, root: usize) -> Canonical {
    let mut slot_of = HashMap::new();
    let mut slots = Vec::new();
    let signature = walk(graph, root, &mut slot_of, &mut slots);
    let mut hasher = DefaultHasher::new();
    signature.hash(&mut hasher);
    Canonical {
        signature,
        hash: hasher.finish(),
        slots,
    }
}

fn walk(
    graph: &Graph,
    index: usize,
    slot_of: &mut HashMap<usize, usize>,
    slots: &mut Vec<usize>,
) -> String {
    let node = graph.node(index);
    if node.op.is_leaf() {
        return match node.op {
            nlsq_autodiff::OpCode::Const => format!("C:{:016x}", node.data.to_bits()),
            nlsq_autodiff::OpCode::Param => {
                let slot = *slot_of.entry(index).or_insert_with(|| {
                    slots.push(index);
                    slots.len() - 1
                });
                format!("P:{slot}")
            }
            _ => unreachable!("is_leaf() only holds for Const/Param"),
        };
    }

    let mut child_signatures: Vec<String> = node
        .inputs
        .iter()
        .map(|&i| walk(graph, i, slot_of, slots))
        .collect();
    if node.op.is_commutative() {
        child_signatures.sort();
    }

    let payload = match (node.op_payload, node.op_payload2) {
        (Some(p1), Some(p2)) => format!("{:016x},{:016x}", p1.to_bits(), p2.to_bits()),
        (Some(p1), None) => format!("{:016x}", p1.to_bits()),
        (None, None) => String::new(),
        (None, Some(_)) => unreachable!("op_payload2 is only set alongside op_payload"),
    };

    format!("{}({};[{}])", node.op, payload, child_signatures.join(","))
}
