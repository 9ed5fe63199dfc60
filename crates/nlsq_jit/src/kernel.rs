// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
// nlsq: scalar autodiff and nonlinear least squares.
// Dual licensed under Apache 2.0 and MIT.
// ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

//! The compiled kernel: a flattened, reusable forward/backward evaluator
//! for one canonical residual shape.
//!
//! Rust has no safe facility for emitting and loading machine code at
//! runtime, so there is exactly one realization of a [`Kernel`]: an
//! interpreted straight-line tape of op records. Once compiled from one
//! exemplar residual, the same tape is replayed — unchanged — against every
//! other residual that canonicalizes to the same signature; only the slot
//! values differ per call.

use nlsq_autodiff::{Graph, OpCode};

use crate::signature::Canonical;
use std::collections::HashMap;

/// One entry of a compiled tape.
#[derive(Debug, Clone)]
pub enum TapeNode {
    /// Read external parameter `slot`.
    Param(usize),
    /// A baked-in constant, shared by every residual with this signature.
    Const(f64),
    /// Apply `op` to the values already computed at `inputs` (positions
    /// earlier in the tape).
    Op {
        /// The primitive operation.
        op: OpCode,
        /// First scalar payload (e.g. `pow_const`'s exponent).
        payload: Option<f64>,
        /// Second scalar payload (`clamp`'s upper bound).
        payload2: Option<f64>,
        /// Tape positions of this node's operands.
        inputs: Vec<usize>,
    },
}

/// A compiled, reusable residual evaluator.
#[derive(Debug, Clone)]
pub struct Kernel {
    tape: Vec<TapeNode>,
    output: usize,
    num_slots: usize,
}

impl Kernel {
    /// Compile the subgraph rooted at `root` into a tape, using `canon`'s
    /// slot assignment (so that later, structurally-identical residuals
    /// that reuse this kernel agree on what "slot `k`" means).
    #[must_use]
    pub fn compile(graph: &Graph, root: usize, canon: &Canonical) -> Kernel {
        let slot_of: HashMap<usize, usize> =
            canon.slots.iter().enumerate().map(|(slot, &idx)| (idx, slot)).collect();
        let mut tape = Vec::new();
        let mut local_index_of = HashMap::new();
        let output = build(graph, root, &slot_of, &mut local_index_of, &mut tape);
        Kernel {
            tape,
            output,
            num_slots: canon.slots.len(),
        }
    }

    /// Number of external parameter slots this kernel expects.
    #[must_use]
    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Length of the compiled tape — a rough proxy for the kernel's
    /// per-call interpretation cost.
    #[must_use]
    pub fn tape_len(&self) -> usize {
        self.tape.len()
    }

    /// Evaluate the residual's value only.
    #[must_use]
    pub fn evaluate(&self, slot_values: &[f64]) -> f64 {
        self.forward(slot_values).0[self.output]
    }

    /// Evaluate the residual's value and the gradient of the residual with
    /// respect to each of its `num_slots` parameter slots.
    #[must_use]
    pub fn evaluate_with_gradient(&self, slot_values: &[f64]) -> (f64, Vec<f64>) {
        let (values, local_partials) = self.forward(slot_values);
        let mut grad = vec![0.0; self.tape.len()];
        grad[self.output] = 1.0;
        for i in (0..=self.output).rev() {
            let upstream = grad[i];
            if upstream == 0.0 {
                continue;
            }
            if let TapeNode::Op { inputs, .. } = &self.tape[i] {
                for (k, &input_pos) in inputs.iter().enumerate() {
                    grad[input_pos] += local_partials[i][k] * upstream;
                }
            }
        }
        let mut slot_grad = vec![0.0; self.num_slots];
        for (i, node) in self.tape.iter().enumerate() {
            if let TapeNode::Param(slot) = node {
                slot_grad[*slot] += grad[i];
            }
        }
        (values[self.output], slot_grad)
    }

    fn forward(&self, slot_values: &[f64]) -> (Vec<f64>, Vec<Vec<f64>>) {
        assert_eq!(slot_values.len(), self.num_slots, "slot value count mismatch");
        let mut values = vec![0.0; self.tape.len()];
        let mut partials = vec![Vec::new(); self.tape.len()];
        for (i, node) in self.tape.iter().enumerate() {
            match node {
                TapeNode::Param(slot) => values[i] = slot_values[*slot],
                TapeNode::Const(c) => values[i] = *c,
                TapeNode::Op { op, payload, payload2, inputs } => {
                    let operands: Vec<f64> = inputs.iter().map(|&p| values[p]).collect();
                    let (value, local) = crate::elemental::eval(*op, *payload, *payload2, &operands);
                    values[i] = value;
                    partials[i] = local;
                }
            }
        }
        (values, partials)
    }
}

fn build(
    graph: &Graph,
    index: usize,
    slot_of: &HashMap<usize, usize>,
    local_index_of: &mut HashMap<usize, usize>,
    tape: &mut Vec<TapeNode>,
) -> usize {
    if let Some(&pos) = local_index_of.get(&index) {
        return pos;
    }
    let node = graph.node(index);
    let entry = match node.op {
        OpCode::Const => TapeNode::Const(node.data),
        OpCode::Param => TapeNode::Param(slot_of[&index]),
        op => {
            let inputs: Vec<usize> = node
                .inputs
                .iter()
                .map(|&i| build(graph, i, slot_of, local_index_of, tape))
                .collect();
            TapeNode::Op {
                op,
                payload: node.op_payload,
                payload2: node.op_payload2,
                inputs,
            }
        }
    };
    tape.push(entry);
    let pos = tape.len() - 1;
    local_index_of.insert(index, pos);
    pos
}
