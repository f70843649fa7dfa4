use std::fmt;

use itertools::Itertools;
use log::trace;

use crate::eclass::EClass;
use crate::egraph::{EGraph, EGraphError};
use crate::enode::ENode;
use crate::{Id, Symbol};

/// An expression tree pulled out of an [`EGraph`] by
/// [`extract`](EGraph::extract).
///
/// A leaf is a node with no arguments. `Display` prints a bare
/// operator for leaves and an s-expression otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expr {
    op: Symbol,
    args: Vec<Expr>,
}

impl Expr {
    /// Creates a leaf expression.
    pub fn leaf(op: impl Into<Symbol>) -> Self {
        Expr::new(op, vec![])
    }

    /// Creates an expression from an operator and its arguments.
    pub fn new(op: impl Into<Symbol>, args: Vec<Expr>) -> Self {
        Expr {
            op: op.into(),
            args,
        }
    }

    /// The operator symbol.
    pub fn op(&self) -> Symbol {
        self.op
    }

    /// The argument subtrees, in order.
    pub fn args(&self) -> &[Expr] {
        &self.args
    }

    /// Returns `true` if this expression has no arguments.
    pub fn is_leaf(&self) -> bool {
        self.args.is_empty()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf() {
            write!(f, "{}", self.op)
        } else {
            write!(f, "({} {})", self.op, self.args.iter().join(" "))
        }
    }
}

/// Ranks an enode for extraction: fewest children first, ties broken
/// by lexicographically smallest operator name.
fn rank(enode: &ENode) -> (usize, &'static str) {
    (enode.arity(), enode.op().as_str())
}

/// The first minimally-ranked node in insertion order, so ties are
/// resolved deterministically.
fn best_node(class: &EClass) -> Option<&ENode> {
    let mut best: Option<&ENode> = None;
    for node in class.iter() {
        match best {
            Some(b) if rank(node) >= rank(b) => {}
            _ => best = Some(node),
        }
    }
    best
}

impl EGraph {
    /// Extracts the cheapest expression represented by the eclass
    /// that `id` canonicalizes to.
    ///
    /// Within each class the node minimizing `(arity, operator name)`
    /// is chosen and its children are extracted recursively. This
    /// greedy per-class minimization does not guarantee a globally
    /// minimal tree when a locally cheap node forces an expensive
    /// expansion; it is a deliberate approximation.
    ///
    /// Extraction is a pure query: repeated calls with no intervening
    /// mutation return identical results. It is only meaningful after
    /// a [`rebuild`](EGraph::rebuild) if unions occurred since the
    /// last one.
    ///
    /// Fails with [`EGraphError::UnknownId`] for an id this graph
    /// never allocated, and [`EGraphError::ClassNotFound`] if the
    /// canonical id has no live class behind it.
    pub fn extract(&self, id: Id) -> Result<Expr, EGraphError> {
        let root = self.find(id)?;
        let class = self.eclass(root)?;
        let best = best_node(class).ok_or(EGraphError::ClassNotFound(root))?;
        trace!("extract: class {} -> {}", root, best);
        if best.is_leaf() {
            return Ok(Expr::leaf(best.op()));
        }
        let args = best
            .children()
            .iter()
            .map(|&child| self.extract(child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::new(best.op(), args))
    }
}
