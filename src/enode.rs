use std::fmt;

use itertools::Itertools;

use crate::egraph::EGraphError;
use crate::{Id, Symbol};

/// An expression node: an operator applied to an ordered sequence of
/// child eclass [`Id`]s.
///
/// ENodes are immutable values compared and hashed structurally, so
/// identical `(operator, children)` pairs always dedup to the same
/// eclass when passed to [`EGraph::add`](crate::EGraph::add). A node
/// with no children is a leaf (a constant or a variable).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ENode {
    op: Symbol,
    children: Vec<Id>,
}

impl ENode {
    /// Creates a leaf node: an operator with no children.
    pub fn leaf(op: impl Into<Symbol>) -> Self {
        ENode::new(op, vec![])
    }

    /// Creates a node from an operator and its children.
    pub fn new(op: impl Into<Symbol>, children: Vec<Id>) -> Self {
        ENode {
            op: op.into(),
            children,
        }
    }

    /// Creates a node, checking the declared arity against the number
    /// of children given.
    ///
    /// Fails with [`EGraphError::MalformedNode`] on a mismatch.
    pub fn with_arity(
        op: impl Into<Symbol>,
        arity: usize,
        children: Vec<Id>,
    ) -> Result<Self, EGraphError> {
        let op = op.into();
        if children.len() != arity {
            return Err(EGraphError::MalformedNode {
                op,
                arity,
                len: children.len(),
            });
        }
        Ok(ENode { op, children })
    }

    /// The operator symbol.
    pub fn op(&self) -> Symbol {
        self.op
    }

    /// The children eclass ids, in order.
    pub fn children(&self) -> &[Id] {
        &self.children
    }

    /// The number of children.
    pub fn arity(&self) -> usize {
        self.children.len()
    }

    /// Returns `true` if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Rewrites each child id in place, typically to canonicalize it.
    pub(crate) fn update_children(&mut self, mut f: impl FnMut(Id) -> Id) {
        self.children.iter_mut().for_each(|id| *id = f(*id));
    }
}

impl fmt::Display for ENode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf() {
            write!(f, "{}", self.op)
        } else {
            write!(f, "({} {})", self.op, self.children.iter().join(" "))
        }
    }
}
