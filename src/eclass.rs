use indexmap::IndexSet;

use crate::{ENode, Id};

/// An equivalence class of enodes.
///
/// The node set only grows while the class is alive; a class is
/// destroyed when [`EGraph::union`](crate::EGraph::union) merges it
/// into a larger one, after which its [`Id`] canonicalizes to the
/// survivor.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct EClass {
    /// This eclass's id.
    pub id: Id,
    /// The structurally distinct enodes currently known to be equal.
    pub nodes: IndexSet<ENode>,
}

impl EClass {
    pub(crate) fn singleton(id: Id, enode: ENode) -> Self {
        let mut nodes = IndexSet::with_capacity(1);
        nodes.insert(enode);
        EClass { id, nodes }
    }

    /// Returns `true` if the `eclass` is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of enodes in this eclass.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Iterates over the enodes in this eclass.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ENode> {
        self.nodes.iter()
    }

    /// Iterates over the childless enodes in this eclass.
    pub fn leaves(&self) -> impl Iterator<Item = &ENode> {
        self.nodes.iter().filter(|n| n.is_leaf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_filters_composites() {
        let mut class = EClass::singleton(Id(0), ENode::leaf("x"));
        class.nodes.insert(ENode::new("f", vec![Id(1)]));
        assert_eq!(class.len(), 2);
        assert_eq!(class.leaves().count(), 1);
        assert_eq!(class.leaves().next(), Some(&ENode::leaf("x")));
    }
}
