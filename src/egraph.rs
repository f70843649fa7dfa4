use std::fmt;
use std::fmt::Debug;

use indexmap::IndexMap;
use log::{debug, trace};
use thiserror::Error;

use crate::eclass::EClass;
use crate::enode::ENode;
use crate::unionfind::DenseUnionFind;
use crate::util::UniqueQueue;
use crate::{Id, Symbol};

/// Errors reported by [`EGraph`] operations.
///
/// No operation retries or rolls back: if a mutating call returns an
/// error the graph's state is unspecified and should be discarded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EGraphError {
    /// The id was never allocated by this graph's [`EGraph::add`].
    #[error("eclass id {0} was never allocated by this egraph")]
    UnknownId(Id),
    /// The canonical id has no live eclass behind it.
    #[error("no live eclass found for canonical id {0}")]
    ClassNotFound(Id),
    /// A node's declared arity does not match its children.
    #[error("operator {op} declared with arity {arity} but given {len} children")]
    MalformedNode {
        /// The operator of the offending node.
        op: Symbol,
        /// The declared arity.
        arity: usize,
        /// The actual number of children.
        len: usize,
    },
}

type SparseVec<T> = Vec<Option<Box<T>>>;

/** A data structure to keep track of equalities between expressions.

An egraph conceptually is a set of eclasses, each of which contains
equivalent enodes. An enode is an operator with children eclass ids,
so the graph can compactly represent exponentially many equivalent
expressions.

# Invariants and rebuilding

The egraph maintains its congruence invariant lazily. [`union`]ing
two classes can make enodes elsewhere in the graph refer to stale,
merged-away children, hiding congruences that should now hold (after
`x = 1`, any existing `f(x)` must become congruent with `f(1)`).
Callers must run [`rebuild`] after a batch of unions before trusting
[`find`] for canonical lookups or [`extract`]ing terms; in between,
results may be stale.

[`union`]: struct.EGraph.html#method.union
[`rebuild`]: struct.EGraph.html#method.rebuild
[`find`]: struct.EGraph.html#method.find
[`extract`]: struct.EGraph.html#method.extract
**/
#[derive(Clone, Default)]
pub struct EGraph {
    pub(crate) memo: IndexMap<ENode, Id>,
    unionfind: DenseUnionFind,
    classes: SparseVec<EClass>,
    repairs_since_rebuild: usize,
}

// manual debug impl, deriving it would dump the unionfind parents too
impl Debug for EGraph {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EGraph")
            .field("memo", &self.memo)
            .field("classes", &self.classes)
            .finish()
    }
}

impl EGraph {
    /// Creates a new, empty `EGraph`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return total number of ids ever allocated, live or merged away.
    pub fn id_len(&self) -> usize {
        self.classes.len()
    }

    /// Returns an iterator over the live eclasses in the egraph.
    pub fn classes(&self) -> impl Iterator<Item = &EClass> {
        self.classes
            .iter()
            .filter_map(Option::as_ref)
            .map(AsRef::as_ref)
    }

    /// Returns `true` if the egraph is empty.
    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    /// Returns the number of enodes in the `EGraph`.
    ///
    /// Actually returns the size of the hashcons index.
    pub fn total_size(&self) -> usize {
        self.memo.len()
    }

    /// Iterates over the classes, returning the total number of nodes.
    pub fn total_number_of_nodes(&self) -> usize {
        self.classes().map(|c| c.len()).sum()
    }

    /// Returns the number of live eclasses in the egraph.
    pub fn number_of_classes(&self) -> usize {
        self.classes().count()
    }

    fn check_known(&self, id: Id) -> Result<(), EGraphError> {
        if usize::from(id) < self.classes.len() {
            Ok(())
        } else {
            Err(EGraphError::UnknownId(id))
        }
    }

    /// Canonicalizes an eclass id.
    ///
    /// This corresponds to the `find` operation on the egraph's
    /// underlying unionfind data structure. Safe to call at any time,
    /// but only trustworthy for congruence queries after a
    /// [`rebuild`](EGraph::rebuild).
    ///
    /// # Example
    /// ```
    /// use congruence::{EGraph, ENode};
    /// let mut egraph = EGraph::default();
    /// let x = egraph.add(ENode::leaf("x")).unwrap();
    /// let y = egraph.add(ENode::leaf("y")).unwrap();
    /// assert_ne!(egraph.find(x).unwrap(), egraph.find(y).unwrap());
    ///
    /// egraph.union(x, y).unwrap();
    /// assert_eq!(egraph.find(x).unwrap(), egraph.find(y).unwrap());
    /// ```
    pub fn find(&self, id: Id) -> Result<Id, EGraphError> {
        self.check_known(id)?;
        Ok(self.unionfind.find(id))
    }

    /// Looks up an enode in the egraph without inserting it,
    /// resolving the hit through `find`.
    pub fn lookup(&self, enode: &ENode) -> Option<Id> {
        self.memo.get(enode).map(|&id| self.unionfind.find(id))
    }

    /// Returns a copy of `enode` with every child id canonicalized.
    pub fn canonize(&self, enode: &ENode) -> Result<ENode, EGraphError> {
        for &child in enode.children() {
            self.check_known(child)?;
        }
        Ok(self.canonize_unchecked(enode))
    }

    fn canonize_unchecked(&self, enode: &ENode) -> ENode {
        let mut res = enode.clone();
        res.update_children(|id| self.unionfind.find(id));
        res
    }

    /// Returns the live eclass that `id` canonicalizes to.
    pub fn eclass(&self, id: Id) -> Result<&EClass, EGraphError> {
        let root = self.find(id)?;
        self.classes[usize::from(root)]
            .as_deref()
            .ok_or(EGraphError::ClassNotFound(root))
    }

    /// Adds an enode to the egraph, returning the canonical id of its
    /// eclass.
    ///
    /// Adding performs _hashconsing_ (sometimes called interning in
    /// other contexts): if a structurally identical enode is already
    /// present, the canonical id of its eclass is returned and
    /// nothing is allocated. Otherwise a fresh eclass is created, and
    /// composite enodes are checked for congruence against every
    /// enode already known (same operator, same arity, children
    /// pairwise canonically equal). The first congruent match in
    /// insertion order wins and the two classes are unioned.
    ///
    /// The returned id is canonical at the moment of return, but
    /// later unions can make it stale; re-canonicalize through
    /// [`find`](EGraph::find) before reuse.
    ///
    /// Fails with [`EGraphError::UnknownId`] if a child id was never
    /// allocated by this graph.
    pub fn add(&mut self, enode: ENode) -> Result<Id, EGraphError> {
        for &child in enode.children() {
            self.check_known(child)?;
        }
        if let Some(&existing) = self.memo.get(&enode) {
            trace!("add: {} already known", enode);
            return Ok(self.unionfind.find_mut(existing));
        }

        let id = self.unionfind.make_set();
        debug_assert_eq!(usize::from(id), self.classes.len());
        trace!("add: {} -> fresh class {}", enode, id);
        self.classes
            .push(Some(Box::new(EClass::singleton(id, enode.clone()))));
        self.memo.insert(enode.clone(), id);

        if enode.is_leaf() {
            return Ok(id);
        }

        // Scan order is memo insertion order; the first congruent
        // match wins and ends the scan.
        let mut congruent = None;
        for (other, &other_id) in &self.memo {
            if other_id == id {
                continue;
            }
            if other.op() != enode.op() || other.arity() != enode.arity() {
                continue;
            }
            let children_match = other
                .children()
                .iter()
                .zip(enode.children())
                .all(|(&a, &b)| self.unionfind.find(a) == self.unionfind.find(b));
            if children_match {
                congruent = Some(self.unionfind.find(other_id));
                break;
            }
        }

        match congruent {
            Some(other) => {
                trace!("add: {} congruent with class {}", enode, other);
                self.union(id, other)
            }
            None => Ok(id),
        }
    }

    /// Unions two eclasses given their ids, returning the surviving
    /// canonical id.
    ///
    /// The given ids need not be canonical. If they already
    /// canonicalize to the same class this is a no-op. Otherwise the
    /// class with the larger node set survives; on a tie the first
    /// argument's class wins. The losing class is deleted, though its
    /// id remains a valid lookup key that canonicalizes to the winner
    /// forever after.
    ///
    /// This deliberately does not re-check congruence of the merged
    /// node set against the rest of the graph; that is
    /// [`rebuild`](EGraph::rebuild)'s job.
    pub fn union(&mut self, id1: Id, id2: Id) -> Result<Id, EGraphError> {
        self.check_known(id1)?;
        self.check_known(id2)?;
        let root1 = self.unionfind.find_mut(id1);
        let root2 = self.unionfind.find_mut(id2);
        if root1 == root2 {
            return Ok(root1);
        }

        let size1 = self.eclass(root1)?.len();
        let size2 = self.eclass(root2)?.len();
        let (winner, loser) = if size2 > size1 {
            (root2, root1)
        } else {
            // root1 wins ties
            (root1, root2)
        };
        trace!("union: class {} absorbs class {}", winner, loser);

        self.unionfind.join(winner, loser);
        let from = self.classes[usize::from(loser)]
            .take()
            .ok_or(EGraphError::ClassNotFound(loser))?;
        let to = self.classes[usize::from(winner)]
            .as_mut()
            .ok_or(EGraphError::ClassNotFound(winner))?;
        for node in from.nodes {
            self.memo.insert(node.clone(), winner);
            to.nodes.insert(node);
        }
        Ok(winner)
    }

    /// Restores the egraph invariants of congruence and enode
    /// uniqueness, returning the number of enode repairs performed.
    ///
    /// The egraph maintains its invariants lazily: after a batch of
    /// [`union`](EGraph::union)s, enodes may refer to merged-away
    /// children and hide congruences. `rebuild` runs a worklist
    /// fixpoint: every enode whose children are no longer canonical
    /// is rewritten in canonical form, re-added (which may discover a
    /// new congruence and trigger further unions), and re-enqueued
    /// until everything is stable. Entries whose arguments did not
    /// change are dropped without requeueing, and the worklist
    /// deduplicates pending entries, so the pass terminates.
    ///
    /// After `rebuild` returns, every live class id is its own
    /// canonical root and congruent enodes share a class.
    pub fn rebuild(&mut self) -> Result<usize, EGraphError> {
        let start = instant::Instant::now();
        let old_memo_size = self.memo.len();
        let old_n_classes = self.number_of_classes();

        let mut worklist: UniqueQueue<(ENode, Id)> = self
            .memo
            .iter()
            .map(|(node, &id)| (node.clone(), id))
            .collect();

        while let Some((node, stored)) = worklist.pop() {
            if !self.memo.contains_key(&node) {
                // Already rewritten away under an earlier entry. A
                // stale node can never re-enter the memo, so skipping
                // is sound.
                continue;
            }
            let class_id = self.unionfind.find_mut(stored);
            let canon = self.canonize_unchecked(&node);
            if canon == node {
                continue;
            }

            self.repairs_since_rebuild += 1;
            trace!("rebuild: rewriting {} in class {} to {}", node, class_id, canon);

            // Drop the stale node. Removals must preserve memo
            // insertion order, which is add's congruence scan order.
            self.memo.shift_remove(&node);
            let class = self.classes[usize::from(class_id)]
                .as_mut()
                .ok_or(EGraphError::ClassNotFound(class_id))?;
            class.nodes.shift_remove(&node);

            let new_id = self.add(canon.clone())?;
            if self.unionfind.find_mut(class_id) != self.unionfind.find_mut(new_id) {
                self.union(class_id, new_id)?;
            }
            // Rewriting can itself create further staleness.
            worklist.insert((canon, self.unionfind.find_mut(new_id)));
        }

        let repairs = std::mem::take(&mut self.repairs_since_rebuild);
        let elapsed = start.elapsed();
        debug!(
            "rebuilt in {}.{:03}s: hashcons {} -> {}, eclasses {} -> {}, repairs: {}",
            elapsed.as_secs(),
            elapsed.subsec_millis(),
            old_memo_size,
            self.memo.len(),
            old_n_classes,
            self.number_of_classes(),
            repairs,
        );
        Ok(repairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_unions_merge_ids() {
        crate::init_logger();
        let mut egraph = EGraph::default();

        let x = egraph.add(ENode::leaf("x")).unwrap();
        let y = egraph.add(ENode::leaf("y")).unwrap();
        assert_ne!(x, y);

        egraph.union(x, y).unwrap();
        assert_eq!(egraph.find(x).unwrap(), egraph.find(y).unwrap());
    }

    #[test]
    fn add_dedups_structurally() {
        crate::init_logger();
        let mut egraph = EGraph::default();

        let x1 = egraph.add(ENode::leaf("x")).unwrap();
        let x2 = egraph.add(ENode::leaf("x")).unwrap();
        assert_eq!(x1, x2);

        let f1 = egraph.add(ENode::new("f", vec![x1])).unwrap();
        let f2 = egraph.add(ENode::new("f", vec![x2])).unwrap();
        assert_eq!(f1, f2);
        assert_eq!(egraph.total_size(), 2);
        assert_eq!(egraph.number_of_classes(), 2);
    }

    #[test]
    fn add_discovers_congruence_immediately() {
        crate::init_logger();
        let mut egraph = EGraph::default();

        let x = egraph.add(ENode::leaf("x")).unwrap();
        let y = egraph.add(ENode::leaf("y")).unwrap();
        egraph.union(x, y).unwrap();

        // f(x) and f(y) are structurally distinct, but their children
        // are already canonically equal when f(y) is added.
        let fx = egraph.add(ENode::new("f", vec![x])).unwrap();
        let fy = egraph.add(ENode::new("f", vec![y])).unwrap();
        assert_eq!(egraph.find(fx).unwrap(), egraph.find(fy).unwrap());
    }

    #[test]
    fn union_is_idempotent() {
        crate::init_logger();
        let mut egraph = EGraph::default();

        let x = egraph.add(ENode::leaf("x")).unwrap();
        let y = egraph.add(ENode::leaf("y")).unwrap();
        let root = egraph.union(x, y).unwrap();

        let classes_before = egraph.number_of_classes();
        let nodes_before = egraph.eclass(root).unwrap().nodes.clone();

        let again = egraph.union(x, y).unwrap();
        assert_eq!(again, egraph.find(x).unwrap());
        assert_eq!(egraph.number_of_classes(), classes_before);
        assert_eq!(egraph.eclass(root).unwrap().nodes, nodes_before);
    }

    #[test]
    fn union_keeps_the_larger_class() {
        crate::init_logger();
        let mut egraph = EGraph::default();

        let a1 = egraph.add(ENode::leaf("a1")).unwrap();
        let a2 = egraph.add(ENode::leaf("a2")).unwrap();
        let big = egraph.union(a1, a2).unwrap();
        assert_eq!(egraph.eclass(big).unwrap().len(), 2);

        // The second argument has the bigger node set, so it survives
        // even though it is not the first argument.
        let b = egraph.add(ENode::leaf("b")).unwrap();
        let root = egraph.union(b, big).unwrap();
        assert_eq!(root, big);
        assert_eq!(egraph.find(b).unwrap(), big);
    }

    #[test]
    fn union_tie_break_favors_first_argument() {
        crate::init_logger();
        let mut egraph = EGraph::default();

        let a = egraph.add(ENode::leaf("a")).unwrap();
        let b = egraph.add(ENode::leaf("b")).unwrap();
        // Both singletons, so the first argument's class wins.
        assert_eq!(egraph.union(b, a).unwrap(), b);
    }

    #[test]
    fn rebuild_restores_congruence() {
        crate::init_logger();
        let mut egraph = EGraph::default();

        let x = egraph.add(ENode::leaf("x")).unwrap();
        let y = egraph.add(ENode::leaf("y")).unwrap();
        let fx = egraph.add(ENode::new("f", vec![x])).unwrap();
        let fy = egraph.add(ENode::new("f", vec![y])).unwrap();

        // The effects of this union aren't yet visible; fx and fy
        // should be equivalent by congruence since x = y.
        egraph.union(x, y).unwrap();
        assert_ne!(egraph.find(fx).unwrap(), egraph.find(fy).unwrap());
        assert_eq!(egraph.number_of_classes(), 3);

        let repairs = egraph.rebuild().unwrap();
        assert!(repairs > 0);
        assert_eq!(egraph.find(fx).unwrap(), egraph.find(fy).unwrap());
        assert_eq!(egraph.number_of_classes(), 2);
    }

    #[test]
    fn rebuild_chases_congruence_through_nesting() {
        crate::init_logger();
        let mut egraph = EGraph::default();

        let x = egraph.add(ENode::leaf("x")).unwrap();
        let y = egraph.add(ENode::leaf("y")).unwrap();
        let gx = egraph.add(ENode::new("g", vec![x])).unwrap();
        let gy = egraph.add(ENode::new("g", vec![y])).unwrap();
        let fgx = egraph.add(ENode::new("f", vec![gx])).unwrap();
        let fgy = egraph.add(ENode::new("f", vec![gy])).unwrap();

        egraph.union(x, y).unwrap();
        egraph.rebuild().unwrap();

        // One rewrite cascades into the next: g(x) = g(y) forces
        // f(g(x)) = f(g(y)).
        assert_eq!(egraph.find(gx).unwrap(), egraph.find(gy).unwrap());
        assert_eq!(egraph.find(fgx).unwrap(), egraph.find(fgy).unwrap());
    }

    #[test]
    fn arithmetic_unions_propagate_after_rebuild() {
        crate::init_logger();
        let mut egraph = EGraph::default();

        let x = egraph.add(ENode::leaf("x")).unwrap();
        let y = egraph.add(ENode::leaf("y")).unwrap();
        let one = egraph.add(ENode::leaf("1")).unwrap();
        let two = egraph.add(ENode::leaf("2")).unwrap();
        let three = egraph.add(ENode::leaf("3")).unwrap();
        let one_plus_two = egraph.add(ENode::new("+", vec![one, two])).unwrap();
        // note that 2 + 1 is never unioned directly with anything
        let two_plus_one = egraph.add(ENode::new("+", vec![two, one])).unwrap();

        egraph.union(x, one).unwrap();
        egraph.union(y, two).unwrap();
        egraph.union(one_plus_two, three).unwrap();
        let xy = egraph.add(ENode::new("+", vec![x, y])).unwrap();
        let yx = egraph.add(ENode::new("+", vec![y, x])).unwrap();
        egraph.union(xy, yx).unwrap();

        egraph.rebuild().unwrap();

        // x + y = y + x and x = 1, y = 2, so 1 + 2 = 2 + 1 = 3.
        assert_eq!(
            egraph.find(one_plus_two).unwrap(),
            egraph.find(two_plus_one).unwrap()
        );
        assert_eq!(
            egraph.find(two_plus_one).unwrap(),
            egraph.find(three).unwrap()
        );
    }

    #[test]
    fn identical_sequences_canonicalize_identically() {
        crate::init_logger();
        let build = || {
            let mut egraph = EGraph::default();
            let x = egraph.add(ENode::leaf("x")).unwrap();
            let y = egraph.add(ENode::leaf("y")).unwrap();
            let z = egraph.add(ENode::leaf("z")).unwrap();
            let fxy = egraph.add(ENode::new("f", vec![x, y])).unwrap();
            let fxz = egraph.add(ENode::new("f", vec![x, z])).unwrap();
            egraph.union(y, z).unwrap();
            egraph.union(x, fxy).unwrap();
            egraph.rebuild().unwrap();
            (egraph, vec![x, y, z, fxy, fxz])
        };

        let (egraph1, ids1) = build();
        let (egraph2, ids2) = build();
        assert_eq!(ids1, ids2);
        for (&a, &b) in ids1.iter().zip(&ids2) {
            assert_eq!(egraph1.find(a).unwrap(), egraph2.find(b).unwrap());
        }
        assert_eq!(egraph1.number_of_classes(), egraph2.number_of_classes());
    }

    #[test]
    fn merged_away_ids_stay_valid() {
        crate::init_logger();
        let mut egraph = EGraph::default();

        let a = egraph.add(ENode::leaf("a")).unwrap();
        let b = egraph.add(ENode::leaf("b")).unwrap();
        let c = egraph.add(ENode::leaf("c")).unwrap();
        let root = egraph.union(a, b).unwrap();
        let root = egraph.union(root, c).unwrap();
        egraph.rebuild().unwrap();

        for id in [a, b, c] {
            assert_eq!(egraph.find(id).unwrap(), root);
        }
        // The merged-away classes themselves are gone.
        assert_eq!(egraph.number_of_classes(), 1);
        assert_eq!(egraph.id_len(), 3);
    }

    #[test]
    fn unknown_ids_are_rejected() {
        crate::init_logger();
        let mut egraph = EGraph::default();
        let x = egraph.add(ENode::leaf("x")).unwrap();
        let bogus = Id(42);

        assert_eq!(egraph.find(bogus), Err(EGraphError::UnknownId(bogus)));
        assert_eq!(egraph.union(x, bogus), Err(EGraphError::UnknownId(bogus)));
        assert_eq!(
            egraph.add(ENode::new("f", vec![bogus])),
            Err(EGraphError::UnknownId(bogus))
        );
        assert!(egraph.canonize(&ENode::new("f", vec![bogus])).is_err());
    }

    #[test]
    fn lookup_resolves_through_find() {
        crate::init_logger();
        let mut egraph = EGraph::default();

        let x = egraph.add(ENode::leaf("x")).unwrap();
        let y = egraph.add(ENode::leaf("y")).unwrap();
        assert_eq!(egraph.lookup(&ENode::leaf("x")), Some(x));
        assert_eq!(egraph.lookup(&ENode::leaf("w")), None);

        let root = egraph.union(x, y).unwrap();
        assert_eq!(egraph.lookup(&ENode::leaf("x")), Some(root));
        assert_eq!(egraph.lookup(&ENode::leaf("y")), Some(root));
    }
}
