use std::fmt::Debug;
use std::hash::Hash;

use indexmap::IndexMap;
use thiserror::Error;

use crate::Id;

/// Errors reported by the general-purpose [`UnionFind`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnionFindError {
    /// The element was never registered with `make_set`.
    #[error("element {0} was never registered with make_set")]
    UnregisteredElement(String),
}

/// A disjoint-set structure over densely allocated [`Id`]s, used
/// internally by the [`EGraph`](crate::EGraph).
///
/// Unlike [`UnionFind`], this variant never fails: ids are allocated
/// externally by the graph, so any id it has not seen yet is lazily
/// registered as its own singleton set. It also takes no stance on
/// which root survives a merge; the graph picks the winner by class
/// size and calls [`join`](DenseUnionFind::join).
#[derive(Debug, Clone, Default)]
pub struct DenseUnionFind {
    parents: Vec<Id>,
}

impl DenseUnionFind {
    fn parent(&self, query: Id) -> Id {
        self.parents[usize::from(query)]
    }

    fn parent_mut(&mut self, query: Id) -> &mut Id {
        &mut self.parents[usize::from(query)]
    }

    /// Lazily registers every id up to and including `id`.
    fn ensure(&mut self, id: Id) {
        while self.parents.len() <= usize::from(id) {
            self.make_set();
        }
    }

    /// Creates a new set with a single, freshly allocated element.
    pub fn make_set(&mut self) -> Id {
        let id = Id::from(self.parents.len());
        self.parents.push(id);
        id
    }

    /// Returns the number of elements registered so far.
    pub fn size(&self) -> usize {
        self.parents.len()
    }

    /// Finds the leader of the set that `current` is in.
    ///
    /// Read-only: performs no path compression. An id that was never
    /// registered is its own leader.
    pub fn find(&self, mut current: Id) -> Id {
        if usize::from(current) >= self.parents.len() {
            return current;
        }
        while current != self.parent(current) {
            current = self.parent(current)
        }
        current
    }

    /// Finds the leader of the set that `current` is in.
    /// This version updates the parents to compress the path.
    pub fn find_mut(&mut self, mut current: Id) -> Id {
        self.ensure(current);
        let mut collected = vec![];
        while current != self.parent(current) {
            collected.push(current);
            current = self.parent(current);
        }
        for c in collected {
            *self.parent_mut(c) = current;
        }
        current
    }

    /// Reparents `loser` under `winner`. Both ids must be canonical.
    pub(crate) fn join(&mut self, winner: Id, loser: Id) {
        self.ensure(winner);
        self.ensure(loser);
        debug_assert_eq!(self.find(winner), winner);
        debug_assert_eq!(self.find(loser), loser);
        *self.parent_mut(loser) = winner;
    }
}

/// A general-purpose disjoint-set structure over arbitrary keys, with
/// union by rank and path compression.
///
/// Unlike [`DenseUnionFind`] this variant requires every key to be
/// registered with [`make_set`](UnionFind::make_set) up front;
/// querying an unknown key fails with
/// [`UnionFindError::UnregisteredElement`].
#[derive(Debug, Clone)]
pub struct UnionFind<K: Clone + Hash + Eq> {
    slots: IndexMap<K, usize>,
    parents: Vec<usize>,
    ranks: Vec<u32>,
}

impl<K: Clone + Hash + Eq> Default for UnionFind<K> {
    fn default() -> Self {
        UnionFind {
            slots: IndexMap::default(),
            parents: vec![],
            ranks: vec![],
        }
    }
}

impl<K: Clone + Hash + Eq + Debug> UnionFind<K> {
    /// Registers `k` as its own singleton set. Idempotent.
    pub fn make_set(&mut self, k: K) {
        if self.slots.contains_key(&k) {
            return;
        }
        let slot = self.parents.len();
        self.slots.insert(k, slot);
        self.parents.push(slot);
        self.ranks.push(0);
    }

    /// Returns the number of registered elements.
    pub fn size(&self) -> usize {
        self.parents.len()
    }

    fn slot_of(&self, k: &K) -> Result<usize, UnionFindError> {
        self.slots
            .get(k)
            .copied()
            .ok_or_else(|| UnionFindError::UnregisteredElement(format!("{:?}", k)))
    }

    fn key_of(&self, slot: usize) -> K {
        // Slots are only ever handed out by make_set.
        self.slots.get_index(slot).unwrap().0.clone()
    }

    fn root_of(&self, mut slot: usize) -> usize {
        while slot != self.parents[slot] {
            slot = self.parents[slot];
        }
        slot
    }

    fn root_of_mut(&mut self, mut slot: usize) -> usize {
        let mut collected = vec![];
        while slot != self.parents[slot] {
            collected.push(slot);
            slot = self.parents[slot];
        }
        for c in collected {
            self.parents[c] = slot;
        }
        slot
    }

    /// Finds the representative of the set that `k` is in.
    ///
    /// Read-only: performs no path compression.
    pub fn find(&self, k: &K) -> Result<K, UnionFindError> {
        let slot = self.slot_of(k)?;
        Ok(self.key_of(self.root_of(slot)))
    }

    /// Finds the representative of the set that `k` is in.
    /// This version updates the parents to compress the path.
    pub fn find_mut(&mut self, k: &K) -> Result<K, UnionFindError> {
        let slot = self.slot_of(k)?;
        let root = self.root_of_mut(slot);
        Ok(self.key_of(root))
    }

    /// Merges the sets containing `x` and `y`, returning the
    /// surviving representative.
    ///
    /// No-op if they are already in the same set. Otherwise the
    /// lower-rank root is attached under the higher-rank root; on a
    /// rank tie, `y`'s root is attached under `x`'s root and the
    /// surviving rank is incremented.
    pub fn union(&mut self, x: &K, y: &K) -> Result<K, UnionFindError> {
        let root_x = self.root_of_mut(self.slot_of(x)?);
        let root_y = self.root_of_mut(self.slot_of(y)?);
        if root_x == root_y {
            return Ok(self.key_of(root_x));
        }
        let survivor = if self.ranks[root_x] < self.ranks[root_y] {
            self.parents[root_x] = root_y;
            root_y
        } else {
            if self.ranks[root_x] == self.ranks[root_y] {
                self.ranks[root_x] += 1;
            }
            self.parents[root_y] = root_x;
            root_x
        };
        Ok(self.key_of(survivor))
    }
}
