/*!

`congruence` maintains an equality graph (e-graph) over symbolic
expressions: a congruence-closure data structure that lets you assert
that two expressions are equal, automatically derives every equality
implied by function congruence (if `a = b` then `f(a) = f(b)`), and
extracts a cheapest representative expression for any equivalence
class.

The core workflow is:

1. Build expressions bottom-up with [`EGraph::add`], leaves first.
2. Assert equalities with [`EGraph::union`].
3. Call [`EGraph::rebuild`] to restore the congruence invariant.
4. Query with [`EGraph::find`] or pull out terms with
   [`EGraph::extract`].

Between a batch of unions and the next `rebuild` the graph is allowed
to be inconsistent; `rebuild` runs a worklist fixpoint that rewrites
stale enodes and merges newly congruent classes.

# Example

```
use congruence::{EGraph, ENode};

let mut egraph = EGraph::default();
let x = egraph.add(ENode::leaf("x")).unwrap();
let y = egraph.add(ENode::leaf("y")).unwrap();
let fx = egraph.add(ENode::new("f", vec![x])).unwrap();
let fy = egraph.add(ENode::new("f", vec![y])).unwrap();
assert_ne!(egraph.find(fx).unwrap(), egraph.find(fy).unwrap());

egraph.union(x, y).unwrap();
egraph.rebuild().unwrap();
assert_eq!(egraph.find(fx).unwrap(), egraph.find(fy).unwrap());
```

!*/

mod eclass;
mod egraph;
mod enode;
mod extract;
mod unionfind;
mod util;

/// A key to identify [`EClass`](struct.EClass.html)es within an
/// [`EGraph`](struct.EGraph.html).
///
/// Ids are plain integers, monotonically assigned by
/// [`EGraph::add`](struct.EGraph.html#method.add), and stay valid
/// lookup keys for the lifetime of the graph even after their class
/// has been merged away.
#[derive(Clone, Copy, Default, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct Id(pub u32);

impl From<usize> for Id {
    fn from(n: usize) -> Id {
        Id(n as u32)
    }
}

impl From<u32> for Id {
    fn from(n: u32) -> Id {
        Id(n)
    }
}

impl From<Id> for usize {
    fn from(id: Id) -> usize {
        id.0 as usize
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub use {
    eclass::EClass,
    egraph::{EGraph, EGraphError},
    enode::ENode,
    extract::Expr,
    unionfind::{DenseUnionFind, UnionFind, UnionFindError},
    util::Symbol,
};

#[cfg(test)]
fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}
