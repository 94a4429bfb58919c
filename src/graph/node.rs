//! Graph vertices.
//!
//! A [`Node`] wraps an operator together with its ordered parents.  Nodes
//! are immutable after creation and interned by the identity map, so node
//! identity *is* structural identity: two constructions with the same
//! parents and operator key yield the same `Arc`.

use std::fmt::{self, Debug, Display, Write};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ops::Op;
use crate::value::{Value, ValueType};

/// Process-unique id of an interned node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

impl NodeId {
    pub(crate) fn fresh() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('n')?;
        Debug::fmt(&self.0, f)
    }
}

struct NodeInner {
    id: NodeId,
    parents: Vec<Node>,
    op: Arc<dyn Op>,
    value_type: ValueType,
}

/// A vertex of the computation DAG.
///
/// Cheap to clone; equality and hashing go by interned identity.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

impl Node {
    pub(crate) fn new(id: NodeId, parents: Vec<Node>, op: Arc<dyn Op>, value_type: ValueType) -> Self {
        Self(Arc::new(NodeInner {
            id,
            parents,
            op,
            value_type,
        }))
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// Ordered parent nodes.
    pub fn parents(&self) -> &[Node] {
        &self.0.parents
    }

    pub fn op(&self) -> &Arc<dyn Op> {
        &self.0.op
    }

    /// The type of value this node emits.
    pub fn value_type(&self) -> ValueType {
        self.0.value_type
    }

    /// The value of a constant node, if this is one.
    pub fn constant_value(&self) -> Option<&Value> {
        self.0.op.constant_value()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.0.op.name(), self.0.id)
    }
}
