//! Structural deduplication of nodes.
//!
//! [`obtain_node`] is the single entry point for creating nodes.  It keys
//! each candidate by `(parent ids, operator key)` and consults a
//! process-wide bijection: an existing node is returned as-is, a new one
//! is interned.  Parents are compared by identity, not by content: they
//! were themselves already interned, so identity is structural equality.
//!
//! Lookups take a shared lock and proceed in parallel; insertion is
//! exclusive with a double-check under the write lock.  Entries persist
//! for the process lifetime (nodes are cheap and shared across
//! evaluations).  Tests isolate themselves with [`IdentityMap::scoped`],
//! which installs a fresh thread-local map for the duration of a closure.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::trace;
use once_cell::sync::Lazy;

use crate::error::Result;
use crate::graph::node::{Node, NodeId};
use crate::ops::{Op, OpKey};
use crate::value::ValueType;

type InternKey = (Vec<NodeId>, OpKey);

/// The interning table mapping structural keys to nodes.
#[derive(Default)]
pub struct IdentityMap {
    nodes: RwLock<HashMap<InternKey, Node>>,
}

static GLOBAL: Lazy<IdentityMap> = Lazy::new(IdentityMap::default);

thread_local! {
    static SCOPED: RefCell<Vec<Arc<IdentityMap>>> = const { RefCell::new(Vec::new()) };
}

impl IdentityMap {
    /// Run `f` against a fresh, thread-local identity map.
    ///
    /// Nodes interned inside the scope are invisible outside it and
    /// vice versa; scopes nest.
    pub fn scoped<R>(f: impl FnOnce() -> R) -> R {
        SCOPED.with(|stack| stack.borrow_mut().push(Arc::new(IdentityMap::default())));
        let result = f();
        SCOPED.with(|stack| stack.borrow_mut().pop());
        result
    }

    fn with_current<R>(f: impl FnOnce(&IdentityMap) -> R) -> R {
        let scoped = SCOPED.with(|stack| stack.borrow().last().cloned());
        match scoped {
            Some(map) => f(&map),
            None => f(&GLOBAL),
        }
    }

    fn obtain(&self, parents: Vec<Node>, op: Arc<dyn Op>) -> Result<Node> {
        // Infer the output type first: construction-time errors must
        // surface before anything is interned.
        let parent_types: Vec<ValueType> = parents.iter().map(Node::value_type).collect();
        let value_type = op.output_type(&parent_types)?;

        let key: InternKey = (parents.iter().map(Node::id).collect(), op.key());
        if let Some(existing) = self.nodes.read().unwrap().get(&key) {
            return Ok(existing.clone());
        }

        let mut nodes = self.nodes.write().unwrap();
        // Double-check: another thread may have interned between locks.
        if let Some(existing) = nodes.get(&key) {
            return Ok(existing.clone());
        }
        let node = Node::new(NodeId::fresh(), parents, op, value_type);
        trace!("interned {:?} ({} nodes live)", node, nodes.len() + 1);
        nodes.insert(key, node.clone());
        Ok(node)
    }
}

/// Intern or retrieve the node with the given parents and operator.
pub fn obtain_node(parents: Vec<Node>, op: Arc<dyn Op>) -> Result<Node> {
    IdentityMap::with_current(|map| map.obtain(parents, op))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ops::source::constant;
    use crate::value::Value;

    #[test]
    fn interning_is_idempotent() {
        IdentityMap::scoped(|| {
            let a = constant(Value::Int(1)).unwrap();
            let b = constant(Value::Int(1)).unwrap();
            let c = constant(Value::Int(2)).unwrap();
            assert_eq!(a, b);
            assert_ne!(a, c);
        });
    }

    #[test]
    fn scopes_isolate() {
        let outer = IdentityMap::scoped(|| constant(Value::Int(7)).unwrap());
        let inner = IdentityMap::scoped(|| constant(Value::Int(7)).unwrap());
        // Same structure, different scopes: different nodes.
        assert_ne!(outer, inner);
    }
}
