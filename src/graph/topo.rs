//! Ancestor enumeration and topological ordering.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::graph::node::{Node, NodeId};

/// All ancestors of `root`, including `root` itself, in discovery order.
pub fn ancestors(root: &Node) -> Vec<Node> {
    let mut seen: HashMap<NodeId, ()> = HashMap::new();
    let mut stack = vec![root.clone()];
    let mut out = Vec::new();

    while let Some(node) = stack.pop() {
        if seen.insert(node.id(), ()).is_some() {
            continue;
        }
        stack.extend(node.parents().iter().cloned());
        out.push(node);
    }
    out
}

/// Ancestors of `root` ordered so that parents precede children.
pub fn topological(root: &Node) -> Vec<Node> {
    let nodes: HashMap<NodeId, Node> = ancestors(root)
        .into_iter()
        .map(|n| (n.id(), n))
        .collect();

    let mut graph = DiGraphMap::<NodeId, ()>::new();
    for node in nodes.values() {
        graph.add_node(node.id());
        for parent in node.parents() {
            graph.add_edge(parent.id(), node.id(), ());
        }
    }

    // Parents are fixed at construction and nodes are immutable, so the
    // graph cannot contain a cycle.
    toposort(&graph, None)
        .unwrap_or_else(|e| panic!("cycle in node graph: {:?}", e))
        .into_iter()
        .map(|id| nodes[&id].clone())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::identity::IdentityMap;
    use crate::ops::source::data_node;
    use crate::time::Timestamp;
    use crate::value::Value;

    fn source(v: i64) -> Node {
        let t = Timestamp::from_ymd(2000, 1, 1).unwrap();
        data_node(vec![(t, Value::Int(v))]).unwrap()
    }

    #[test]
    fn parents_precede_children() {
        IdentityMap::scoped(|| {
            let a = source(1);
            let b = source(2);
            let sum = (&a + &b) + &a;

            let order = topological(&sum);
            assert_eq!(order.len(), 4);
            let pos = |n: &Node| order.iter().position(|m| m == n).unwrap();
            for node in &order {
                for parent in node.parents() {
                    assert!(pos(parent) < pos(node));
                }
            }
            assert_eq!(order.last(), Some(&sum));
        });
    }

    #[test]
    fn diamond_is_enumerated_once() {
        IdentityMap::scoped(|| {
            let a = source(1);
            let left = &a + 1.0;
            let right = &a + 2.0;
            let top = &left + &right;
            // a, two lifted scalars, two sums, the top: six nodes, with
            // the shared source counted once.
            assert_eq!(ancestors(&top).len(), 6);
        });
    }
}
