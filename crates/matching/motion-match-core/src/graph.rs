//! Handle-based directed graph of search results.
//!
//! Nodes and edges live in flat arenas keyed by stable integer handles;
//! adjacency is handle lists, so deletion is "remove from the arena and fix
//! up the lists" with no dangling references. Handle 0 is always the unique
//! root and represents the query.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::segment::AnimationSegment;
use crate::web::MatchPoint;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(pub u32);

impl NodeHandle {
    pub const ROOT: NodeHandle = NodeHandle(0);
}

#[derive(Clone, Debug)]
pub struct GraphNode {
    pub handle: NodeHandle,
    pub segment: AnimationSegment,
    pub prev: Vec<NodeHandle>,
    pub next: Vec<NodeHandle>,
}

/// Edge payload: the temporally-ordered match sequence between the two
/// nodes' segments and its average grid distance. At most one edge exists
/// per node pair; the key is the canonical (min, max) handle pair.
#[derive(Clone, Debug)]
pub struct GraphEdge {
    pub nodes: (NodeHandle, NodeHandle),
    pub points: Vec<MatchPoint>,
    pub cost: f32,
}

/// A shortest-path answer for one target.
#[derive(Clone, Debug, PartialEq)]
pub struct NodePath {
    pub target: NodeHandle,
    pub nodes: Vec<NodeHandle>,
    pub cost: f32,
}

fn edge_key(a: NodeHandle, b: NodeHandle) -> (NodeHandle, NodeHandle) {
    (a.min(b), a.max(b))
}

/// Per-query result graph with Dijkstra shortest paths and prune-on-delete.
/// Results are ephemeral: a graph is rebuilt by every index search.
#[derive(Debug, Default)]
pub struct MatchGraph {
    nodes: HashMap<NodeHandle, GraphNode>,
    edges: HashMap<(NodeHandle, NodeHandle), GraphEdge>,
    next_handle: u32,
}

impl MatchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&GraphNode> {
        self.nodes.get(&handle)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edge(&self, a: NodeHandle, b: NodeHandle) -> Option<&GraphEdge> {
        self.edges.get(&edge_key(a, b))
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.values()
    }

    /// Install the root node. Fails once the graph has any node.
    pub fn create_root(&mut self, segment: AnimationSegment) -> Result<NodeHandle, CoreError> {
        if !self.nodes.is_empty() {
            return Err(CoreError::RootExists);
        }
        debug_assert_eq!(self.next_handle, 0);
        let handle = NodeHandle(self.next_handle);
        self.next_handle += 1;
        self.nodes.insert(
            handle,
            GraphNode {
                handle,
                segment,
                prev: Vec::new(),
                next: Vec::new(),
            },
        );
        Ok(handle)
    }

    /// Allocate a node connected to an existing one, with the given match
    /// sequence and edge cost.
    pub fn create_node(
        &mut self,
        conn: NodeHandle,
        segment: AnimationSegment,
        points: Vec<MatchPoint>,
        cost: f32,
    ) -> Result<NodeHandle, CoreError> {
        if !self.nodes.contains_key(&conn) {
            return Err(CoreError::UnknownHandle(conn));
        }
        let handle = NodeHandle(self.next_handle);
        self.next_handle += 1;
        self.nodes.insert(
            handle,
            GraphNode {
                handle,
                segment,
                prev: vec![conn],
                next: Vec::new(),
            },
        );
        if let Some(parent) = self.nodes.get_mut(&conn) {
            parent.next.push(handle);
        }
        self.edges.insert(
            edge_key(conn, handle),
            GraphEdge {
                nodes: (conn, handle),
                points,
                cost,
            },
        );
        Ok(handle)
    }

    /// Remove a node, its edges, and every node left unreachable from the
    /// root afterwards. The root itself cannot be deleted.
    pub fn delete_node(&mut self, handle: NodeHandle) -> Result<(), CoreError> {
        if handle == NodeHandle::ROOT {
            return Err(CoreError::RootDeletion);
        }
        if !self.nodes.contains_key(&handle) {
            return Err(CoreError::UnknownHandle(handle));
        }
        self.remove_node(handle);

        // Cascading prune of now-disconnected subgraphs.
        let reached = self.reachable_from(NodeHandle::ROOT);
        let orphans: Vec<NodeHandle> = self
            .nodes
            .keys()
            .copied()
            .filter(|h| !reached.contains(h))
            .collect();
        for orphan in orphans {
            self.remove_node(orphan);
        }
        Ok(())
    }

    fn remove_node(&mut self, handle: NodeHandle) {
        let Some(node) = self.nodes.remove(&handle) else {
            return;
        };
        for neighbor in node.prev.iter().chain(node.next.iter()) {
            if let Some(n) = self.nodes.get_mut(neighbor) {
                n.prev.retain(|h| *h != handle);
                n.next.retain(|h| *h != handle);
            }
            self.edges.remove(&edge_key(handle, *neighbor));
        }
    }

    fn reachable_from(&self, src: NodeHandle) -> HashSet<NodeHandle> {
        let mut reached = HashSet::new();
        let mut stack = vec![src];
        while let Some(h) = stack.pop() {
            if !reached.insert(h) {
                continue;
            }
            if let Some(node) = self.nodes.get(&h) {
                stack.extend(node.next.iter().copied());
            }
        }
        reached
    }

    /// Dijkstra from `src` toward `targets`, following forward adjacency.
    /// Edge costs are grid distances, hence non-negative. Returns one path
    /// per reachable target; unreachable targets simply produce no entry.
    pub fn optimal_path(
        &self,
        src: NodeHandle,
        targets: &[NodeHandle],
    ) -> Result<Vec<NodePath>, CoreError> {
        if !self.nodes.contains_key(&src) {
            return Err(CoreError::UnknownHandle(src));
        }

        let mut dist: HashMap<NodeHandle, f32> = HashMap::new();
        let mut prev: HashMap<NodeHandle, NodeHandle> = HashMap::new();
        let mut done: HashSet<NodeHandle> = HashSet::new();
        dist.insert(src, 0.0);

        // Linear-scan frontier selection; graphs stay small per query.
        loop {
            let Some((&current, &current_cost)) = dist
                .iter()
                .filter(|(h, _)| !done.contains(*h))
                .min_by(|(_, a), (_, b)| a.total_cmp(b))
            else {
                break;
            };
            done.insert(current);
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for &next in &node.next {
                let Some(edge) = self.edges.get(&edge_key(current, next)) else {
                    continue;
                };
                let candidate = current_cost + edge.cost.max(0.0);
                if dist.get(&next).map_or(true, |&d| candidate < d) {
                    dist.insert(next, candidate);
                    prev.insert(next, current);
                }
            }
        }

        let mut paths = Vec::new();
        for &target in targets {
            let Some(&cost) = dist.get(&target) else {
                continue;
            };
            let mut nodes = vec![target];
            let mut cursor = target;
            while let Some(&p) = prev.get(&cursor) {
                nodes.push(p);
                cursor = p;
            }
            nodes.reverse();
            debug_assert_eq!(nodes.first(), Some(&src));
            paths.push(NodePath {
                target,
                nodes,
                cost,
            });
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::ClipId;

    fn seg(start: f32, end: f32) -> AnimationSegment {
        AnimationSegment::new(ClipId(0), start, end, 100.0)
    }

    fn graph_with_root() -> (MatchGraph, NodeHandle) {
        let mut g = MatchGraph::new();
        let root = g.create_root(seg(0.0, 1.0)).unwrap();
        (g, root)
    }

    #[test]
    fn root_is_handle_zero_and_unique() {
        let (mut g, root) = graph_with_root();
        assert_eq!(root, NodeHandle::ROOT);
        assert_eq!(g.create_root(seg(0.0, 1.0)), Err(CoreError::RootExists));
    }

    #[test]
    fn create_node_rejects_unknown_connection() {
        let (mut g, _) = graph_with_root();
        let err = g.create_node(NodeHandle(42), seg(1.0, 2.0), Vec::new(), 1.0);
        assert_eq!(err, Err(CoreError::UnknownHandle(NodeHandle(42))));
    }

    #[test]
    fn at_most_one_edge_per_node_pair() {
        let (mut g, root) = graph_with_root();
        let n = g.create_node(root, seg(1.0, 2.0), Vec::new(), 1.0).unwrap();
        assert!(g.edge(root, n).is_some());
        assert!(g.edge(n, root).is_some());
        assert_eq!(g.edges().count(), 1);
    }

    #[test]
    fn delete_refuses_root() {
        let (mut g, root) = graph_with_root();
        assert_eq!(g.delete_node(root), Err(CoreError::RootDeletion));
    }

    #[test]
    fn delete_prunes_disconnected_subgraph() {
        let (mut g, root) = graph_with_root();
        let a = g.create_node(root, seg(1.0, 2.0), Vec::new(), 1.0).unwrap();
        let b = g.create_node(a, seg(2.0, 3.0), Vec::new(), 1.0).unwrap();
        let c = g.create_node(b, seg(3.0, 4.0), Vec::new(), 1.0).unwrap();
        g.delete_node(a).unwrap();
        assert_eq!(g.len(), 1);
        assert!(g.node(b).is_none());
        assert!(g.node(c).is_none());
    }

    #[test]
    fn no_orphans_survive_deletion() {
        let (mut g, root) = graph_with_root();
        let a = g.create_node(root, seg(1.0, 2.0), Vec::new(), 1.0).unwrap();
        let b = g.create_node(root, seg(2.0, 3.0), Vec::new(), 2.0).unwrap();
        let _ = g.create_node(a, seg(3.0, 4.0), Vec::new(), 1.0).unwrap();
        g.delete_node(b).unwrap();
        let remaining: Vec<NodeHandle> = g.nodes().map(|n| n.handle).collect();
        for handle in remaining {
            if handle == root {
                continue;
            }
            let paths = g.optimal_path(root, &[handle]).unwrap();
            assert_eq!(paths.len(), 1, "node {handle:?} should stay reachable");
        }
    }

    #[test]
    fn dijkstra_prefers_cheaper_route() {
        let (mut g, root) = graph_with_root();
        let a = g.create_node(root, seg(1.0, 2.0), Vec::new(), 5.0).unwrap();
        let b = g.create_node(root, seg(2.0, 3.0), Vec::new(), 1.0).unwrap();
        let t = g.create_node(b, seg(3.0, 4.0), Vec::new(), 1.0).unwrap();
        let paths = g.optimal_path(root, &[t, a]).unwrap();
        let to_t = paths.iter().find(|p| p.target == t).unwrap();
        assert_eq!(to_t.nodes, vec![root, b, t]);
        assert!((to_t.cost - 2.0).abs() < 1e-6);
    }

    #[test]
    fn unreachable_target_produces_no_entry() {
        let (mut g, root) = graph_with_root();
        let a = g.create_node(root, seg(1.0, 2.0), Vec::new(), 1.0).unwrap();
        // Forward adjacency only: `a` cannot reach the root.
        let paths = g.optimal_path(a, &[root]).unwrap();
        assert!(paths.is_empty());
    }
}
