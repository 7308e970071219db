//! The document graph.
//!
//! Nodes live in a petgraph `StableDiGraph` with parent→child edges. Indices
//! stay valid across removals; the explicit `child_order` table keeps sibling
//! order stable because petgraph's adjacency order is not.

use crate::error::ModelError;
use crate::id::NodeId;
use crate::kernel::ShapeFactory;
use crate::model::{Node, NodeKind};
use crate::shape::Shape;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A detached node together with all of its descendants.
#[derive(Debug, Clone)]
pub struct Subtree {
    pub node: Node,
    pub children: Vec<Subtree>,
}

impl Subtree {
    pub fn leaf(node: Node) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Ids of every node in the subtree, parents first.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = vec![self.node.id];
        for child in &self.children {
            out.extend(child.ids());
        }
        out
    }
}

pub struct DocumentGraph {
    pub graph: StableDiGraph<Node, ()>,
    pub root: NodeIndex,
    id_index: HashMap<NodeId, NodeIndex>,
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,
    kernel: Rc<dyn ShapeFactory>,
}

impl fmt::Debug for DocumentGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentGraph")
            .field("nodes", &self.graph.node_count())
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl DocumentGraph {
    pub fn new(kernel: Rc<dyn ShapeFactory>) -> Self {
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(Node::root());
        let mut id_index = HashMap::new();
        id_index.insert(NodeId::root(), root);
        Self {
            graph,
            root,
            id_index,
            child_order: HashMap::new(),
            kernel,
        }
    }

    pub fn kernel(&self) -> &Rc<dyn ShapeFactory> {
        &self.kernel
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.id_index.contains_key(&id)
    }

    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn get_by_id(&self, id: NodeId) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn get_by_id_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.index_of(id).map(|idx| &mut self.graph[idx])
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, ModelError> {
        self.get_by_id(id).ok_or(ModelError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ModelError> {
        self.get_by_id_mut(id).ok_or(ModelError::UnknownNode(id))
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .next()
    }

    pub fn parent_id(&self, id: NodeId) -> Option<NodeId> {
        let idx = self.index_of(id)?;
        self.parent(idx).map(|p| self.graph[p].id)
    }

    /// Children in document order.
    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.child_order
            .get(&idx)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Position of `id` among its siblings.
    pub fn position_in_parent(&self, id: NodeId) -> Option<usize> {
        let idx = self.index_of(id)?;
        let parent = self.parent(idx)?;
        self.children(parent).iter().position(|&c| c == idx)
    }

    /// Whether `ancestor` is a proper ancestor of `idx`.
    pub fn is_ancestor_of(&self, ancestor: NodeIndex, idx: NodeIndex) -> bool {
        let mut current = self.parent(idx);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// All non-root nodes, depth first in document order.
    pub fn descendants(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeIndex> = self.children(idx).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// `(depth, id)` for every node below the root. Cheap structural fingerprint.
    pub fn outline(&self) -> Vec<(usize, NodeId)> {
        fn walk(g: &DocumentGraph, idx: NodeIndex, depth: usize, out: &mut Vec<(usize, NodeId)>) {
            for &child in g.children(idx) {
                out.push((depth, g.graph[child].id));
                walk(g, child, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(self, self.root, 0, &mut out);
        out
    }

    /// Ids of every shape node, in document order.
    pub fn shape_nodes(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&idx| self.graph[idx].is_shape())
            .map(|idx| self.graph[idx].id)
            .collect()
    }

    /// The node's derived shape, regenerated if stale.
    pub fn shape_of(&self, id: NodeId) -> Result<Shape, ModelError> {
        let node = self.node(id)?;
        let body = node.as_shape().ok_or(ModelError::NotAShape(id))?;
        Ok(body.shape(self.kernel.as_ref())?.clone())
    }

    // ─── Structural edits ────────────────────────────────────────────────
    //
    // Only `mutation::apply` calls these; everything else in the editor goes
    // through a transaction.

    /// Insert `subtree` under `parent` at `position` (clamped to the end).
    pub fn attach(
        &mut self,
        parent: NodeId,
        position: usize,
        subtree: Subtree,
    ) -> Result<NodeIndex, ModelError> {
        let parent_idx = self.index_of(parent).ok_or(ModelError::UnknownNode(parent))?;
        if matches!(self.graph[parent_idx].kind, NodeKind::Shape(_)) {
            return Err(ModelError::InvalidParent(parent));
        }
        let ids = subtree.ids();
        for (i, id) in ids.iter().enumerate() {
            if self.contains(*id) || ids[..i].contains(id) {
                return Err(ModelError::DuplicateNode(*id));
            }
        }
        Ok(self.attach_unchecked(parent_idx, position, subtree))
    }

    fn attach_unchecked(&mut self, parent: NodeIndex, position: usize, subtree: Subtree) -> NodeIndex {
        let Subtree { node, children } = subtree;
        let id = node.id;
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, ());
        self.id_index.insert(id, idx);
        let siblings = self.child_order.entry(parent).or_default();
        let at = position.min(siblings.len());
        siblings.insert(at, idx);
        for (i, child) in children.into_iter().enumerate() {
            self.attach_unchecked(idx, i, child);
        }
        idx
    }

    /// Remove `id` and its descendants, returning them with the parent id
    /// and sibling position needed to put them back.
    pub fn detach(&mut self, id: NodeId) -> Result<(NodeId, usize, Subtree), ModelError> {
        let idx = self.index_of(id).ok_or(ModelError::UnknownNode(id))?;
        let parent = self.parent(idx).ok_or(ModelError::InvalidParent(id))?;
        let position = self
            .children(parent)
            .iter()
            .position(|&c| c == idx)
            .ok_or(ModelError::InvalidParent(id))?;
        let parent_id = self.graph[parent].id;
        if let Some(siblings) = self.child_order.get_mut(&parent) {
            siblings.remove(position);
        }
        let subtree = self.detach_unchecked(idx).ok_or(ModelError::UnknownNode(id))?;
        Ok((parent_id, position, subtree))
    }

    fn detach_unchecked(&mut self, idx: NodeIndex) -> Option<Subtree> {
        let child_indices = self.child_order.remove(&idx).unwrap_or_default();
        let children = child_indices
            .into_iter()
            .filter_map(|c| self.detach_unchecked(c))
            .collect();
        let node = self.graph.remove_node(idx)?;
        self.id_index.remove(&node.id);
        Some(Subtree { node, children })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyKind, Params};
    use crate::kernel::BoundsKernel;
    use crate::model::ShapeNode;

    fn graph() -> DocumentGraph {
        DocumentGraph::new(Rc::new(BoundsKernel))
    }

    fn box_node(name: &str) -> Node {
        Node::shape(name, ShapeNode::new(Params::defaults(BodyKind::Box)))
    }

    #[test]
    fn attach_keeps_sibling_order() {
        let mut g = graph();
        let root = NodeId::root();
        let a = box_node("a");
        let b = box_node("b");
        let c = box_node("c");
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        g.attach(root, 0, Subtree::leaf(a)).unwrap();
        g.attach(root, 9, Subtree::leaf(c)).unwrap();
        g.attach(root, 1, Subtree::leaf(b)).unwrap();
        let order: Vec<_> = g.outline().into_iter().map(|(_, id)| id).collect();
        assert_eq!(order, vec![a_id, b_id, c_id]);
        assert_eq!(g.position_in_parent(b_id), Some(1));
    }

    #[test]
    fn detach_then_attach_restores_subtree() {
        let mut g = graph();
        let folder = Node::folder(NodeId::with_prefix("folder"), "parts");
        let folder_id = folder.id;
        g.attach(NodeId::root(), 0, Subtree::leaf(folder)).unwrap();
        g.attach(folder_id, 0, Subtree::leaf(box_node("x"))).unwrap();
        g.attach(folder_id, 1, Subtree::leaf(box_node("y"))).unwrap();
        let before = g.outline();

        let (parent, pos, subtree) = g.detach(folder_id).unwrap();
        assert_eq!(g.node_count(), 1);
        assert_eq!(subtree.ids().len(), 3);

        g.attach(parent, pos, subtree).unwrap();
        assert_eq!(g.outline(), before);
    }

    #[test]
    fn attach_rejects_duplicates_and_shape_parents() {
        let mut g = graph();
        let a = box_node("a");
        let a_id = a.id;
        g.attach(NodeId::root(), 0, Subtree::leaf(a.clone())).unwrap();
        assert_eq!(
            g.attach(NodeId::root(), 0, Subtree::leaf(a)).unwrap_err(),
            ModelError::DuplicateNode(a_id)
        );
        assert_eq!(
            g.attach(a_id, 0, Subtree::leaf(box_node("b"))).unwrap_err(),
            ModelError::InvalidParent(a_id)
        );
    }

    #[test]
    fn root_cannot_be_detached() {
        let mut g = graph();
        assert_eq!(
            g.detach(NodeId::root()).unwrap_err(),
            ModelError::InvalidParent(NodeId::root())
        );
    }

    #[test]
    fn shape_of_rejects_folders() {
        let mut g = graph();
        let folder = Node::folder(NodeId::with_prefix("folder"), "f");
        let id = folder.id;
        g.attach(NodeId::root(), 0, Subtree::leaf(folder)).unwrap();
        assert_eq!(g.shape_of(id).unwrap_err(), ModelError::NotAShape(id));
    }
}
