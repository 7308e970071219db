//! Visual context: the display-side mirror of a document.
//!
//! Tracks which node each visual shows, which visuals need regeneration,
//! transient preview meshes and highlight state. It is shared between the
//! document and the selection engine on the UI thread, so every method takes
//! `&self` and mutates through cells.
//!
//! `update()` stands in for a redraw request: it records the highlighter
//! revision it rendered, so callers can check that highlight changes were
//! applied before the redraw they asked for.

use crate::highlight::{HighlightKey, Highlighter};
use crate::mesh::{MeshData, MeshId};
use chisel_core::NodeId;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisualId(pub u64);

#[derive(Debug, Default)]
pub struct VisualContext {
    visuals: RefCell<HashMap<NodeId, VisualId>>,
    nodes: RefCell<HashMap<VisualId, NodeId>>,
    stale: RefCell<HashSet<VisualId>>,
    previews: RefCell<BTreeMap<MeshId, MeshData>>,
    highlighter: RefCell<Highlighter>,
    next_id: Cell<u64>,
    redraws: Cell<u64>,
    rendered_revision: Cell<u64>,
}

impl VisualContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    // ─── Node ↔ visual ───────────────────────────────────────────────────

    /// Create the visual for `node`, or return the existing one.
    pub fn register(&self, node: NodeId) -> VisualId {
        if let Some(v) = self.visual_of(node) {
            return v;
        }
        let visual = VisualId(self.next_id());
        self.visuals.borrow_mut().insert(node, visual);
        self.nodes.borrow_mut().insert(visual, node);
        self.stale.borrow_mut().insert(visual);
        log::trace!("visual {visual:?} registered for {node}");
        visual
    }

    /// Drop the visual of `node` together with its highlights.
    pub fn unregister(&self, node: NodeId) -> Option<VisualId> {
        let visual = self.visuals.borrow_mut().remove(&node)?;
        self.nodes.borrow_mut().remove(&visual);
        self.stale.borrow_mut().remove(&visual);
        self.highlighter.borrow_mut().clear_visual(visual);
        Some(visual)
    }

    pub fn visual_of(&self, node: NodeId) -> Option<VisualId> {
        self.visuals.borrow().get(&node).copied()
    }

    pub fn node_of(&self, visual: VisualId) -> Option<NodeId> {
        self.nodes.borrow().get(&visual).copied()
    }

    pub fn visual_count(&self) -> usize {
        self.visuals.borrow().len()
    }

    /// Mark the visual of `node` for regeneration on the next redraw.
    pub fn invalidate(&self, node: NodeId) {
        if let Some(visual) = self.visual_of(node) {
            self.stale.borrow_mut().insert(visual);
        }
    }

    pub fn is_stale(&self, node: NodeId) -> bool {
        self.visual_of(node)
            .is_some_and(|v| self.stale.borrow().contains(&v))
    }

    // ─── Previews ────────────────────────────────────────────────────────

    pub fn add_preview(&self, mesh: MeshData) -> MeshId {
        let id = MeshId(self.next_id());
        self.previews.borrow_mut().insert(id, mesh);
        id
    }

    pub fn remove_preview(&self, id: MeshId) -> bool {
        self.previews.borrow_mut().remove(&id).is_some()
    }

    pub fn preview(&self, id: MeshId) -> Option<MeshData> {
        self.previews.borrow().get(&id).cloned()
    }

    pub fn preview_count(&self) -> usize {
        self.previews.borrow().len()
    }

    // ─── Highlights ──────────────────────────────────────────────────────

    pub fn highlight(&self, key: HighlightKey) -> bool {
        self.highlighter.borrow_mut().add(key)
    }

    pub fn unhighlight(&self, key: &HighlightKey) -> bool {
        self.highlighter.borrow_mut().remove(key)
    }

    pub fn is_highlighted(&self, key: &HighlightKey) -> bool {
        self.highlighter.borrow().contains(key)
    }

    pub fn highlight_count(&self) -> usize {
        self.highlighter.borrow().len()
    }

    pub fn highlight_keys(&self) -> Vec<HighlightKey> {
        self.highlighter.borrow().keys().cloned().collect()
    }

    pub fn highlight_revision(&self) -> u64 {
        self.highlighter.borrow().revision()
    }

    // ─── Redraw ──────────────────────────────────────────────────────────

    /// Request a redraw: regenerates stale visuals and renders the current
    /// highlight set.
    pub fn update(&self) {
        let regenerated = std::mem::take(&mut *self.stale.borrow_mut());
        self.rendered_revision.set(self.highlight_revision());
        self.redraws.set(self.redraws.get() + 1);
        log::trace!(
            "redraw #{} ({} regenerated, {} previews)",
            self.redraws.get(),
            regenerated.len(),
            self.preview_count()
        );
    }

    pub fn redraw_count(&self) -> u64 {
        self.redraws.get()
    }

    /// Whether the last redraw rendered the current highlight set.
    pub fn is_highlight_current(&self) -> bool {
        self.rendered_revision.get() == self.highlight_revision()
    }
}
