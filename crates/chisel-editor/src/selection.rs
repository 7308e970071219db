//! Selection engine.
//!
//! Owns the selected-node set of a document and runs interactive picks.
//! A pick installs a dedicated handler on the view, publishes its prompt
//! and cursor, optionally shows the confirm control or arms auto-confirm,
//! then suspends on the pick's controller. However the pick ends (success,
//! cancel, superseded, view closed, future dropped) the same idempotent
//! teardown restores the handler stack and clears prompt, cursor and
//! confirm control.
//!
//! Highlights mirror the selected set and are always updated before the
//! redraw that shows them is requested.

use crate::config::EditorConfig;
use crate::controller::{AsyncController, Outcome};
use crate::document::DocumentId;
use crate::error::CancelReason;
use crate::event::{
    ClearSelectionControl, ClearStatusBarTip, CursorType, EventBus, SelectionChanged,
    SelectionChangedArgs, ShowSelectionControl, StatusBarTip,
};
use crate::handlers::{NodeSelectionHandler, PointSnapHandler, SubshapeSelectionHandler};
use crate::snap::{SnapData, SnapResult};
use crate::view::{EventHandler, View};
use chisel_core::{DocumentGraph, Node, NodeId, ShapeType};
use chisel_visual::{HighlightKey, VisualContext, VisualShapeData, VisualState};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

// ─── Filters ─────────────────────────────────────────────────────────────

/// Decides whether a detected entity may be picked.
pub trait ShapeFilter {
    fn allow(&self, shape: &VisualShapeData) -> bool;
}

impl<F: Fn(&VisualShapeData) -> bool> ShapeFilter for F {
    fn allow(&self, shape: &VisualShapeData) -> bool {
        self(shape)
    }
}

/// Decides whether a node may be picked or selected.
pub trait NodeFilter {
    fn allow(&self, node: &Node) -> bool;
}

impl<F: Fn(&Node) -> bool> NodeFilter for F {
    fn allow(&self, node: &Node) -> bool {
        self(node)
    }
}

#[derive(Clone)]
pub struct PickFilters {
    /// What detection looks for. Default: whole shapes.
    pub shape_type: ShapeType,
    pub shape_filter: Option<Rc<dyn ShapeFilter>>,
    pub node_filter: Option<Rc<dyn NodeFilter>>,
}

impl Default for PickFilters {
    fn default() -> Self {
        Self {
            shape_type: ShapeType::Shape,
            shape_filter: None,
            node_filter: None,
        }
    }
}

impl std::fmt::Debug for PickFilters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickFilters")
            .field("shape_type", &self.shape_type)
            .field("shape_filter", &self.shape_filter.is_some())
            .field("node_filter", &self.node_filter.is_some())
            .finish()
    }
}

/// Restores the previous filters when dropped.
pub struct FilterScope<'s> {
    selection: &'s Selection,
    previous: Option<PickFilters>,
}

impl Drop for FilterScope<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.selection.filters.borrow_mut() = previous;
        }
    }
}

// ─── Selection ───────────────────────────────────────────────────────────

pub struct Selection {
    document: DocumentId,
    graph: Rc<RefCell<DocumentGraph>>,
    visual: Rc<VisualContext>,
    bus: Rc<EventBus>,
    config: Rc<EditorConfig>,
    selected: RefCell<Vec<NodeId>>,
    filters: RefCell<PickFilters>,
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("document", &self.document)
            .field("selected", &self.selected.borrow())
            .field("filters", &self.filters.borrow())
            .finish()
    }
}

impl Selection {
    pub(crate) fn new(
        document: DocumentId,
        graph: Rc<RefCell<DocumentGraph>>,
        visual: Rc<VisualContext>,
        bus: Rc<EventBus>,
        config: Rc<EditorConfig>,
    ) -> Self {
        Self {
            document,
            graph,
            visual,
            bus,
            config,
            selected: RefCell::new(Vec::new()),
            filters: RefCell::new(PickFilters::default()),
        }
    }

    pub fn selected(&self) -> Vec<NodeId> {
        self.selected.borrow().clone()
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selected.borrow().contains(&id)
    }

    // ─── Filters ─────────────────────────────────────────────────────────

    /// Replace the active filters until the returned scope drops.
    pub fn push_filters(&self, filters: PickFilters) -> FilterScope<'_> {
        let previous = std::mem::replace(&mut *self.filters.borrow_mut(), filters);
        FilterScope {
            selection: self,
            previous: Some(previous),
        }
    }

    pub fn filters(&self) -> PickFilters {
        self.filters.borrow().clone()
    }

    fn accepts_node(&self, graph: &DocumentGraph, id: NodeId, filters: &PickFilters) -> bool {
        let Some(node) = graph.get_by_id(id) else {
            return false;
        };
        filters.node_filter.as_ref().is_none_or(|f| f.allow(node))
    }

    /// Node filter, then the shape filter against the node's whole shape.
    /// A node without a visual or whose shape fails to generate is rejected
    /// while a shape filter is active.
    fn accepts_selection(&self, graph: &DocumentGraph, id: NodeId, filters: &PickFilters) -> bool {
        if !self.accepts_node(graph, id, filters) {
            return false;
        }
        let Some(shape_filter) = filters.shape_filter.as_ref() else {
            return true;
        };
        let Some(owner) = self.visual.visual_of(id) else {
            return false;
        };
        match graph.shape_of(id) {
            Ok(shape) => shape_filter.allow(&VisualShapeData::whole(owner, id, shape)),
            Err(e) => {
                log::trace!("cannot filter {id}: {e}");
                false
            }
        }
    }

    /// Entities under view pixel `(x, y)` that pass the active filters,
    /// topmost first.
    pub fn detect(&self, view: &View, x: f64, y: f64) -> Vec<VisualShapeData> {
        let filters = self.filters();
        let point = view.screen_to_world(x, y);
        let graph = self.graph.borrow();
        let detected = chisel_visual::detect(
            &graph,
            &self.visual,
            &view.workplane(),
            point,
            filters.shape_type,
            self.config.pick_tolerance,
        );
        detected
            .into_iter()
            .filter(|d| {
                let ok = self.accepts_node(&graph, d.node, &filters)
                    && filters.shape_filter.as_ref().is_none_or(|f| f.allow(d));
                if !ok {
                    log::trace!("filter rejected {:?} of {}", d.shape_type, d.node);
                }
                ok
            })
            .collect()
    }

    // ─── Selected set ────────────────────────────────────────────────────

    /// Select `nodes`. With `toggle` each node flips membership; otherwise
    /// the selection is replaced. Returns the new selection size.
    pub fn set_selection(&self, nodes: &[NodeId], toggle: bool) -> usize {
        let filters = self.filters();
        let mut wanted: Vec<NodeId> = Vec::with_capacity(nodes.len());
        {
            let graph = self.graph.borrow();
            for &id in nodes {
                if !wanted.contains(&id) && self.accepts_selection(&graph, id, &filters) {
                    wanted.push(id);
                }
            }
        }

        let (added, removed) = {
            let mut selected = self.selected.borrow_mut();
            if toggle {
                let (removed, added): (Vec<NodeId>, Vec<NodeId>) =
                    wanted.into_iter().partition(|id| selected.contains(id));
                selected.retain(|id| !removed.contains(id));
                selected.extend(added.iter().copied());
                (added, removed)
            } else {
                let removed: Vec<NodeId> = selected.iter().copied().filter(|id| !wanted.contains(id)).collect();
                let added: Vec<NodeId> = wanted.iter().copied().filter(|id| !selected.contains(id)).collect();
                *selected = wanted;
                (added, removed)
            }
        };
        self.publish(&added, removed);
        self.selected.borrow().len()
    }

    pub fn deselect(&self, nodes: &[NodeId]) {
        let removed: Vec<NodeId> = {
            let mut selected = self.selected.borrow_mut();
            let removed = selected.iter().copied().filter(|id| nodes.contains(id)).collect();
            selected.retain(|id| !nodes.contains(id));
            removed
        };
        self.publish(&[], removed);
    }

    pub fn clear_selection(&self) {
        let removed = std::mem::take(&mut *self.selected.borrow_mut());
        self.publish(&[], removed);
    }

    /// Drop nodes that left the document. Their visuals are already gone.
    pub(crate) fn forget(&self, ids: &[NodeId]) {
        let removed: Vec<NodeId> = {
            let mut selected = self.selected.borrow_mut();
            let removed: Vec<NodeId> = selected.iter().copied().filter(|id| ids.contains(id)).collect();
            selected.retain(|id| !ids.contains(id));
            removed
        };
        if !removed.is_empty() {
            self.notify(removed);
        }
    }

    fn publish(&self, added: &[NodeId], removed: Vec<NodeId>) {
        for &id in &removed {
            if let Some(visual) = self.visual.visual_of(id) {
                self.visual.unhighlight(&HighlightKey::whole(visual, VisualState::EdgeSelected));
            }
        }
        for &id in added {
            if let Some(visual) = self.visual.visual_of(id) {
                self.visual.highlight(HighlightKey::whole(visual, VisualState::EdgeSelected));
            }
        }
        self.visual.update();
        self.notify(removed);
    }

    fn notify(&self, unselected: Vec<NodeId>) {
        self.bus.publish::<SelectionChanged>(SelectionChangedArgs {
            document: self.document,
            selected: self.selected(),
            unselected,
        });
    }

    // ─── Picks ───────────────────────────────────────────────────────────

    /// Pick sub-shapes of the active filter's shape type.
    pub async fn pick_shape(
        &self,
        view: &Rc<View>,
        prompt: &str,
        controller: &AsyncController,
        multi: bool,
        selected_state: VisualState,
        highlight_state: VisualState,
    ) -> Outcome<Vec<VisualShapeData>> {
        let handler = Rc::new(SubshapeSelectionHandler::new(
            controller.clone(),
            multi,
            selected_state,
            highlight_state,
            self.visual.clone(),
        ));
        self.run_pick(view, handler.clone(), prompt, controller, multi, CursorType::Selection)
            .await
            .map(|()| handler.shapes())
    }

    /// Pick whole nodes into the selection. Returns the nodes this pick
    /// left selected, in pick order; nodes selected before the pick started
    /// are not reported unless the pick selected them again.
    pub async fn pick_node(
        &self,
        view: &Rc<View>,
        prompt: &str,
        controller: &AsyncController,
        multi: bool,
    ) -> Outcome<Vec<NodeId>> {
        let handler = Rc::new(NodeSelectionHandler::new(controller.clone(), multi, self.visual.clone()));
        self.run_pick(view, handler.clone(), prompt, controller, multi, CursorType::Selection)
            .await
            .map(|()| {
                handler
                    .picked()
                    .into_iter()
                    .filter(|id| self.is_selected(*id))
                    .collect()
            })
    }

    /// Pick a point, snapped to nearby features.
    pub async fn pick_point(
        &self,
        view: &Rc<View>,
        prompt: &str,
        controller: &AsyncController,
        data: SnapData,
    ) -> Outcome<SnapResult> {
        let handler = Rc::new(PointSnapHandler::new(
            controller.clone(),
            data,
            self.config.snap.clone(),
            self.visual.clone(),
        ));
        let outcome = self
            .run_pick(view, handler.clone(), prompt, controller, false, CursorType::Crosshair)
            .await;
        match outcome {
            Outcome::Succeeded(()) => match handler.result() {
                Some(result) => Outcome::Succeeded(result),
                None => Outcome::Cancelled(CancelReason::EmptySelection),
            },
            Outcome::Cancelled(reason) => Outcome::Cancelled(reason),
        }
    }

    async fn run_pick(
        &self,
        view: &Rc<View>,
        handler: Rc<dyn EventHandler>,
        prompt: &str,
        controller: &AsyncController,
        show_control: bool,
        cursor: CursorType,
    ) -> Outcome<()> {
        if view.is_closed() {
            controller.cancel(CancelReason::ViewClosed);
            return Outcome::Cancelled(CancelReason::ViewClosed);
        }
        if !controller.is_pending() {
            return controller.wait().await;
        }
        view.supersede(controller);

        log::debug!("pick `{prompt}` with {} (controller {})", handler.name(), controller.id());
        let token = view.install(handler, controller.clone());
        view.set_cursor(cursor);
        self.bus.publish::<StatusBarTip>(prompt.to_string());

        let show = show_control && self.config.show_selection_confirm;
        if show {
            self.bus.publish::<ShowSelectionControl>(controller.clone());
        }
        let auto = self.config.auto_confirm_selection && !show;
        let auto_listener = auto.then(|| {
            let slot = Rc::new(Cell::new(None));
            let (bus, own, c, document) = (
                Rc::downgrade(&self.bus),
                slot.clone(),
                controller.clone(),
                self.document,
            );
            let id = self.bus.subscribe::<SelectionChanged>(move |args| {
                if args.document != document || args.selected.is_empty() {
                    return;
                }
                if let (Some(bus), Some(id)) = (bus.upgrade(), own.get()) {
                    bus.unsubscribe(id);
                }
                c.succeed();
            });
            slot.set(Some(id));
            id
        });

        let teardown: Rc<dyn Fn()> = {
            let done = Cell::new(false);
            let view = Rc::downgrade(view);
            let bus = self.bus.clone();
            Rc::new(move || {
                if done.replace(true) {
                    return;
                }
                if let Some(id) = auto_listener {
                    bus.unsubscribe(id);
                }
                if let Some(view) = view.upgrade() {
                    view.uninstall(token);
                    view.set_cursor(CursorType::Default);
                }
                bus.publish::<ClearStatusBarTip>(());
                if show {
                    bus.publish::<ClearSelectionControl>(());
                }
            })
        };
        let on_done = teardown.clone();
        controller.on_completed(move || on_done());
        let on_cancel = teardown.clone();
        controller.on_cancelled(move |_| on_cancel());
        let _guard = TeardownGuard(teardown.clone());

        let outcome = controller.wait().await;
        teardown();
        log::debug!("pick `{prompt}` ended: {outcome:?}");
        outcome
    }
}

/// Runs teardown if the pick future is dropped mid-await.
struct TeardownGuard(Rc<dyn Fn()>);

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        (self.0)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::transaction::Transaction;
    use chisel_core::{BodyKind, BoundsKernel, Params, ShapeNode};
    use pretty_assertions::assert_eq;

    fn doc_with(n: usize) -> (Rc<Document>, Rc<EventBus>, Vec<NodeId>) {
        let bus = Rc::new(EventBus::new());
        let doc = Document::new(Rc::new(BoundsKernel), bus.clone(), EditorConfig::default());
        let ids = Transaction::execute(&doc, "setup", |tx| {
            (0..n)
                .map(|i| {
                    tx.add_node(
                        NodeId::root(),
                        Node::shape(format!("box {i}"), ShapeNode::new(Params::defaults(BodyKind::Box))),
                    )
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .unwrap();
        (doc, bus, ids)
    }

    #[test]
    fn replace_then_toggle() {
        let (doc, _, ids) = doc_with(3);
        let sel = doc.selection();
        assert_eq!(sel.set_selection(&[ids[0], ids[1]], false), 2);
        assert_eq!(sel.set_selection(&[ids[2]], false), 1);
        assert_eq!(sel.selected(), vec![ids[2]]);
        assert_eq!(sel.set_selection(&[ids[0], ids[2]], true), 1);
        assert_eq!(sel.selected(), vec![ids[0]]);
    }

    #[test]
    fn highlights_follow_selection_before_redraw() {
        let (doc, bus, ids) = doc_with(1);
        let visual = doc.visual().clone();
        let checked = Rc::new(Cell::new(false));
        let (v, c) = (visual.clone(), checked.clone());
        bus.subscribe::<SelectionChanged>(move |_| {
            assert!(v.is_highlight_current());
            c.set(true);
        });
        doc.selection().set_selection(&ids, false);
        let key = HighlightKey::whole(visual.visual_of(ids[0]).unwrap(), VisualState::EdgeSelected);
        assert!(visual.is_highlighted(&key));
        doc.selection().clear_selection();
        assert!(!visual.is_highlighted(&key));
        assert!(checked.get());
    }

    #[test]
    fn unknown_and_filtered_nodes_are_ignored() {
        let (doc, _, ids) = doc_with(2);
        let sel = doc.selection();
        let keep = ids[1];
        let _scope = sel.push_filters(PickFilters {
            node_filter: Some(Rc::new(move |n: &Node| n.id == keep)),
            ..PickFilters::default()
        });
        sel.set_selection(&[ids[0], ids[1], NodeId::intern("nowhere"), ids[1]], false);
        assert_eq!(sel.selected(), vec![ids[1]]);
    }

    #[test]
    fn shape_filter_applies_to_selected_nodes() {
        let (doc, _, ids) = doc_with(2);
        let sel = doc.selection();
        {
            let _scope = sel.push_filters(PickFilters {
                shape_filter: Some(Rc::new(|_: &VisualShapeData| false)),
                ..PickFilters::default()
            });
            assert_eq!(sel.set_selection(&[ids[0]], false), 0);
            assert!(sel.selected().is_empty());
        }
        let keep = ids[1];
        let _scope = sel.push_filters(PickFilters {
            shape_filter: Some(Rc::new(move |d: &VisualShapeData| {
                d.node == keep && d.shape_type == ShapeType::Shape && d.indexes.is_empty()
            })),
            ..PickFilters::default()
        });
        sel.set_selection(&ids, false);
        assert_eq!(sel.selected(), vec![ids[1]]);
    }

    #[test]
    fn filter_scope_restores() {
        let (doc, _, _) = doc_with(0);
        let sel = doc.selection();
        {
            let _scope = sel.push_filters(PickFilters {
                shape_type: ShapeType::Face,
                ..PickFilters::default()
            });
            assert_eq!(sel.filters().shape_type, ShapeType::Face);
        }
        assert_eq!(sel.filters().shape_type, ShapeType::Shape);
    }

    #[test]
    fn removed_nodes_leave_the_selection() {
        let (doc, bus, ids) = doc_with(2);
        doc.selection().set_selection(&ids, false);
        let last = Rc::new(RefCell::new(None));
        let l = last.clone();
        bus.subscribe::<SelectionChanged>(move |a| *l.borrow_mut() = Some(a.clone()));
        Transaction::execute(&doc, "delete", |tx| tx.remove_node(ids[0])).unwrap();
        assert_eq!(doc.selection().selected(), vec![ids[1]]);
        let args = last.borrow().clone().unwrap();
        assert_eq!(args.unselected, vec![ids[0]]);
    }
}
