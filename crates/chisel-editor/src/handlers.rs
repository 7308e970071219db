//! Input handlers installed on a view.
//!
//! `DefaultHandler` is the view's base handler. The others each serve one
//! pick and resolve its controller: Enter confirms a multi-select pick,
//! Escape cancels. Candidates rejected by the active filters are skipped,
//! so a pick simply keeps waiting.

use crate::controller::AsyncController;
use crate::error::{CancelReason, EditorError};
use crate::event::{SelectionChanged, SelectionChangedArgs, ShowToast};
use crate::input::InputEvent;
use crate::shortcuts::ShortcutAction;
use crate::snap::{MouseAndDetected, Snap, SnapData, SnapEngine, SnapResult};
use crate::transaction::Transaction;
use crate::view::{EventHandler, View};
use crate::config::SnapConfig;
use chisel_core::{NodeId, ShapeType};
use chisel_visual::{HighlightKey, VisualContext, VisualShapeData, VisualState};
use std::cell::RefCell;
use std::rc::Rc;

// ─── Default ─────────────────────────────────────────────────────────────

/// Idle behaviour: click selects (Shift toggles), Escape clears, shortcuts
/// run undo, redo and delete.
pub struct DefaultHandler;

impl DefaultHandler {
    fn report(view: &View, action: &str, result: Result<Option<String>, EditorError>) {
        match result {
            Ok(Some(label)) => log::debug!("{action} `{label}`"),
            Ok(None) => log::trace!("nothing to {action}"),
            Err(e) => {
                log::warn!("{action} failed: {e}");
                view.document().bus().publish::<ShowToast>(e.to_string());
            }
        }
    }

    fn delete_selected(view: &View) {
        let doc = view.document();
        let selected = doc.selection().selected();
        if selected.is_empty() {
            return;
        }
        let result = Transaction::execute(doc, "delete", |tx| {
            for id in &selected {
                // Descendants of an already removed node went with it.
                if tx.document().contains(*id) {
                    tx.remove_node(*id)?;
                }
            }
            Ok(())
        });
        if let Err(e) = result {
            log::warn!("delete failed: {e}");
            doc.bus().publish::<ShowToast>(e.to_string());
        }
    }
}

impl EventHandler for DefaultHandler {
    fn name(&self) -> &'static str {
        "default"
    }

    fn handle(&self, view: &View, event: &InputEvent) {
        let doc = view.document();
        match event {
            InputEvent::PointerDown { x, y, shift } => {
                let hit = doc.selection().detect(view, *x, *y).first().map(|d| d.node);
                match hit {
                    Some(node) => {
                        doc.selection().set_selection(&[node], *shift);
                    }
                    None if !*shift => doc.selection().clear_selection(),
                    None => {}
                }
            }
            InputEvent::Key { .. } => match event.shortcut() {
                Some(ShortcutAction::Undo) => Self::report(view, "undo", doc.undo()),
                Some(ShortcutAction::Redo) => Self::report(view, "redo", doc.redo()),
                Some(ShortcutAction::Delete) => Self::delete_selected(view),
                Some(ShortcutAction::SelectAll) => {
                    let all = doc.graph().shape_nodes();
                    doc.selection().set_selection(&all, false);
                }
                Some(ShortcutAction::Cancel) => doc.selection().clear_selection(),
                Some(ShortcutAction::Confirm) | None => {}
            },
            InputEvent::PointerMove { .. } | InputEvent::PointerUp { .. } => {}
        }
    }
}

// ─── Shared ──────────────────────────────────────────────────────────────

/// Keeps a single hover highlight in sync with the pointer.
struct Hover {
    visual: Rc<VisualContext>,
    key: RefCell<Option<HighlightKey>>,
}

impl Hover {
    fn new(visual: Rc<VisualContext>) -> Self {
        Self {
            visual,
            key: RefCell::new(None),
        }
    }

    fn set(&self, key: Option<HighlightKey>) {
        if *self.key.borrow() == key {
            return;
        }
        if let Some(old) = self.key.replace(key.clone()) {
            self.visual.unhighlight(&old);
        }
        if let Some(new) = key {
            self.visual.highlight(new);
        }
        self.visual.update();
    }
}

fn pick_keys(controller: &AsyncController, multi: bool, event: &InputEvent) {
    match event.shortcut() {
        Some(ShortcutAction::Confirm) if multi => {
            controller.succeed();
        }
        Some(ShortcutAction::Cancel) => {
            controller.cancel(CancelReason::User);
        }
        _ => {}
    }
}

// ─── Node pick ───────────────────────────────────────────────────────────

/// Picks whole nodes into the document selection.
pub struct NodeSelectionHandler {
    controller: AsyncController,
    multi: bool,
    hover: Hover,
    picked: RefCell<Vec<NodeId>>,
}

impl NodeSelectionHandler {
    pub fn new(controller: AsyncController, multi: bool, visual: Rc<VisualContext>) -> Self {
        Self {
            controller,
            multi,
            hover: Hover::new(visual),
            picked: RefCell::new(Vec::new()),
        }
    }

    /// Nodes this handler selected, in pick order, minus those it toggled
    /// off again.
    pub fn picked(&self) -> Vec<NodeId> {
        self.picked.borrow().clone()
    }
}

impl EventHandler for NodeSelectionHandler {
    fn name(&self) -> &'static str {
        "node-selection"
    }

    fn handle(&self, view: &View, event: &InputEvent) {
        let selection = view.document().selection();
        match event {
            InputEvent::PointerMove { x, y } => {
                let top = selection.detect(view, *x, *y).into_iter().next();
                self.hover
                    .set(top.map(|d| HighlightKey::whole(d.owner, VisualState::EdgeHighlight)));
            }
            InputEvent::PointerDown { x, y, shift } => {
                let Some(hit) = selection.detect(view, *x, *y).into_iter().next() else {
                    log::trace!("node pick: nothing pickable at ({x}, {y})");
                    return;
                };
                let toggle = self.multi || *shift;
                selection.set_selection(&[hit.node], toggle);
                {
                    let mut picked = self.picked.borrow_mut();
                    if !toggle {
                        picked.clear();
                    }
                    picked.retain(|id| *id != hit.node);
                    if selection.is_selected(hit.node) {
                        picked.push(hit.node);
                    }
                }
                if !self.multi {
                    self.controller.succeed();
                }
            }
            InputEvent::Key { .. } => pick_keys(&self.controller, self.multi, event),
            InputEvent::PointerUp { .. } => {}
        }
    }

    fn dispose(&self) {
        self.hover.set(None);
    }
}

// ─── Sub-shape pick ──────────────────────────────────────────────────────

/// Picks faces, edges, vertices or whole shapes, keeping its own list.
pub struct SubshapeSelectionHandler {
    controller: AsyncController,
    multi: bool,
    selected_state: VisualState,
    highlight_state: VisualState,
    visual: Rc<VisualContext>,
    hover: Hover,
    picked: RefCell<Vec<(VisualShapeData, HighlightKey)>>,
}

impl SubshapeSelectionHandler {
    pub fn new(
        controller: AsyncController,
        multi: bool,
        selected_state: VisualState,
        highlight_state: VisualState,
        visual: Rc<VisualContext>,
    ) -> Self {
        Self {
            controller,
            multi,
            selected_state,
            highlight_state,
            hover: Hover::new(visual.clone()),
            visual,
            picked: RefCell::new(Vec::new()),
        }
    }

    pub fn shapes(&self) -> Vec<VisualShapeData> {
        self.picked.borrow().iter().map(|(d, _)| d.clone()).collect()
    }

    fn key(&self, data: &VisualShapeData, state: VisualState) -> HighlightKey {
        HighlightKey {
            visual: data.owner,
            state,
            shape_type: data.shape_type,
            indexes: data.indexes.clone(),
        }
    }

    fn toggle(&self, data: VisualShapeData) {
        let key = self.key(&data, self.selected_state);
        let mut picked = self.picked.borrow_mut();
        if let Some(pos) = picked.iter().position(|(_, k)| *k == key) {
            let (_, old) = picked.remove(pos);
            self.visual.unhighlight(&old);
            return;
        }
        if !self.multi {
            for (_, old) in picked.drain(..) {
                self.visual.unhighlight(&old);
            }
        }
        self.visual.highlight(key.clone());
        picked.push((data, key));
    }

    fn picked_nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        for (d, _) in self.picked.borrow().iter() {
            if !nodes.contains(&d.node) {
                nodes.push(d.node);
            }
        }
        nodes
    }
}

impl EventHandler for SubshapeSelectionHandler {
    fn name(&self) -> &'static str {
        "subshape-selection"
    }

    fn handle(&self, view: &View, event: &InputEvent) {
        let doc = view.document();
        match event {
            InputEvent::PointerMove { x, y } => {
                let top = doc.selection().detect(view, *x, *y).into_iter().next();
                self.hover.set(top.map(|d| self.key(&d, self.highlight_state)));
            }
            InputEvent::PointerDown { x, y, .. } => {
                let Some(hit) = doc.selection().detect(view, *x, *y).into_iter().next() else {
                    log::trace!("shape pick: nothing pickable at ({x}, {y})");
                    return;
                };
                self.toggle(hit);
                self.visual.update();
                doc.bus().publish::<SelectionChanged>(SelectionChangedArgs {
                    document: doc.id(),
                    selected: self.picked_nodes(),
                    unselected: Vec::new(),
                });
                if !self.multi && !self.picked.borrow().is_empty() {
                    self.controller.succeed();
                }
            }
            InputEvent::Key { .. } => pick_keys(&self.controller, self.multi, event),
            InputEvent::PointerUp { .. } => {}
        }
    }

    fn dispose(&self) {
        self.hover.set(None);
        for (_, key) in self.picked.borrow().iter() {
            self.visual.unhighlight(key);
        }
        self.visual.update();
    }
}

// ─── Point pick ──────────────────────────────────────────────────────────

/// Picks one point through the snap engine.
pub struct PointSnapHandler {
    controller: AsyncController,
    engine: SnapEngine,
    result: RefCell<Option<SnapResult>>,
}

impl PointSnapHandler {
    pub fn new(
        controller: AsyncController,
        data: SnapData,
        config: SnapConfig,
        visual: Rc<VisualContext>,
    ) -> Self {
        Self {
            controller,
            engine: SnapEngine::new(data, config, visual),
            result: RefCell::new(None),
        }
    }

    pub fn result(&self) -> Option<SnapResult> {
        self.result.borrow().clone()
    }

    fn sample(&self, view: &View, x: f64, y: f64) -> MouseAndDetected {
        let plane = self.engine.data().plane.unwrap_or_else(|| view.workplane());
        let point = plane.to_world(x, y);
        let doc = view.document();
        let detected = {
            let graph = doc.graph();
            chisel_visual::detect(
                &graph,
                doc.visual(),
                &plane,
                point,
                ShapeType::Edge,
                self.engine.tolerance(),
            )
        };
        MouseAndDetected {
            plane,
            mx: x,
            my: y,
            point,
            shapes: detected.into_iter().filter(|d| self.engine.allows(d)).collect(),
        }
    }

    fn accept(&self, result: SnapResult) {
        *self.result.borrow_mut() = Some(result);
        self.controller.succeed();
    }
}

impl EventHandler for PointSnapHandler {
    fn name(&self) -> &'static str {
        "point-snap"
    }

    fn handle(&self, view: &View, event: &InputEvent) {
        match event {
            InputEvent::PointerMove { x, y } => {
                let sample = self.sample(view, *x, *y);
                self.engine.update(&sample);
                view.document().visual().update();
            }
            InputEvent::PointerDown { x, y, .. } => {
                let sample = self.sample(view, *x, *y);
                match self.engine.snap(&sample) {
                    Some(result) => self.accept(result),
                    None => log::trace!("point pick: ({x}, {y}) rejected"),
                }
            }
            InputEvent::Key { .. } => match event.shortcut() {
                Some(ShortcutAction::Confirm) => {
                    if let Some(last) = self.engine.last() {
                        self.accept(last);
                    }
                }
                Some(ShortcutAction::Cancel) => {
                    self.controller.cancel(CancelReason::User);
                }
                _ => {}
            },
            InputEvent::PointerUp { .. } => {}
        }
    }

    fn dispose(&self) {
        self.engine.clear();
    }
}
