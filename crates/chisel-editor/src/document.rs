//! Document: one editing session.
//!
//! Aggregates the node graph, its visual context, the selection engine,
//! undo history and the event bus. Everything is passed in explicitly; a
//! document never looks up an ambient application or view.
//!
//! Mutations reach the graph only through a `Transaction` or through
//! undo/redo, and every applied change is mirrored into the visual context
//! and the selection before control returns to the caller.

use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::event::{EventBus, PropertyChanged, PropertyChangedArgs};
use crate::selection::Selection;
use crate::transaction::{History, HistoryRecord};
use chisel_core::serialize;
use chisel_core::{Change, DocumentGraph, GraphMutation, ModelError, NodeId, Shape, ShapeFactory};
use chisel_visual::VisualContext;
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        DocumentId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Open transaction: the inverses of everything applied so far, in order.
#[derive(Debug)]
pub(crate) struct TxState {
    pub(crate) label: String,
    pub(crate) depth: usize,
    pub(crate) inverses: Vec<GraphMutation>,
}

pub struct Document {
    id: DocumentId,
    graph: Rc<RefCell<DocumentGraph>>,
    visual: Rc<VisualContext>,
    selection: Selection,
    history: RefCell<History>,
    pub(crate) tx: RefCell<Option<TxState>>,
    bus: Rc<EventBus>,
    config: Rc<EditorConfig>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("nodes", &self.node_count())
            .field("history", &self.history.borrow())
            .finish()
    }
}

impl Document {
    pub fn new(kernel: Rc<dyn ShapeFactory>, bus: Rc<EventBus>, config: EditorConfig) -> Rc<Document> {
        Self::from_graph(DocumentGraph::new(kernel), bus, config)
    }

    fn from_graph(graph: DocumentGraph, bus: Rc<EventBus>, config: EditorConfig) -> Rc<Document> {
        let id = DocumentId::next();
        let visual = Rc::new(VisualContext::new());
        for node in graph.shape_nodes() {
            visual.register(node);
        }
        let graph = Rc::new(RefCell::new(graph));
        let config = Rc::new(config);
        let selection = Selection::new(
            id,
            graph.clone(),
            visual.clone(),
            bus.clone(),
            config.clone(),
        );
        Rc::new(Document {
            id,
            graph,
            visual,
            selection,
            history: RefCell::new(History::new(config.history_depth)),
            tx: RefCell::new(None),
            bus,
            config,
        })
    }

    /// Rebuild a document from `encode` output. History starts empty.
    pub fn decode(
        bytes: &[u8],
        kernel: Rc<dyn ShapeFactory>,
        bus: Rc<EventBus>,
        config: EditorConfig,
    ) -> Result<Rc<Document>, EditorError> {
        let graph = serialize::decode(bytes, kernel)?;
        Ok(Self::from_graph(graph, bus, config))
    }

    pub fn encode(&self) -> Result<Vec<u8>, EditorError> {
        Ok(serialize::encode(&self.graph.borrow())?)
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Read access to the graph. Do not hold across a mutation.
    pub fn graph(&self) -> Ref<'_, DocumentGraph> {
        self.graph.borrow()
    }

    pub fn kernel(&self) -> Rc<dyn ShapeFactory> {
        self.graph.borrow().kernel().clone()
    }

    pub fn visual(&self) -> &Rc<VisualContext> {
        &self.visual
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &Rc<EditorConfig> {
        &self.config
    }

    /// Nodes in the tree, root included.
    pub fn node_count(&self) -> usize {
        self.graph.borrow().node_count()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.borrow().contains(id)
    }

    pub fn shape_of(&self, id: NodeId) -> Result<Shape, EditorError> {
        Ok(self.graph.borrow().shape_of(id)?)
    }

    // ─── Mutation plumbing ───────────────────────────────────────────────

    /// Apply one mutation and mirror its change. Returns the inverse.
    pub(crate) fn apply(&self, mutation: GraphMutation) -> Result<GraphMutation, ModelError> {
        let applied = mutation.apply(&mut self.graph.borrow_mut())?;
        self.mirror(&applied.change);
        Ok(applied.inverse)
    }

    fn mirror(&self, change: &Change) {
        match change {
            Change::Added(ids) => {
                let shapes: Vec<NodeId> = {
                    let graph = self.graph.borrow();
                    ids.iter()
                        .copied()
                        .filter(|id| graph.get_by_id(*id).is_some_and(|n| n.is_shape()))
                        .collect()
                };
                for id in shapes {
                    self.visual.register(id);
                }
            }
            Change::Removed(ids) => {
                for id in ids {
                    self.visual.unregister(*id);
                }
                self.selection.forget(ids);
            }
            Change::Property {
                id,
                property,
                geometry,
            } => {
                if *geometry {
                    self.visual.invalidate(*id);
                }
                self.bus.publish::<PropertyChanged>(PropertyChangedArgs {
                    document: self.id,
                    node: *id,
                    property: property.clone(),
                });
            }
        }
    }

    /// Apply `mutations` last to first. On failure the ones already applied
    /// are reverted and the graph is back where it started.
    fn replay(&self, mutations: &[GraphMutation]) -> Result<Vec<GraphMutation>, EditorError> {
        let mut inverses = Vec::with_capacity(mutations.len());
        for mutation in mutations.iter().rev() {
            match self.apply(mutation.clone()) {
                Ok(inverse) => inverses.push(inverse),
                Err(e) => {
                    for inverse in inverses.into_iter().rev() {
                        if let Err(e) = self.apply(inverse) {
                            log::error!("document {:?}: replay revert failed: {e}", self.id);
                        }
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(inverses)
    }

    // ─── Undo / redo ─────────────────────────────────────────────────────

    pub fn is_in_transaction(&self) -> bool {
        self.tx.borrow().is_some()
    }

    fn ensure_idle(&self) -> Result<(), EditorError> {
        match &*self.tx.borrow() {
            Some(tx) => Err(EditorError::TransactionInProgress(tx.label.clone())),
            None => Ok(()),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.borrow().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.borrow().can_redo()
    }

    pub fn undo_len(&self) -> usize {
        self.history.borrow().undo_len()
    }

    /// Revert the last entry. Returns its label, or `None` if nothing to undo.
    pub fn undo(&self) -> Result<Option<String>, EditorError> {
        self.ensure_idle()?;
        let Some(record) = self.history.borrow_mut().pop_undo() else {
            return Ok(None);
        };
        match self.replay(&record.mutations) {
            Ok(inverses) => {
                log::debug!("undo `{}`", record.label);
                let label = record.label.clone();
                self.history.borrow_mut().push_redo(HistoryRecord {
                    label: record.label,
                    mutations: inverses,
                });
                self.visual.update();
                Ok(Some(label))
            }
            Err(e) => {
                log::warn!("undo `{}` failed: {e}", record.label);
                self.history.borrow_mut().restore_undo(record);
                Err(e)
            }
        }
    }

    /// Re-apply the last undone entry.
    pub fn redo(&self) -> Result<Option<String>, EditorError> {
        self.ensure_idle()?;
        let Some(record) = self.history.borrow_mut().pop_redo() else {
            return Ok(None);
        };
        match self.replay(&record.mutations) {
            Ok(inverses) => {
                log::debug!("redo `{}`", record.label);
                let label = record.label.clone();
                self.history.borrow_mut().restore_undo(HistoryRecord {
                    label: record.label,
                    mutations: inverses,
                });
                self.visual.update();
                Ok(Some(label))
            }
            Err(e) => {
                log::warn!("redo `{}` failed: {e}", record.label);
                self.history.borrow_mut().push_redo(record);
                Err(e)
            }
        }
    }

    pub(crate) fn push_history(&self, record: HistoryRecord) {
        self.history.borrow_mut().push(record);
    }
}
