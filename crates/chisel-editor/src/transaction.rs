//! Transaction boundary and undo history.
//!
//! `Transaction::execute` runs a mutator against a document and records
//! everything it applies as one undo entry. If the mutator returns an error
//! or panics, every mutation it applied is reverted and no entry is pushed.
//! A transaction opened inside another one on the same document joins the
//! outer entry; only the outermost commit reaches the history.

use crate::document::{Document, TxState};
use crate::error::EditorError;
use chisel_core::{GraphMutation, ModelError, Node, NodeId, ParamValue, Subtree};

// ─── History ─────────────────────────────────────────────────────────────

/// One undoable entry: the mutations that revert it, in application order.
#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub label: String,
    pub mutations: Vec<GraphMutation>,
}

/// Undo/redo stacks with a depth limit.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<HistoryRecord>,
    redo_stack: Vec<HistoryRecord>,
    /// Maximum undo depth.
    max_depth: usize,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth.min(64)),
            redo_stack: Vec::new(),
            max_depth,
        }
    }

    /// Push a fresh entry. Clears redo; drops the oldest entry past the limit.
    pub fn push(&mut self, record: HistoryRecord) {
        self.restore_undo(record);
        self.redo_stack.clear();
    }

    /// Push onto the undo stack without touching redo.
    pub(crate) fn restore_undo(&mut self, record: HistoryRecord) {
        self.undo_stack.push(record);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
    }

    pub(crate) fn push_redo(&mut self, record: HistoryRecord) {
        self.redo_stack.push(record);
    }

    pub(crate) fn pop_undo(&mut self) -> Option<HistoryRecord> {
        self.undo_stack.pop()
    }

    pub(crate) fn pop_redo(&mut self) -> Option<HistoryRecord> {
        self.redo_stack.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn undo_labels(&self) -> impl Iterator<Item = &str> {
        self.undo_stack.iter().map(|r| r.label.as_str())
    }
}

// ─── Transaction ─────────────────────────────────────────────────────────

/// Mutation handle passed to the body of `Transaction::execute`.
pub struct Transaction<'d> {
    document: &'d Document,
}

/// Reverts to `mark` unless committed; runs on error and on unwind alike.
struct Scope<'d> {
    document: &'d Document,
    mark: usize,
    committed: bool,
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        let doc = self.document;
        if !self.committed {
            let undo: Vec<GraphMutation> = match doc.tx.borrow_mut().as_mut() {
                Some(tx) => tx.inverses.split_off(self.mark.min(tx.inverses.len())),
                None => Vec::new(),
            };
            for inverse in undo.into_iter().rev() {
                if let Err(e) = doc.apply(inverse) {
                    log::error!("rollback left document {:?} inconsistent: {e}", doc.id());
                }
            }
        }

        let finished = {
            let mut tx = doc.tx.borrow_mut();
            let Some(state) = tx.as_mut() else {
                return;
            };
            state.depth -= 1;
            if state.depth == 0 { tx.take() } else { None }
        };
        if let Some(state) = finished {
            if self.committed && !state.inverses.is_empty() {
                log::debug!("commit `{}` ({} mutations)", state.label, state.inverses.len());
                doc.push_history(HistoryRecord {
                    label: state.label,
                    mutations: state.inverses,
                });
            } else if !self.committed {
                log::warn!("transaction `{}` rolled back", state.label);
            }
        }
        doc.visual().update();
    }
}

impl<'d> Transaction<'d> {
    /// Run `body` as one undoable edit labelled `label`.
    ///
    /// Errors come back wrapped in `EditorError::TransactionAborted` after
    /// the rollback has completed.
    pub fn execute<T>(
        document: &'d Document,
        label: &str,
        body: impl FnOnce(&mut Transaction<'d>) -> Result<T, EditorError>,
    ) -> Result<T, EditorError> {
        let mark = {
            let mut tx = document.tx.borrow_mut();
            let state = tx.get_or_insert_with(|| TxState {
                label: label.to_string(),
                depth: 0,
                inverses: Vec::new(),
            });
            state.depth += 1;
            state.inverses.len()
        };
        let mut scope = Scope {
            document,
            mark,
            committed: false,
        };
        let mut tx = Transaction { document };
        match body(&mut tx) {
            Ok(value) => {
                scope.committed = true;
                drop(scope);
                Ok(value)
            }
            Err(e) => {
                drop(scope);
                Err(match e {
                    aborted @ EditorError::TransactionAborted { .. } => aborted,
                    other => EditorError::TransactionAborted {
                        label: label.to_string(),
                        source: Box::new(other),
                    },
                })
            }
        }
    }

    pub fn document(&self) -> &'d Document {
        self.document
    }

    fn apply(&mut self, mutation: GraphMutation) -> Result<(), EditorError> {
        let inverse = self.document.apply(mutation)?;
        if let Some(tx) = self.document.tx.borrow_mut().as_mut() {
            tx.inverses.push(inverse);
        }
        Ok(())
    }

    /// Append `node` as the last child of `parent`.
    pub fn add_node(&mut self, parent: NodeId, node: Node) -> Result<NodeId, EditorError> {
        let position = {
            let graph = self.document.graph();
            let idx = graph.index_of(parent).ok_or(ModelError::UnknownNode(parent))?;
            graph.children(idx).len()
        };
        let id = node.id;
        self.insert_node(parent, position, Subtree::leaf(node))?;
        Ok(id)
    }

    pub fn insert_node(&mut self, parent: NodeId, position: usize, subtree: Subtree) -> Result<(), EditorError> {
        self.apply(GraphMutation::add(parent, position, subtree))
    }

    /// Remove `id` and its whole subtree.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), EditorError> {
        self.apply(GraphMutation::RemoveNode { id })
    }

    pub fn set_parameter(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), EditorError> {
        self.apply(GraphMutation::SetParameter {
            id,
            name: name.to_string(),
            value: value.into(),
        })
    }

    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), EditorError> {
        self.apply(GraphMutation::Rename { id, name: name.into() })
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<(), EditorError> {
        self.apply(GraphMutation::SetVisible { id, visible })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::event::EventBus;
    use chisel_core::{BodyKind, BoundsKernel, Params, ShapeNode};
    use std::rc::Rc;

    fn record(label: &str) -> HistoryRecord {
        HistoryRecord {
            label: label.to_string(),
            mutations: Vec::new(),
        }
    }

    #[test]
    fn history_trims_oldest_and_clears_redo() {
        let mut h = History::new(2);
        h.push(record("a"));
        h.push(record("b"));
        h.push(record("c"));
        assert_eq!(h.undo_labels().collect::<Vec<_>>(), vec!["b", "c"]);
        let c = h.pop_undo().unwrap();
        h.push_redo(c);
        assert!(h.can_redo());
        h.push(record("d"));
        assert!(!h.can_redo());
    }

    #[test]
    fn empty_transaction_pushes_nothing() {
        let doc = Document::new(Rc::new(BoundsKernel), Rc::new(EventBus::new()), EditorConfig::default());
        Transaction::execute(&doc, "noop", |_| Ok(())).unwrap();
        assert!(!doc.can_undo());
        assert!(!doc.is_in_transaction());
    }

    #[test]
    fn nested_transactions_flatten() {
        let doc = Document::new(Rc::new(BoundsKernel), Rc::new(EventBus::new()), EditorConfig::default());
        Transaction::execute(&doc, "outer", |tx| {
            tx.add_node(NodeId::root(), Node::shape("a", ShapeNode::new(Params::defaults(BodyKind::Box))))?;
            Transaction::execute(tx.document(), "inner", |inner| {
                inner.add_node(
                    NodeId::root(),
                    Node::shape("b", ShapeNode::new(Params::defaults(BodyKind::Cylinder))),
                )
            })?;
            Ok(())
        })
        .unwrap();
        assert_eq!(doc.undo_len(), 1);
        assert_eq!(doc.undo().unwrap(), Some("outer".to_string()));
        assert_eq!(doc.node_count(), 1);
    }

    #[test]
    fn undo_is_refused_inside_a_transaction() {
        let doc = Document::new(Rc::new(BoundsKernel), Rc::new(EventBus::new()), EditorConfig::default());
        let result = Transaction::execute(&doc, "busy", |tx| tx.document().undo().map(|_| ()));
        let err = result.unwrap_err();
        assert!(matches!(err.root_cause(), EditorError::TransactionInProgress(label) if label == "busy"));
    }
}
