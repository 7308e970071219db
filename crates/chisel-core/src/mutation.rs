//! Reversible document mutations.
//!
//! Every structural or parametric edit is a `GraphMutation`. Applying one
//! returns its exact inverse, which is what undo history and transaction
//! rollback replay. Removing a node captures the whole subtree and its
//! sibling position so the inverse puts it back where it was.

use crate::body::ParamValue;
use crate::error::ModelError;
use crate::graph::{DocumentGraph, Subtree};
use crate::id::NodeId;

#[derive(Debug, Clone)]
pub enum GraphMutation {
    AddNode {
        parent: NodeId,
        position: usize,
        subtree: Box<Subtree>,
    },
    RemoveNode {
        id: NodeId,
    },
    SetParameter {
        id: NodeId,
        name: String,
        value: ParamValue,
    },
    Rename {
        id: NodeId,
        name: String,
    },
    SetVisible {
        id: NodeId,
        visible: bool,
    },
}

/// What an applied mutation changed, for the layers that mirror the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Added(Vec<NodeId>),
    Removed(Vec<NodeId>),
    Property {
        id: NodeId,
        property: String,
        /// The node's geometry must be regenerated.
        geometry: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Applied {
    pub inverse: GraphMutation,
    pub change: Change,
}

impl GraphMutation {
    pub fn add(parent: NodeId, position: usize, subtree: Subtree) -> Self {
        GraphMutation::AddNode {
            parent,
            position,
            subtree: Box::new(subtree),
        }
    }

    /// Apply to `graph`. On error the graph is unchanged.
    pub fn apply(self, graph: &mut DocumentGraph) -> Result<Applied, ModelError> {
        match self {
            GraphMutation::AddNode {
                parent,
                position,
                subtree,
            } => {
                let ids = subtree.ids();
                let id = subtree.node.id;
                graph.attach(parent, position, *subtree)?;
                Ok(Applied {
                    inverse: GraphMutation::RemoveNode { id },
                    change: Change::Added(ids),
                })
            }
            GraphMutation::RemoveNode { id } => {
                let (parent, position, subtree) = graph.detach(id)?;
                let ids = subtree.ids();
                Ok(Applied {
                    inverse: GraphMutation::add(parent, position, subtree),
                    change: Change::Removed(ids),
                })
            }
            GraphMutation::SetParameter { id, name, value } => {
                let node = graph.node_mut(id)?;
                let body = node.as_shape_mut().ok_or(ModelError::NotAShape(id))?;
                let old = body.set_parameter(&name, value)?;
                let geometry = body
                    .params()
                    .schema()
                    .fields
                    .iter()
                    .any(|f| f.name == name && f.affects_shape);
                Ok(Applied {
                    change: Change::Property {
                        id,
                        property: name.clone(),
                        geometry,
                    },
                    inverse: GraphMutation::SetParameter {
                        id,
                        name,
                        value: old,
                    },
                })
            }
            GraphMutation::Rename { id, name } => {
                let node = graph.node_mut(id)?;
                let old = std::mem::replace(&mut node.name, name);
                Ok(Applied {
                    inverse: GraphMutation::Rename { id, name: old },
                    change: Change::Property {
                        id,
                        property: "name".to_string(),
                        geometry: false,
                    },
                })
            }
            GraphMutation::SetVisible { id, visible } => {
                let node = graph.node_mut(id)?;
                let old = std::mem::replace(&mut node.visible, visible);
                Ok(Applied {
                    inverse: GraphMutation::SetVisible { id, visible: old },
                    change: Change::Property {
                        id,
                        property: "visible".to_string(),
                        geometry: false,
                    },
                })
            }
        }
    }
}
