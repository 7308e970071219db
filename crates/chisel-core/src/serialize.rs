//! Binary document format.
//!
//! A document is written as a MessagePack tree of `NodeRecord`s in document
//! order. Body parameters are emitted in schema order by field name; on
//! read, missing fields fall back to schema defaults and unknown fields are
//! rejected. Derived shapes are never written, only boolean sources.

use crate::body::{ParamValue, Params, Schema};
use crate::error::ModelError;
use crate::graph::{DocumentGraph, Subtree};
use crate::id::NodeId;
use crate::kernel::ShapeFactory;
use crate::model::{Node, NodeKind, ShapeNode};
use crate::shape::Shape;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub version: u32,
    pub nodes: Vec<NodeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub name: String,
    pub visible: bool,
    /// `None` for folders.
    pub body: Option<BodyRecord>,
    pub children: Vec<NodeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRecord {
    #[serde(rename = "type")]
    pub type_name: String,
    pub params: Vec<(String, ParamValue)>,
    pub source: Option<Shape>,
}

// ─── Encode ──────────────────────────────────────────────────────────────

pub fn to_record(graph: &DocumentGraph) -> DocumentRecord {
    DocumentRecord {
        version: FORMAT_VERSION,
        nodes: graph
            .children(graph.root)
            .iter()
            .map(|&idx| node_record(graph, idx))
            .collect(),
    }
}

fn node_record(graph: &DocumentGraph, idx: NodeIndex) -> NodeRecord {
    let node = &graph.graph[idx];
    let body = node.as_shape().map(|body| BodyRecord {
        type_name: body.params().schema().type_name.to_string(),
        params: body
            .params()
            .iter()
            .map(|(field, value)| (field.name.to_string(), value))
            .collect(),
        source: body.source().cloned(),
    });
    NodeRecord {
        id: node.id,
        name: node.name.clone(),
        visible: node.visible,
        body,
        children: graph
            .children(idx)
            .iter()
            .map(|&c| node_record(graph, c))
            .collect(),
    }
}

pub fn encode(graph: &DocumentGraph) -> Result<Vec<u8>, ModelError> {
    rmp_serde::to_vec_named(&to_record(graph)).map_err(|e| ModelError::Serialization(e.to_string()))
}

// ─── Decode ──────────────────────────────────────────────────────────────

fn subtree(record: NodeRecord) -> Result<Subtree, ModelError> {
    let kind = match record.body {
        None => NodeKind::Folder,
        Some(body) => {
            let schema = Schema::by_type_name(&body.type_name).ok_or_else(|| {
                ModelError::Serialization(format!("unknown body type `{}`", body.type_name))
            })?;
            let mut params = Params::defaults(schema.kind);
            for (name, value) in body.params {
                params.set(&name, value)?;
            }
            let shape = match body.source {
                Some(source) => ShapeNode::from_shape(source),
                None => ShapeNode::new(params),
            };
            NodeKind::Shape(shape)
        }
    };
    let children = record
        .children
        .into_iter()
        .map(subtree)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Subtree {
        node: Node {
            id: record.id,
            name: record.name,
            visible: record.visible,
            kind,
        },
        children,
    })
}

pub fn from_record(
    record: DocumentRecord,
    kernel: Rc<dyn ShapeFactory>,
) -> Result<DocumentGraph, ModelError> {
    if record.version != FORMAT_VERSION {
        return Err(ModelError::Serialization(format!(
            "unsupported format version {}",
            record.version
        )));
    }
    let mut graph = DocumentGraph::new(kernel);
    for (i, node) in record.nodes.into_iter().enumerate() {
        graph.attach(NodeId::root(), i, subtree(node)?)?;
    }
    Ok(graph)
}

pub fn decode(bytes: &[u8], kernel: Rc<dyn ShapeFactory>) -> Result<DocumentGraph, ModelError> {
    let record: DocumentRecord =
        rmp_serde::from_slice(bytes).map_err(|e| ModelError::Serialization(e.to_string()))?;
    from_record(record, kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyKind;
    use crate::kernel::BoundsKernel;
    use crate::mutation::GraphMutation;
    use pretty_assertions::assert_eq;

    fn kernel() -> Rc<dyn ShapeFactory> {
        Rc::new(BoundsKernel)
    }

    #[test]
    fn document_survives_encode_decode() {
        let mut g = DocumentGraph::new(kernel());
        let folder = Node::folder(NodeId::with_prefix("folder"), "frame");
        let folder_id = folder.id;
        GraphMutation::add(NodeId::root(), 0, Subtree::leaf(folder))
            .apply(&mut g)
            .unwrap();
        let params = Params::with(BodyKind::Tube, &[("outerRadius", 8.0.into())]).unwrap();
        let tube = Node::shape("pipe", ShapeNode::new(params));
        GraphMutation::add(folder_id, 0, Subtree::leaf(tube))
            .apply(&mut g)
            .unwrap();

        let bytes = encode(&g).unwrap();
        let back = decode(&bytes, kernel()).unwrap();
        assert_eq!(to_record(&back), to_record(&g));
        assert_eq!(encode(&back).unwrap(), bytes);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let record = DocumentRecord {
            version: FORMAT_VERSION,
            nodes: vec![NodeRecord {
                id: NodeId::intern("legacy_box"),
                name: "legacy".into(),
                visible: true,
                body: Some(BodyRecord {
                    type_name: "BoxNode".into(),
                    params: vec![("width".into(), 3.0.into())],
                    source: None,
                }),
                children: vec![],
            }],
        };
        let g = from_record(record, kernel()).unwrap();
        let node = g.node(NodeId::intern("legacy_box")).unwrap();
        let params = node.as_shape().unwrap().params();
        assert_eq!(params.number("width").unwrap(), 3.0);
        assert_eq!(params.number("height").unwrap(), 10.0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let record = DocumentRecord {
            version: FORMAT_VERSION,
            nodes: vec![NodeRecord {
                id: NodeId::intern("odd_box"),
                name: "odd".into(),
                visible: true,
                body: Some(BodyRecord {
                    type_name: "BoxNode".into(),
                    params: vec![("depth".into(), 3.0.into())],
                    source: None,
                }),
                children: vec![],
            }],
        };
        assert!(matches!(
            from_record(record, kernel()),
            Err(ModelError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn garbage_bytes_fail_cleanly() {
        assert!(matches!(
            decode(&[0xc1, 0x00], kernel()),
            Err(ModelError::Serialization(_))
        ));
    }
}
