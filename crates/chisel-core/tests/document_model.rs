//! Integration tests: bodies → document graph → kernel → serialization.
//!
//! Exercises the `chisel-core` pipeline the editor drives: build nodes,
//! mutate them reversibly, regenerate shapes and cut them.

use chisel_core::*;
use pretty_assertions::assert_eq;
use std::rc::Rc;

// ─── Helpers ─────────────────────────────────────────────────────────────

fn graph() -> DocumentGraph {
    DocumentGraph::new(Rc::new(BoundsKernel))
}

fn add(g: &mut DocumentGraph, kind: BodyKind, values: &[(&str, ParamValue)]) -> NodeId {
    let params = Params::with(kind, values).expect("bad params");
    let node = Node::shape(format!("{kind:?}"), ShapeNode::new(params));
    let id = node.id;
    let position = g.children(g.root).len();
    GraphMutation::add(NodeId::root(), position, Subtree::leaf(node))
        .apply(g)
        .expect("add failed");
    id
}

// ─── Regeneration ────────────────────────────────────────────────────────

#[test]
fn parameter_write_regenerates_shape() {
    let mut g = graph();
    let id = add(&mut g, BodyKind::Box, &[]);
    let before = g.shape_of(id).unwrap();
    assert_eq!(before.bounds().unwrap().max, XYZ::new(10.0, 10.0, 10.0));

    let undo = GraphMutation::SetParameter {
        id,
        name: "width".into(),
        value: 25.0.into(),
    }
    .apply(&mut g)
    .unwrap()
    .inverse;
    assert_eq!(g.shape_of(id).unwrap().bounds().unwrap().max.x, 25.0);

    undo.apply(&mut g).unwrap();
    assert_eq!(g.shape_of(id).unwrap().bounds().unwrap().max.x, 10.0);
}

#[test]
fn invalid_parameter_surfaces_as_kernel_error() {
    let mut g = graph();
    let id = add(&mut g, BodyKind::Cylinder, &[("radius", (-1.0).into())]);
    assert!(matches!(
        g.shape_of(id),
        Err(ModelError::Kernel(KernelError::InvalidParameter { op: "cylinder", .. }))
    ));
}

// ─── Booleans ────────────────────────────────────────────────────────────

#[test]
fn box_cut_by_oversized_concentric_cylinder_fails() {
    let mut g = graph();
    let target = add(
        &mut g,
        BodyKind::Box,
        &[("width", 20.0.into()), ("length", 20.0.into())],
    );
    let plane = Plane::XY.translated(XYZ::new(10.0, 10.0, -1.0));
    let tool = add(
        &mut g,
        BodyKind::Cylinder,
        &[
            ("plane", plane.into()),
            ("radius", 15.0.into()),
            ("height", 12.0.into()),
        ],
    );
    let kernel = g.kernel().clone();
    let result = kernel.boolean_cut(&[g.shape_of(target).unwrap()], &[g.shape_of(tool).unwrap()]);
    assert_eq!(result, Err(KernelError::ToolNotContained));
}

#[test]
fn boolean_result_node_keeps_source_geometry() {
    let mut g = graph();
    let target = add(
        &mut g,
        BodyKind::Box,
        &[("width", 20.0.into()), ("length", 20.0.into())],
    );
    let kernel = g.kernel().clone();
    let hole = kernel
        .cylinder(XYZ::UNIT_Z, XYZ::new(10.0, 10.0, -1.0), 4.0, 12.0)
        .unwrap();
    let cut = kernel
        .boolean_cut(&[g.shape_of(target).unwrap()], &[hole])
        .unwrap();

    let node = Node::shape("cut", ShapeNode::from_shape(cut.clone()));
    let id = node.id;
    GraphMutation::add(NodeId::root(), 1, Subtree::leaf(node))
        .apply(&mut g)
        .unwrap();
    assert_eq!(g.shape_of(id).unwrap(), cut);

    let bytes = serialize::encode(&g).unwrap();
    let back = serialize::decode(&bytes, g.kernel().clone()).unwrap();
    assert_eq!(back.shape_of(id).unwrap().voids.len(), 1);
}

// ─── Structure ───────────────────────────────────────────────────────────

#[test]
fn removing_and_restoring_keeps_document_bytes() {
    let mut g = graph();
    add(&mut g, BodyKind::Box, &[]);
    let middle = add(&mut g, BodyKind::Tube, &[]);
    add(&mut g, BodyKind::LSection, &[]);
    let before = serialize::encode(&g).unwrap();

    let undo = GraphMutation::RemoveNode { id: middle }
        .apply(&mut g)
        .unwrap()
        .inverse;
    assert_eq!(g.shape_nodes().len(), 2);
    undo.apply(&mut g).unwrap();

    assert_eq!(serialize::encode(&g).unwrap(), before);
}
