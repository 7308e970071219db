//! Integration tests: multistep commands driven end to end.

use chisel_core::{
    BodyKind, BoundsKernel, KernelError, Node, NodeId, ParamValue, Params, Plane, ShapeNode, XYZ,
};
use chisel_editor::event::ShowToast;
use chisel_editor::{
    AsyncController, CancelReason, CommandContext, CommandOutcome, CommandRegistry, ControllerState,
    Document, EditorConfig, EditorError, EventBus, Transaction, View,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

struct Fixture {
    bus: Rc<EventBus>,
    doc: Rc<Document>,
    view: Rc<View>,
    registry: CommandRegistry,
}

impl Fixture {
    fn new() -> Self {
        init_logging();
        let bus = Rc::new(EventBus::new());
        let doc = Document::new(Rc::new(BoundsKernel), bus.clone(), EditorConfig::default());
        let view = View::new(doc.clone());
        Self {
            bus,
            doc,
            view,
            registry: CommandRegistry::with_builtins(),
        }
    }

    fn ctx(&self) -> CommandContext {
        CommandContext::new(self.view.clone())
    }

    fn add(&self, kind: BodyKind, origin: XYZ, values: &[(&str, f64)]) -> NodeId {
        let mut params: Vec<(&str, ParamValue)> = vec![("plane", Plane::XY.with_origin(origin).into())];
        params.extend(values.iter().map(|&(k, v)| (k, v.into())));
        let params = Params::with(kind, &params).unwrap();
        Transaction::execute(&self.doc, "setup", |tx| {
            tx.add_node(NodeId::root(), Node::shape("setup", ShapeNode::new(params)))
        })
        .unwrap()
    }

    fn toasts(&self) -> Rc<RefCell<Vec<String>>> {
        let toasts = Rc::new(RefCell::new(Vec::new()));
        let sink = toasts.clone();
        self.bus.subscribe::<ShowToast>(move |msg| sink.borrow_mut().push(msg.clone()));
        toasts
    }

    fn kind_of(&self, id: NodeId) -> Option<BodyKind> {
        self.doc
            .graph()
            .get_by_id(id)
            .and_then(Node::as_shape)
            .map(ShapeNode::kind)
    }

    fn only_shape(&self) -> NodeId {
        let nodes = self.doc.graph().shape_nodes();
        assert_eq!(nodes.len(), 1, "expected exactly one shape node");
        nodes[0]
    }
}

// ─── Create ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_box_from_three_points() {
    let fx = Fixture::new();
    let controller = AsyncController::new();
    let ctx = fx.ctx();

    let (outcome, ()) = tokio::join!(fx.registry.run("create.box", &ctx, &controller), async {
        settle().await;
        fx.view.click(0.0, 0.0);
        settle().await;
        fx.view.pointer_move(8.0, 4.0);
        assert!(fx.doc.visual().preview_count() > 0);
        fx.view.click(10.0, 5.0);
        settle().await;
        fx.view.click(10.0, 12.0);
    });

    assert!(outcome.is_completed(), "{outcome:?}");
    assert_eq!(controller.state(), ControllerState::Succeeded);
    let id = fx.only_shape();
    let graph = fx.doc.graph();
    let params = graph.get_by_id(id).and_then(Node::as_shape).unwrap().params();
    assert_eq!(params.kind(), BodyKind::Box);
    assert!((params.number("width").unwrap() - 10.0).abs() < 1e-9);
    assert!((params.number("length").unwrap() - 5.0).abs() < 1e-9);
    assert!((params.number("height").unwrap() - 7.0).abs() < 1e-9);
    drop(graph);
    assert_eq!(fx.doc.undo_len(), 1);
    assert_eq!(fx.doc.visual().preview_count(), 0);
    assert_eq!(fx.view.handler_depth(), 0);
}

/// Run `create.box`, press Escape while `step` is waiting, and check that
/// nothing the command touched is left behind.
async fn cancel_create_box_at(step: usize) {
    let fx = Fixture::new();
    let box_id = fx.add(BodyKind::Box, XYZ::new(40.0, 40.0, 0.0), &[]);
    let before = fx.doc.encode().unwrap();
    let undo_before = fx.doc.undo_len();
    let controller = AsyncController::new();
    let ctx = fx.ctx();

    let (outcome, ()) = tokio::join!(fx.registry.run("create.box", &ctx, &controller), async {
        settle().await;
        if step >= 2 {
            fx.view.click(0.0, 0.0);
            settle().await;
            fx.view.pointer_move(6.0, 6.0);
            assert!(fx.doc.visual().preview_count() > 0);
        }
        if step >= 3 {
            fx.view.click(10.0, 5.0);
            settle().await;
            fx.view.pointer_move(10.0, 9.0);
        }
        if step == 1 {
            fx.view.pointer_move(3.0, 3.0);
        }
        assert_eq!(fx.view.handler_depth(), 1);
        fx.view.key("Escape");
    });

    assert!(
        matches!(outcome, CommandOutcome::Cancelled(CancelReason::User)),
        "step {step}: {outcome:?}"
    );
    assert_eq!(fx.doc.encode().unwrap(), before, "step {step}");
    assert_eq!(fx.doc.undo_len(), undo_before);
    assert_eq!(fx.doc.visual().preview_count(), 0, "step {step}");
    assert_eq!(fx.doc.visual().highlight_count(), 0, "step {step}");
    assert_eq!(fx.view.handler_depth(), 0);
    assert!(fx.doc.contains(box_id));
}

#[tokio::test]
async fn cancelling_at_any_step_leaves_no_trace() {
    for step in 1..=3 {
        cancel_create_box_at(step).await;
    }
}

#[tokio::test]
async fn cancelling_the_face_pick_of_a_cutout_releases_highlights() {
    let fx = Fixture::new();
    let slab = fx.add(BodyKind::Box, XYZ::ZERO, &[("width", 40.0), ("length", 40.0), ("height", 10.0)]);
    let before = fx.doc.encode().unwrap();
    let undo_before = fx.doc.undo_len();
    let controller = AsyncController::new();
    let ctx = fx.ctx();

    let (outcome, ()) = tokio::join!(fx.registry.run("modify.cutout", &ctx, &controller), async {
        settle().await;
        fx.view.click(20.0, 20.0);
        settle().await;
        assert_eq!(fx.view.active_handler_name(), "subshape-selection");
        fx.view.pointer_move(20.0, 20.0);
        assert!(fx.doc.visual().highlight_count() > 0);
        fx.view.key("Escape");
    });

    assert!(matches!(outcome, CommandOutcome::Cancelled(CancelReason::User)), "{outcome:?}");
    assert_eq!(fx.doc.encode().unwrap(), before);
    assert_eq!(fx.doc.undo_len(), undo_before);
    assert_eq!(fx.doc.visual().highlight_count(), 0);
    assert_eq!(fx.doc.visual().preview_count(), 0);
    assert_eq!(fx.view.handler_depth(), 0);
    assert!(fx.doc.contains(slab));
}

#[tokio::test]
async fn one_shot_bodies_land_on_the_workplane() {
    let fx = Fixture::new();
    let plane = Plane::XY.with_origin(XYZ::new(0.0, 0.0, 5.0));
    fx.view.set_workplane(plane);
    let outcome = fx
        .registry
        .run("create.popupcylinder", &fx.ctx(), &AsyncController::new())
        .await;
    assert!(outcome.is_completed(), "{outcome:?}");
    let id = fx.only_shape();
    assert_eq!(fx.kind_of(id), Some(BodyKind::Cylinder));
    let shape = fx.doc.shape_of(id).unwrap();
    let (z0, z1) = shape.extent_along(XYZ::UNIT_Z).unwrap();
    assert!((z0 - 5.0).abs() < 1e-9);
    assert!((z1 - 25.0).abs() < 1e-9);
}

// ─── Boolean ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn boolean_cut_replaces_both_operands() {
    let fx = Fixture::new();
    let target = fx.add(BodyKind::Box, XYZ::ZERO, &[("width", 40.0), ("length", 40.0), ("height", 10.0)]);
    let tool = fx.add(BodyKind::Cylinder, XYZ::new(20.0, 20.0, 0.0), &[("radius", 5.0), ("height", 20.0)]);
    let controller = AsyncController::new();
    let ctx = fx.ctx();

    let (outcome, ()) = tokio::join!(fx.registry.run("boolean.cut", &ctx, &controller), async {
        settle().await;
        // The box is the only thing under this corner.
        fx.view.click(2.0, 2.0);
        settle().await;
        fx.view.click(20.0, 20.0);
    });

    assert!(outcome.is_completed(), "{outcome:?}");
    assert!(!fx.doc.contains(target));
    assert!(!fx.doc.contains(tool));
    let result = fx.only_shape();
    assert_eq!(fx.kind_of(result), Some(BodyKind::Boolean));
    assert_eq!(fx.doc.shape_of(result).unwrap().voids.len(), 1);
    assert!(fx.doc.selection().selected().is_empty());

    assert_eq!(fx.doc.undo().unwrap().as_deref(), Some("boolean.cut"));
    assert!(fx.doc.contains(target));
    assert!(fx.doc.contains(tool));
    assert!(!fx.doc.contains(result));
}

#[tokio::test]
async fn kernel_failure_leaves_the_document_untouched() {
    let fx = Fixture::new();
    let toasts = fx.toasts();
    let target = fx.add(BodyKind::Box, XYZ::ZERO, &[("width", 20.0), ("length", 20.0), ("height", 20.0)]);
    let tool = fx.add(BodyKind::Cylinder, XYZ::new(10.0, 10.0, 0.0), &[("radius", 15.0), ("height", 10.0)]);
    let before = fx.doc.encode().unwrap();
    let undo_before = fx.doc.undo_len();
    let controller = AsyncController::new();
    let ctx = fx.ctx();

    let (outcome, ()) = tokio::join!(fx.registry.run("boolean.cut", &ctx, &controller), async {
        settle().await;
        // The box is taller, so it is on top here.
        fx.view.click(10.0, 10.0);
        settle().await;
        fx.view.click(10.0, 24.0);
    });

    match outcome {
        CommandOutcome::Failed(EditorError::Geometry(KernelError::ToolNotContained)) => {}
        other => panic!("expected ToolNotContained, got {other:?}"),
    }
    assert_eq!(fx.doc.encode().unwrap(), before);
    assert_eq!(fx.doc.undo_len(), undo_before);
    assert!(fx.doc.contains(target) && fx.doc.contains(tool));
    assert_eq!(toasts.borrow().len(), 1);
    assert!(controller.state() != ControllerState::Succeeded);
}

#[tokio::test]
async fn node_deleted_while_waiting_is_reported_stale() {
    let fx = Fixture::new();
    let toasts = fx.toasts();
    let a = fx.add(BodyKind::Box, XYZ::ZERO, &[]);
    let b = fx.add(BodyKind::Box, XYZ::new(30.0, 0.0, 0.0), &[]);
    let controller = AsyncController::new();
    let ctx = fx.ctx();

    let (outcome, ()) = tokio::join!(fx.registry.run("boolean.fuse", &ctx, &controller), async {
        settle().await;
        fx.view.click(5.0, 5.0);
        settle().await;
        Transaction::execute(&fx.doc, "external", |tx| tx.remove_node(a)).unwrap();
        fx.view.click(35.0, 5.0);
    });

    match outcome {
        CommandOutcome::Failed(EditorError::StaleSelection(id)) => assert_eq!(id, a),
        other => panic!("expected a stale selection, got {other:?}"),
    }
    assert!(fx.doc.contains(b));
    assert_eq!(fx.doc.graph().shape_nodes(), vec![b]);
    assert_eq!(toasts.borrow().len(), 1);
}

#[tokio::test]
async fn second_pick_cannot_reuse_the_first() {
    let fx = Fixture::new();
    let a = fx.add(BodyKind::Box, XYZ::ZERO, &[]);
    fx.add(BodyKind::Box, XYZ::new(30.0, 0.0, 0.0), &[]);
    let controller = AsyncController::new();
    let ctx = fx.ctx();

    let (outcome, ()) = tokio::join!(fx.registry.run("boolean.fuse", &ctx, &controller), async {
        settle().await;
        fx.view.click(5.0, 5.0);
        settle().await;
        // Filtered out: still waiting for the second operand.
        fx.view.click(5.0, 5.0);
        assert_eq!(fx.view.active_handler_name(), "node-selection");
        fx.view.key("Escape");
    });

    assert!(matches!(outcome, CommandOutcome::Cancelled(CancelReason::User)));
    assert!(fx.doc.contains(a));
    assert_eq!(fx.doc.graph().shape_nodes().len(), 2);
}

// ─── Cutout ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn cutout_pierces_the_picked_face() {
    let fx = Fixture::new();
    let slab = fx.add(BodyKind::Box, XYZ::ZERO, &[("width", 40.0), ("length", 40.0), ("height", 10.0)]);
    let controller = AsyncController::new();
    let ctx = fx.ctx();

    let (outcome, ()) = tokio::join!(fx.registry.run("modify.cutout", &ctx, &controller), async {
        settle().await;
        fx.view.click(20.0, 20.0);
        settle().await;
        fx.view.click(20.0, 20.0);
    });

    assert!(outcome.is_completed(), "{outcome:?}");
    assert!(!fx.doc.contains(slab));
    let result = fx.only_shape();
    let shape = fx.doc.shape_of(result).unwrap();
    assert_eq!(shape.voids.len(), 1);
    let (z0, z1) = shape.voids[0].extent_along(XYZ::UNIT_Z);
    assert!(z0 < 0.0 && z1 > 10.0, "through cut spans the slab: {z0}..{z1}");
    assert_eq!(fx.doc.undo_len(), 2);
}

// ─── Delete & registry ───────────────────────────────────────────────────

#[tokio::test]
async fn delete_uses_the_current_selection() {
    let fx = Fixture::new();
    let a = fx.add(BodyKind::Box, XYZ::ZERO, &[]);
    let b = fx.add(BodyKind::Box, XYZ::new(30.0, 0.0, 0.0), &[]);
    let c = fx.add(BodyKind::Box, XYZ::new(60.0, 0.0, 0.0), &[]);
    fx.view.click(5.0, 5.0);
    fx.view.shift_click(35.0, 5.0);

    let outcome = fx.registry.run("modify.delete", &fx.ctx(), &AsyncController::new()).await;

    assert!(outcome.is_completed(), "{outcome:?}");
    assert!(!fx.doc.contains(a) && !fx.doc.contains(b));
    assert!(fx.doc.contains(c));
    assert_eq!(fx.doc.undo().unwrap().as_deref(), Some("modify.delete"));
    assert!(fx.doc.contains(a) && fx.doc.contains(b));
}

#[tokio::test]
async fn closing_the_view_aborts_the_command() {
    let fx = Fixture::new();
    let controller = AsyncController::new();
    let ctx = fx.ctx();

    let (outcome, ()) = tokio::join!(fx.registry.run("create.box", &ctx, &controller), async {
        settle().await;
        fx.view.click(0.0, 0.0);
        settle().await;
        fx.view.close();
    });

    assert!(matches!(outcome, CommandOutcome::Cancelled(CancelReason::ViewClosed)));
    assert!(fx.doc.graph().shape_nodes().is_empty());
    assert_eq!(fx.doc.visual().preview_count(), 0);
}

#[tokio::test]
async fn unknown_command_fails_without_side_effects() {
    let fx = Fixture::new();
    let toasts = fx.toasts();
    let controller = AsyncController::new();
    let outcome = fx.registry.run("create.sphere", &fx.ctx(), &controller).await;
    assert!(matches!(outcome, CommandOutcome::Failed(EditorError::UnknownCommand(ref k)) if k == "create.sphere"));
    assert!(!controller.is_pending());
    assert_eq!(toasts.borrow().len(), 1);
}

#[test]
fn builtin_keys_are_registered() {
    let registry = CommandRegistry::with_builtins();
    let keys: Vec<_> = registry.keys().collect();
    for key in [
        "boolean.cut",
        "boolean.fuse",
        "create.box",
        "create.popupHSection",
        "create.popupbox",
        "modify.cutout",
        "modify.delete",
    ] {
        assert!(keys.contains(&key), "missing {key}");
    }
    assert_eq!(keys.len(), 13);
}
