//! Integration tests: transactions, rollback and undo/redo.

use chisel_core::{BodyKind, BoundsKernel, ModelError, Node, NodeId, Params, ShapeNode};
use chisel_editor::event::PropertyChanged;
use chisel_editor::{Document, EditorConfig, EditorError, EventBus, Transaction};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

fn make_doc(config: EditorConfig) -> Rc<Document> {
    let _ = env_logger::builder().is_test(true).try_init();
    Document::new(Rc::new(BoundsKernel), Rc::new(EventBus::new()), config)
}

fn new_box(name: &str) -> Node {
    Node::shape(name, ShapeNode::new(Params::defaults(BodyKind::Box)))
}

fn add_box(doc: &Document, name: &str) -> NodeId {
    Transaction::execute(doc, "add", |tx| tx.add_node(NodeId::root(), new_box(name))).unwrap()
}

fn width(doc: &Document, id: NodeId) -> f64 {
    doc.graph()
        .get_by_id(id)
        .and_then(Node::as_shape)
        .and_then(|s| s.params().number("width").ok())
        .unwrap()
}

// ─── Rollback ────────────────────────────────────────────────────────────

#[test]
fn failure_midway_restores_the_exact_document() {
    let doc = make_doc(EditorConfig::default());
    let existing = add_box(&doc, "existing");
    let before = doc.encode().unwrap();
    let undo_before = doc.undo_len();
    let missing = NodeId::intern("missing_node");

    let err = Transaction::execute(&doc, "three steps", |tx| {
        tx.add_node(NodeId::root(), new_box("first"))?;
        tx.set_parameter(existing, "width", 25.0)?;
        tx.set_parameter(missing, "width", 5.0)?;
        tx.add_node(NodeId::root(), new_box("never"))?;
        Ok(())
    })
    .unwrap_err();

    match &err {
        EditorError::TransactionAborted { label, source } => {
            assert_eq!(label, "three steps");
            assert!(matches!(**source, EditorError::Model(ModelError::UnknownNode(id)) if id == missing));
        }
        other => panic!("expected an aborted transaction, got {other:?}"),
    }
    assert_eq!(doc.encode().unwrap(), before);
    assert_eq!(doc.undo_len(), undo_before);
    assert_eq!(width(&doc, existing), 10.0);
    assert!(!doc.is_in_transaction());
}

#[test]
fn panic_inside_a_transaction_rolls_back() {
    let doc = make_doc(EditorConfig::default());
    let before = doc.encode().unwrap();

    let result = catch_unwind(AssertUnwindSafe(|| {
        Transaction::execute(&doc, "boom", |tx| -> Result<(), EditorError> {
            tx.add_node(NodeId::root(), new_box("doomed"))?;
            panic!("boom")
        })
    }));

    assert!(result.is_err());
    assert!(!doc.is_in_transaction());
    assert_eq!(doc.encode().unwrap(), before);
    assert_eq!(doc.undo_len(), 0);
}

#[test]
fn empty_transaction_records_nothing() {
    let doc = make_doc(EditorConfig::default());
    Transaction::execute(&doc, "noop", |_| Ok(())).unwrap();
    assert_eq!(doc.undo_len(), 0);
}

// ─── Nesting ─────────────────────────────────────────────────────────────

#[test]
fn nested_failure_only_undoes_the_inner_part() {
    let doc = make_doc(EditorConfig::default());

    let (kept, dropped) = Transaction::execute(&doc, "outer", |tx| {
        let kept = tx.add_node(NodeId::root(), new_box("kept"))?;
        let mut dropped = None;
        let inner = Transaction::execute(tx.document(), "inner", |inner| {
            dropped = Some(inner.add_node(NodeId::root(), new_box("dropped"))?);
            Err::<(), _>(EditorError::FaceNotPlanar)
        });
        assert!(inner.is_err());
        Ok((kept, dropped.unwrap()))
    })
    .unwrap();

    assert!(doc.contains(kept));
    assert!(!doc.contains(dropped));
    assert_eq!(doc.undo_len(), 1);
    assert_eq!(doc.undo().unwrap().as_deref(), Some("outer"));
    assert!(!doc.contains(kept));
}

#[test]
fn nested_success_is_one_history_entry() {
    let doc = make_doc(EditorConfig::default());
    Transaction::execute(&doc, "outer", |tx| {
        tx.add_node(NodeId::root(), new_box("a"))?;
        Transaction::execute(tx.document(), "inner", |inner| {
            inner.add_node(NodeId::root(), new_box("b"))
        })?;
        Ok(())
    })
    .unwrap();

    assert_eq!(doc.undo_len(), 1);
    doc.undo().unwrap();
    assert!(doc.graph().shape_nodes().is_empty());
}

#[test]
fn undo_is_refused_inside_a_transaction() {
    let doc = make_doc(EditorConfig::default());
    add_box(&doc, "a");
    let result = Transaction::execute(&doc, "edit", |tx| {
        match tx.document().undo() {
            Err(EditorError::TransactionInProgress(label)) => assert_eq!(label, "edit"),
            other => panic!("undo should be refused, got {other:?}"),
        }
        Ok(())
    });
    assert!(result.is_ok());
    assert_eq!(doc.undo_len(), 1);
}

// ─── Undo / redo ─────────────────────────────────────────────────────────

#[test]
fn undo_redo_parameter_edit() {
    let doc = make_doc(EditorConfig::default());
    let id = add_box(&doc, "a");
    Transaction::execute(&doc, "resize", |tx| tx.set_parameter(id, "width", 30.0)).unwrap();
    assert_eq!(width(&doc, id), 30.0);

    assert_eq!(doc.undo().unwrap().as_deref(), Some("resize"));
    assert_eq!(width(&doc, id), 10.0);
    assert!(doc.can_redo());

    assert_eq!(doc.redo().unwrap().as_deref(), Some("resize"));
    assert_eq!(width(&doc, id), 30.0);
    assert_eq!(doc.shape_of(id).unwrap().bounds().unwrap().size().x, 30.0);
}

#[test]
fn new_edit_clears_redo() {
    let doc = make_doc(EditorConfig::default());
    let id = add_box(&doc, "a");
    Transaction::execute(&doc, "resize", |tx| tx.set_parameter(id, "width", 30.0)).unwrap();
    doc.undo().unwrap();
    Transaction::execute(&doc, "rename", |tx| tx.rename(id, "renamed")).unwrap();
    assert!(!doc.can_redo());
    assert_eq!(doc.redo().unwrap(), None);
}

#[test]
fn history_is_bounded() {
    let doc = make_doc(EditorConfig {
        history_depth: 3,
        ..EditorConfig::default()
    });
    for i in 0..5 {
        add_box(&doc, &format!("box {i}"));
    }
    assert_eq!(doc.undo_len(), 3);
    for _ in 0..3 {
        assert!(doc.undo().unwrap().is_some());
    }
    assert_eq!(doc.undo().unwrap(), None);
    assert_eq!(doc.graph().shape_nodes().len(), 2);
}

#[test]
fn parameter_writes_are_announced() {
    let doc = make_doc(EditorConfig::default());
    let id = add_box(&doc, "a");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    doc.bus()
        .subscribe::<PropertyChanged>(move |args| sink.borrow_mut().push((args.node, args.property.clone())));

    Transaction::execute(&doc, "resize", |tx| tx.set_parameter(id, "height", 4.0)).unwrap();
    doc.undo().unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![(id, "height".to_string()), (id, "height".to_string())]
    );
}

#[test]
fn decoded_document_matches_the_original() {
    let doc = make_doc(EditorConfig::default());
    let id = add_box(&doc, "a");
    Transaction::execute(&doc, "resize", |tx| tx.set_parameter(id, "width", 12.5)).unwrap();
    let bytes = doc.encode().unwrap();

    let copy = Document::decode(
        &bytes,
        Rc::new(BoundsKernel),
        Rc::new(EventBus::new()),
        EditorConfig::default(),
    )
    .unwrap();
    assert_eq!(copy.encode().unwrap(), bytes);
    assert_eq!(width(&copy, id), 12.5);
    assert!(!copy.can_undo());
    assert_eq!(copy.visual().visual_count(), 1);
}
