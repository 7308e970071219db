//! Built-in commands.

pub mod boolean;
pub mod create;
pub mod cutout;
pub mod delete;

pub use boolean::{BooleanCommand, BooleanOp};
pub use create::{CreateBodyCommand, CreateBoxCommand};
pub use cutout::{CutoutCommand, CutoutOptions, CutoutProfile};
pub use delete::DeleteCommand;

use crate::command::{CommandContext, CommandRegistry};
use crate::error::EditorError;
use crate::transaction::Transaction;
use chisel_core::{ModelError, Node, NodeId, Shape, ShapeNode, Subtree};

pub fn register_builtins(registry: &mut CommandRegistry) {
    registry.register("create.box", || Box::new(CreateBoxCommand));
    registry.register("create.popupbox", || Box::new(CreateBodyCommand::BOX));
    registry.register("create.popupcylinder", || Box::new(CreateBodyCommand::CYLINDER));
    registry.register("create.popuptube", || Box::new(CreateBodyCommand::TUBE));
    registry.register("create.popupHSection", || Box::new(CreateBodyCommand::H_SECTION));
    registry.register("create.popupLSection", || Box::new(CreateBodyCommand::L_SECTION));
    registry.register("create.popupUSection", || Box::new(CreateBodyCommand::U_SECTION));
    registry.register("create.popupTeeSection", || Box::new(CreateBodyCommand::TEE_SECTION));
    registry.register("create.popupRecSection", || Box::new(CreateBodyCommand::REC_SECTION));
    registry.register("boolean.cut", || Box::new(BooleanCommand::new(BooleanOp::Cut)));
    registry.register("boolean.fuse", || Box::new(BooleanCommand::new(BooleanOp::Fuse)));
    registry.register("modify.cutout", || Box::new(CutoutCommand::default()));
    registry.register("modify.delete", || Box::new(DeleteCommand));
}

/// Put `result` where `anchor` sits in the tree and remove `consumed`, all
/// in one transaction. The result geometry must already be computed.
pub(crate) fn replace_with_result(
    ctx: &CommandContext,
    label: &str,
    name: &str,
    anchor: NodeId,
    consumed: &[NodeId],
    result: Shape,
) -> Result<NodeId, EditorError> {
    let (parent, position) = {
        let graph = ctx.document.graph();
        let parent = graph.parent_id(anchor).ok_or(ModelError::UnknownNode(anchor))?;
        let position = graph
            .position_in_parent(anchor)
            .ok_or(ModelError::UnknownNode(anchor))?;
        (parent, position)
    };
    let node = Node::shape(name, ShapeNode::from_shape(result));
    let id = node.id;
    Transaction::execute(&ctx.document, label, |tx| {
        tx.insert_node(parent, position, Subtree::leaf(node))?;
        for &old in consumed {
            tx.remove_node(old)?;
        }
        Ok(())
    })?;
    Ok(id)
}
