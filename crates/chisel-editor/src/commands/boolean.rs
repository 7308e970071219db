//! Boolean cut and fuse of two shape nodes.

use super::replace_with_result;
use crate::command::{CommandContext, MultistepCommand};
use crate::error::EditorError;
use crate::step::{SelectNodeStep, Step, StepData};
use chisel_core::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    /// Subtract the second pick from the first.
    Cut,
    Fuse,
}

#[derive(Debug, Clone, Copy)]
pub struct BooleanCommand {
    op: BooleanOp,
}

impl BooleanCommand {
    pub fn new(op: BooleanOp) -> Self {
        Self { op }
    }

    fn picked(data: &[StepData], step: usize) -> Result<NodeId, EditorError> {
        data.get(step)
            .and_then(StepData::first_node)
            .ok_or(EditorError::MissingStepData(step))
    }
}

impl MultistepCommand for BooleanCommand {
    fn key(&self) -> &'static str {
        match self.op {
            BooleanOp::Cut => "boolean.cut",
            BooleanOp::Fuse => "boolean.fuse",
        }
    }

    fn steps(&self) -> Vec<Box<dyn Step>> {
        let (first, second) = match self.op {
            BooleanOp::Cut => ("prompt.select.shape", "prompt.select.cutter"),
            BooleanOp::Fuse => ("prompt.select.shape", "prompt.select.other"),
        };
        vec![
            Box::new(SelectNodeStep::new(first).with_filter(|node, _| node.is_shape())),
            Box::new(SelectNodeStep::new(second).with_filter(|node, prev| {
                node.is_shape() && !prev.first().is_some_and(|d| d.nodes.contains(&node.id))
            })),
        ]
    }

    fn execute_main(&self, ctx: &CommandContext, data: &[StepData]) -> Result<(), EditorError> {
        let target = Self::picked(data, 0)?;
        let tool = Self::picked(data, 1)?;
        let target_shape = ctx.document.shape_of(target)?;
        let tool_shape = ctx.document.shape_of(tool)?;
        let kernel = ctx.document.kernel();
        let (result, name) = match self.op {
            BooleanOp::Cut => (kernel.boolean_cut(&[target_shape], &[tool_shape])?, "Cut"),
            BooleanOp::Fuse => (kernel.boolean_fuse(&[target_shape], &[tool_shape])?, "Fuse"),
        };
        let id = replace_with_result(ctx, self.key(), name, target, &[target, tool], result)?;
        log::debug!("{} {target} with {tool} -> {id}", self.key());
        Ok(())
    }
}
