//! Delete the selected nodes.

use crate::command::{CommandContext, MultistepCommand};
use crate::error::EditorError;
use crate::step::{SelectNodeStep, Step, StepData};
use crate::transaction::Transaction;

/// `modify.delete`: uses the current selection when there is one,
/// otherwise asks for nodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeleteCommand;

impl MultistepCommand for DeleteCommand {
    fn key(&self) -> &'static str {
        "modify.delete"
    }

    fn steps(&self) -> Vec<Box<dyn Step>> {
        vec![Box::new(
            SelectNodeStep::new("prompt.select.models")
                .multiple()
                .keep_selection(),
        )]
    }

    fn execute_main(&self, ctx: &CommandContext, data: &[StepData]) -> Result<(), EditorError> {
        let nodes = data.first().map(|d| d.nodes.clone()).unwrap_or_default();
        if nodes.is_empty() {
            return Err(EditorError::MissingStepData(0));
        }
        let removed = Transaction::execute(&ctx.document, self.key(), |tx| {
            let mut removed = 0;
            for id in &nodes {
                // Already gone with an ancestor removed earlier in this loop.
                if tx.document().contains(*id) {
                    tx.remove_node(*id)?;
                    removed += 1;
                }
            }
            Ok(removed)
        })?;
        log::debug!("deleted {removed} node(s)");
        Ok(())
    }
}
