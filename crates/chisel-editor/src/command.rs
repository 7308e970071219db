//! Multistep command orchestration.
//!
//! A command lists its steps; `run_command` runs them strictly in order,
//! each under a child of the command's controller, then hands the collected
//! data to the command's main task. Anything allocated for a pick is torn
//! down by the pick itself, so aborting is just returning early.
//!
//! After every suspension point the view is checked again, and before the
//! main task every node an earlier step picked must still exist: other
//! commands may have run while this one was waiting for input.

use crate::controller::{AsyncController, ControllerState, Outcome};
use crate::document::Document;
use crate::error::{CancelReason, EditorError};
use crate::event::ShowToast;
use crate::step::{Step, StepData};
use crate::view::View;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Where a command runs. Passed down explicitly; there is no ambient
/// "active view".
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub document: Rc<Document>,
    pub view: Rc<View>,
}

impl CommandContext {
    pub fn new(view: Rc<View>) -> Self {
        Self {
            document: view.document().clone(),
            view,
        }
    }
}

pub trait MultistepCommand {
    fn key(&self) -> &'static str;

    fn steps(&self) -> Vec<Box<dyn Step>>;

    /// Build the result from the collected step data. Runs only after every
    /// step succeeded.
    fn execute_main(&self, ctx: &CommandContext, data: &[StepData]) -> Result<(), EditorError>;
}

#[derive(Debug)]
pub enum CommandOutcome {
    Completed,
    Cancelled(CancelReason),
    Failed(EditorError),
}

impl CommandOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CommandOutcome::Completed)
    }
}

async fn run_steps(
    command: &dyn MultistepCommand,
    ctx: &CommandContext,
    controller: &AsyncController,
) -> CommandOutcome {
    let steps = command.steps();
    let mut data: Vec<StepData> = Vec::with_capacity(steps.len());

    for (i, step) in steps.iter().enumerate() {
        if ctx.view.is_closed() {
            return CommandOutcome::Cancelled(CancelReason::ViewClosed);
        }
        if let ControllerState::Cancelled(reason) = controller.state() {
            return CommandOutcome::Cancelled(reason);
        }
        log::debug!("{} step {}/{}: {}", command.key(), i + 1, steps.len(), step.prompt());
        let child = controller.child();
        let outcome = step.execute(ctx, &data, &child).await;
        child.dispose();
        if ctx.view.is_closed() {
            return CommandOutcome::Cancelled(CancelReason::ViewClosed);
        }
        match outcome {
            Outcome::Succeeded(step_data) => data.push(step_data),
            Outcome::Cancelled(reason) => {
                log::debug!("{} cancelled at step {}: {reason:?}", command.key(), i + 1);
                return CommandOutcome::Cancelled(reason);
            }
        }
    }

    for step_data in &data {
        for node in step_data.referenced_nodes() {
            if !ctx.document.contains(node) {
                return CommandOutcome::Failed(EditorError::StaleSelection(node));
            }
        }
    }

    match command.execute_main(ctx, &data) {
        Ok(()) => CommandOutcome::Completed,
        Err(e) => CommandOutcome::Failed(e),
    }
}

/// Run `command` to completion. The selection is cleared whatever the
/// outcome, and `controller` ends up resolved to match it.
pub async fn run_command(
    command: &dyn MultistepCommand,
    ctx: &CommandContext,
    controller: &AsyncController,
) -> CommandOutcome {
    log::debug!("{} started", command.key());
    let outcome = run_steps(command, ctx, controller).await;
    ctx.document.selection().clear_selection();
    match &outcome {
        CommandOutcome::Completed => {
            log::debug!("{} completed", command.key());
            controller.succeed();
        }
        CommandOutcome::Cancelled(reason) => {
            controller.cancel(reason.clone());
        }
        CommandOutcome::Failed(e) => {
            log::warn!("{} failed: {e}", command.key());
            ctx.document
                .bus()
                .publish::<ShowToast>(e.root_cause().to_string());
            controller.cancel(CancelReason::Custom(e.to_string()));
        }
    }
    outcome
}

// ─── Registry ────────────────────────────────────────────────────────────

pub type CommandFactory = fn() -> Box<dyn MultistepCommand>;

/// Commands by key.
#[derive(Default)]
pub struct CommandRegistry {
    factories: BTreeMap<&'static str, CommandFactory>,
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::commands::register_builtins(&mut registry);
        registry
    }

    pub fn register(&mut self, key: &'static str, factory: CommandFactory) {
        if self.factories.insert(key, factory).is_some() {
            log::warn!("command `{key}` registered twice; keeping the last");
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn create(&self, key: &str) -> Result<Box<dyn MultistepCommand>, EditorError> {
        self.factories
            .get(key)
            .map(|factory| factory())
            .ok_or_else(|| EditorError::UnknownCommand(key.to_string()))
    }

    pub async fn run(
        &self,
        key: &str,
        ctx: &CommandContext,
        controller: &AsyncController,
    ) -> CommandOutcome {
        match self.create(key) {
            Ok(command) => run_command(command.as_ref(), ctx, controller).await,
            Err(e) => {
                log::warn!("{e}");
                ctx.document.bus().publish::<ShowToast>(e.to_string());
                controller.cancel(CancelReason::Custom(e.to_string()));
                CommandOutcome::Failed(e)
            }
        }
    }
}
