//! Steps of a multistep command.
//!
//! A step performs exactly one pick and yields one `StepData`. Filters get
//! the data of the steps before it, so a later pick can be constrained by an
//! earlier one. A pick that succeeds with nothing picked counts as
//! `Cancelled(EmptySelection)`.

use crate::command::CommandContext;
use crate::controller::{AsyncController, Outcome};
use crate::error::CancelReason;
use crate::selection::{NodeFilter, PickFilters, ShapeFilter};
use crate::snap::{SnapData, SnapResult};
use chisel_core::{Node, NodeId, ShapeType};
use chisel_visual::{VisualShapeData, VisualState};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

/// What one step picked.
#[derive(Debug, Clone, Default)]
pub struct StepData {
    pub nodes: Vec<NodeId>,
    pub shapes: Vec<VisualShapeData>,
    pub point: Option<SnapResult>,
}

impl StepData {
    pub fn first_node(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    /// Every node this step refers to, including owners of picked shapes.
    pub fn referenced_nodes(&self) -> Vec<NodeId> {
        let mut nodes = self.nodes.clone();
        for s in &self.shapes {
            if !nodes.contains(&s.node) {
                nodes.push(s.node);
            }
        }
        nodes
    }
}

pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Outcome<StepData>> + 'a>>;

pub trait Step {
    fn prompt(&self) -> &str;

    fn execute<'a>(
        &'a self,
        ctx: &'a CommandContext,
        previous: &'a [StepData],
        controller: &'a AsyncController,
    ) -> StepFuture<'a>;
}

pub type StepShapeFilter = Rc<dyn Fn(&VisualShapeData, &[StepData]) -> bool>;
pub type StepNodeFilter = Rc<dyn Fn(&Node, &[StepData]) -> bool>;

fn bind_shape(f: &Option<StepShapeFilter>, previous: &Rc<Vec<StepData>>) -> Option<Rc<dyn ShapeFilter>> {
    f.clone().map(|f| {
        let previous = previous.clone();
        Rc::new(move |d: &VisualShapeData| f(d, &previous)) as Rc<dyn ShapeFilter>
    })
}

fn bind_node(f: &Option<StepNodeFilter>, previous: &Rc<Vec<StepData>>) -> Option<Rc<dyn NodeFilter>> {
    f.clone().map(|f| {
        let previous = previous.clone();
        Rc::new(move |n: &Node| f(n, &previous)) as Rc<dyn NodeFilter>
    })
}

/// Accepts shape nodes only.
pub fn shape_nodes_only() -> StepNodeFilter {
    Rc::new(|node: &Node, _: &[StepData]| node.is_shape())
}

// ─── Shape step ──────────────────────────────────────────────────────────

pub struct SelectShapeStep {
    shape_type: ShapeType,
    prompt: String,
    multi: bool,
    selected_state: VisualState,
    highlight_state: VisualState,
    shape_filter: Option<StepShapeFilter>,
    node_filter: Option<StepNodeFilter>,
}

impl SelectShapeStep {
    pub fn new(shape_type: ShapeType, prompt: impl Into<String>) -> Self {
        let face = shape_type == ShapeType::Face;
        Self {
            shape_type,
            prompt: prompt.into(),
            multi: false,
            selected_state: if face { VisualState::FaceSelected } else { VisualState::EdgeSelected },
            highlight_state: if face { VisualState::FaceHighlight } else { VisualState::EdgeHighlight },
            shape_filter: None,
            node_filter: None,
        }
    }

    pub fn multiple(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn with_filter(mut self, f: impl Fn(&VisualShapeData, &[StepData]) -> bool + 'static) -> Self {
        self.shape_filter = Some(Rc::new(f));
        self
    }

    pub fn with_node_filter(mut self, f: StepNodeFilter) -> Self {
        self.node_filter = Some(f);
        self
    }
}

impl Step for SelectShapeStep {
    fn prompt(&self) -> &str {
        &self.prompt
    }

    fn execute<'a>(
        &'a self,
        ctx: &'a CommandContext,
        previous: &'a [StepData],
        controller: &'a AsyncController,
    ) -> StepFuture<'a> {
        Box::pin(async move {
            let selection = ctx.document.selection();
            let previous = Rc::new(previous.to_vec());
            let _filters = selection.push_filters(PickFilters {
                shape_type: self.shape_type,
                shape_filter: bind_shape(&self.shape_filter, &previous),
                node_filter: bind_node(&self.node_filter, &previous),
            });
            let outcome = selection
                .pick_shape(
                    &ctx.view,
                    &self.prompt,
                    controller,
                    self.multi,
                    self.selected_state,
                    self.highlight_state,
                )
                .await;
            match outcome {
                Outcome::Succeeded(shapes) if shapes.is_empty() => {
                    Outcome::Cancelled(CancelReason::EmptySelection)
                }
                Outcome::Succeeded(shapes) => {
                    let data = StepData {
                        shapes,
                        ..StepData::default()
                    };
                    Outcome::Succeeded(StepData {
                        nodes: data.referenced_nodes(),
                        ..data
                    })
                }
                Outcome::Cancelled(reason) => Outcome::Cancelled(reason),
            }
        })
    }
}

// ─── Node step ───────────────────────────────────────────────────────────

pub struct SelectNodeStep {
    prompt: String,
    multi: bool,
    /// Use a non-empty current selection instead of picking.
    keep_selection: bool,
    node_filter: Option<StepNodeFilter>,
}

impl SelectNodeStep {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            multi: false,
            keep_selection: false,
            node_filter: None,
        }
    }

    pub fn multiple(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn keep_selection(mut self) -> Self {
        self.keep_selection = true;
        self
    }

    pub fn with_filter(mut self, f: impl Fn(&Node, &[StepData]) -> bool + 'static) -> Self {
        self.node_filter = Some(Rc::new(f));
        self
    }
}

impl Step for SelectNodeStep {
    fn prompt(&self) -> &str {
        &self.prompt
    }

    fn execute<'a>(
        &'a self,
        ctx: &'a CommandContext,
        previous: &'a [StepData],
        controller: &'a AsyncController,
    ) -> StepFuture<'a> {
        Box::pin(async move {
            let selection = ctx.document.selection();
            let previous = Rc::new(previous.to_vec());
            let _filters = selection.push_filters(PickFilters {
                node_filter: bind_node(&self.node_filter, &previous),
                ..PickFilters::default()
            });

            let current = selection.selected();
            if self.keep_selection && !current.is_empty() {
                // Re-apply so the filter prunes what does not qualify.
                selection.set_selection(&current, false);
                let kept = selection.selected();
                if !kept.is_empty() {
                    log::debug!("step `{}` keeps {} selected node(s)", self.prompt, kept.len());
                    return Outcome::Succeeded(StepData {
                        nodes: kept,
                        ..StepData::default()
                    });
                }
            } else if !current.is_empty() {
                selection.clear_selection();
            }

            match selection.pick_node(&ctx.view, &self.prompt, controller, self.multi).await {
                Outcome::Succeeded(nodes) if nodes.is_empty() => {
                    Outcome::Cancelled(CancelReason::EmptySelection)
                }
                Outcome::Succeeded(nodes) => Outcome::Succeeded(StepData {
                    nodes,
                    ..StepData::default()
                }),
                Outcome::Cancelled(reason) => Outcome::Cancelled(reason),
            }
        })
    }
}

// ─── Point step ──────────────────────────────────────────────────────────

pub struct PointStep {
    prompt: String,
    snap: Rc<dyn Fn(&[StepData]) -> SnapData>,
}

impl PointStep {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            snap: Rc::new(|_| SnapData::default()),
        }
    }

    /// Snap options computed from the earlier steps' data.
    pub fn with_snap(mut self, f: impl Fn(&[StepData]) -> SnapData + 'static) -> Self {
        self.snap = Rc::new(f);
        self
    }
}

impl Step for PointStep {
    fn prompt(&self) -> &str {
        &self.prompt
    }

    fn execute<'a>(
        &'a self,
        ctx: &'a CommandContext,
        previous: &'a [StepData],
        controller: &'a AsyncController,
    ) -> StepFuture<'a> {
        Box::pin(async move {
            let data = (self.snap)(previous);
            ctx.document
                .selection()
                .pick_point(&ctx.view, &self.prompt, controller, data)
                .await
                .map(|point| StepData {
                    point: Some(point),
                    ..StepData::default()
                })
        })
    }
}
