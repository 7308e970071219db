//! Snap engine.
//!
//! Turns a pointer sample and the edges detected under it into one snapped
//! point. Candidates come from a declarative rule list (endpoints, midpoints,
//! circle centers, edge intersections) plus command-supplied feature points;
//! each rule has an optional gate. The nearest candidate within tolerance that
//! the validator accepts wins; otherwise the cursor's position on the working
//! plane is used.
//!
//! A snap never selects anything. It only adjusts the point being picked and
//! draws transient markers, which `remove_dynamic_object` takes down again.

use crate::config::SnapConfig;
use crate::selection::ShapeFilter;
use chisel_core::{Edge, NodeId, Plane, XYZ};
use chisel_visual::mesh::{MARKER_COLOR, MeshData};
use chisel_visual::{MeshId, SubShape, VisualContext, VisualShapeData};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type PreviewFn = Rc<dyn Fn(Option<XYZ>) -> Vec<MeshData>>;
pub type PromptFn = Rc<dyn Fn(&SnapResult) -> String>;
pub type ValidatorFn = Rc<dyn Fn(XYZ) -> bool>;

/// A command-supplied point worth snapping to.
#[derive(Clone)]
pub struct FeaturePoint {
    pub point: XYZ,
    pub prompt: String,
    /// Offered only while this returns `true`.
    pub when: Option<Rc<dyn Fn() -> bool>>,
}

/// Per-pick snap options supplied by the command.
#[derive(Clone, Default)]
pub struct SnapData {
    /// Transient geometry to draw for a candidate point.
    pub preview: Option<PreviewFn>,
    /// Overrides the status text for a snapped point.
    pub prompt: Option<PromptFn>,
    /// Restricts which detected edges may be snapped to.
    pub filter: Option<Rc<dyn ShapeFilter>>,
    /// Rejects otherwise valid points.
    pub validator: Option<ValidatorFn>,
    pub feature_points: Vec<FeaturePoint>,
    /// Distances are reported relative to this point.
    pub ref_point: Option<XYZ>,
    /// Working plane override; the view's plane otherwise.
    pub plane: Option<Plane>,
}

impl fmt::Debug for SnapData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapData")
            .field("preview", &self.preview.is_some())
            .field("validator", &self.validator.is_some())
            .field("feature_points", &self.feature_points.len())
            .field("ref_point", &self.ref_point)
            .finish()
    }
}

/// One pointer sample with what was detected under it.
#[derive(Debug, Clone)]
pub struct MouseAndDetected {
    pub plane: Plane,
    pub mx: f64,
    pub my: f64,
    /// The cursor on `plane`.
    pub point: XYZ,
    pub shapes: Vec<VisualShapeData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapKind {
    Endpoint,
    Midpoint,
    Center,
    Intersection,
    Feature,
    /// No feature nearby; the cursor on the working plane.
    Plane,
}

impl SnapKind {
    pub fn label(self) -> &'static str {
        match self {
            SnapKind::Endpoint => "endpoint",
            SnapKind::Midpoint => "midpoint",
            SnapKind::Center => "center",
            SnapKind::Intersection => "intersection",
            SnapKind::Feature => "feature",
            SnapKind::Plane => "plane",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapResult {
    pub point: XYZ,
    pub info: Option<String>,
    /// Distance from the reference point, when there is one.
    pub distance: Option<f64>,
    pub ref_point: Option<XYZ>,
    pub shapes: Vec<VisualShapeData>,
    pub nodes: Vec<NodeId>,
    pub plane: Option<Plane>,
    pub kind: SnapKind,
}

pub trait Snap {
    fn snap(&self, data: &MouseAndDetected) -> Option<SnapResult>;

    /// Take down transient preview geometry.
    fn remove_dynamic_object(&self);

    /// Reset state between independent picks.
    fn clear(&self);
}

// ─── Rules ───────────────────────────────────────────────────────────────

struct Rule {
    kind: SnapKind,
    when: Option<fn(&MouseAndDetected) -> bool>,
    candidates: fn(&MouseAndDetected) -> Vec<XYZ>,
}

fn edges(data: &MouseAndDetected) -> impl Iterator<Item = &Edge> {
    data.shapes.iter().filter_map(|s| match &s.sub {
        SubShape::Edge(edge) => Some(edge),
        _ => None,
    })
}

fn endpoints(data: &MouseAndDetected) -> Vec<XYZ> {
    let mut points: Vec<XYZ> = edges(data)
        .filter_map(Edge::endpoints)
        .flat_map(|(a, b)| [a, b])
        .collect();
    points.extend(data.shapes.iter().filter_map(|s| match s.sub {
        SubShape::Vertex(v) => Some(v),
        _ => None,
    }));
    points
}

fn midpoints(data: &MouseAndDetected) -> Vec<XYZ> {
    edges(data).filter_map(Edge::midpoint).collect()
}

fn centers(data: &MouseAndDetected) -> Vec<XYZ> {
    edges(data).filter_map(Edge::center).collect()
}

fn intersections(data: &MouseAndDetected) -> Vec<XYZ> {
    let lines: Vec<(XYZ, XYZ)> = edges(data).filter_map(Edge::endpoints).collect();
    let mut points = Vec::new();
    for (i, a) in lines.iter().enumerate() {
        for b in &lines[i + 1..] {
            if let Some(p) = plan_intersection(&data.plane, *a, *b) {
                points.push(p);
            }
        }
    }
    points
}

fn two_or_more_edges(data: &MouseAndDetected) -> bool {
    edges(data).count() >= 2
}

const RULES: &[Rule] = &[
    Rule {
        kind: SnapKind::Endpoint,
        when: None,
        candidates: endpoints,
    },
    Rule {
        kind: SnapKind::Intersection,
        when: Some(two_or_more_edges),
        candidates: intersections,
    },
    Rule {
        kind: SnapKind::Midpoint,
        when: None,
        candidates: midpoints,
    },
    Rule {
        kind: SnapKind::Center,
        when: None,
        candidates: centers,
    },
];

/// Where segments `a` and `b` cross in plan, at `a`'s height.
fn plan_intersection(plane: &Plane, a: (XYZ, XYZ), b: (XYZ, XYZ)) -> Option<XYZ> {
    let (a0u, a0v, a0w) = plane.to_local(a.0);
    let (a1u, a1v, a1w) = plane.to_local(a.1);
    let (b0u, b0v, _) = plane.to_local(b.0);
    let (b1u, b1v, _) = plane.to_local(b.1);
    let (du, dv) = (a1u - a0u, a1v - a0v);
    let (eu, ev) = (b1u - b0u, b1v - b0v);
    let denom = du * ev - dv * eu;
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = ((b0u - a0u) * ev - (b0v - a0v) * eu) / denom;
    let s = ((b0u - a0u) * dv - (b0v - a0v) * du) / denom;
    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&s) {
        return None;
    }
    let (u, v, w) = (a0u + t * du, a0v + t * dv, a0w + t * (a1w - a0w));
    Some(plane.to_world(u, v) + plane.normal * w)
}

fn plan_distance(plane: &Plane, a: XYZ, b: XYZ) -> f64 {
    let (au, av, _) = plane.to_local(a);
    let (bu, bv, _) = plane.to_local(b);
    ((au - bu).powi(2) + (av - bv).powi(2)).sqrt()
}

// ─── Engine ──────────────────────────────────────────────────────────────

pub struct SnapEngine {
    data: SnapData,
    config: SnapConfig,
    visual: Rc<VisualContext>,
    previews: RefCell<Vec<MeshId>>,
    last: RefCell<Option<SnapResult>>,
}

impl fmt::Debug for SnapEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapEngine")
            .field("data", &self.data)
            .field("previews", &self.previews.borrow().len())
            .finish()
    }
}

impl SnapEngine {
    pub fn new(data: SnapData, config: SnapConfig, visual: Rc<VisualContext>) -> Self {
        Self {
            data,
            config,
            visual,
            previews: RefCell::new(Vec::new()),
            last: RefCell::new(None),
        }
    }

    pub fn data(&self) -> &SnapData {
        &self.data
    }

    pub fn tolerance(&self) -> f64 {
        self.config.tolerance
    }

    fn enabled(&self, kind: SnapKind) -> bool {
        match kind {
            SnapKind::Endpoint => self.config.endpoint,
            SnapKind::Midpoint => self.config.midpoint,
            SnapKind::Center => self.config.center,
            SnapKind::Intersection => self.config.intersection,
            SnapKind::Feature => self.config.feature,
            SnapKind::Plane => true,
        }
    }

    fn valid(&self, point: XYZ) -> bool {
        self.data.validator.as_ref().is_none_or(|v| v(point))
    }

    /// Whether a detected entity may be snapped to.
    pub fn allows(&self, shape: &VisualShapeData) -> bool {
        self.data.filter.as_ref().is_none_or(|f| f.allow(shape))
    }

    /// Most recent snap, kept until `clear`.
    pub fn last(&self) -> Option<SnapResult> {
        self.last.borrow().clone()
    }

    /// Snap and redraw the preview for the result.
    pub fn update(&self, data: &MouseAndDetected) -> Option<SnapResult> {
        let result = self.snap(data);
        self.show_preview(result.as_ref().map(|r| r.point));
        result
    }

    fn show_preview(&self, point: Option<XYZ>) {
        self.remove_dynamic_object();
        let mut meshes = self.data.preview.as_ref().map(|p| p(point)).unwrap_or_default();
        if let Some(point) = point {
            meshes.push(MeshData::point_marker(point, MARKER_COLOR));
        }
        let ids: Vec<MeshId> = meshes.into_iter().map(|m| self.visual.add_preview(m)).collect();
        *self.previews.borrow_mut() = ids;
    }

    fn nearest(&self, data: &MouseAndDetected) -> Option<(SnapKind, XYZ, Option<String>)> {
        let tolerance = self.config.tolerance;
        let mut best: Option<(f64, SnapKind, XYZ, Option<String>)> = None;
        let mut consider = |d: f64, kind: SnapKind, p: XYZ, prompt: Option<String>| {
            if d <= tolerance && best.as_ref().is_none_or(|b| d < b.0) {
                best = Some((d, kind, p, prompt));
            }
        };

        for rule in RULES {
            if !self.enabled(rule.kind) || rule.when.is_some_and(|when| !when(data)) {
                continue;
            }
            for p in (rule.candidates)(data) {
                if !self.valid(p) {
                    log::trace!("snap {:?} rejected by validator", rule.kind);
                    continue;
                }
                consider(plan_distance(&data.plane, p, data.point), rule.kind, p, None);
            }
        }
        if self.enabled(SnapKind::Feature) {
            for feature in &self.data.feature_points {
                if feature.when.as_ref().is_some_and(|when| !when()) || !self.valid(feature.point) {
                    continue;
                }
                consider(
                    plan_distance(&data.plane, feature.point, data.point),
                    SnapKind::Feature,
                    feature.point,
                    Some(feature.prompt.clone()),
                );
            }
        }
        best.map(|(_, kind, p, prompt)| (kind, p, prompt))
    }
}

impl Snap for SnapEngine {
    fn snap(&self, data: &MouseAndDetected) -> Option<SnapResult> {
        let (kind, point, prompt) = match self.nearest(data) {
            Some(found) => found,
            None if self.valid(data.point) => (SnapKind::Plane, data.point, None),
            None => {
                *self.last.borrow_mut() = None;
                return None;
            }
        };
        let shapes: Vec<VisualShapeData> = data.shapes.clone();
        let mut nodes: Vec<NodeId> = Vec::new();
        for s in &shapes {
            if !nodes.contains(&s.node) {
                nodes.push(s.node);
            }
        }
        let mut result = SnapResult {
            point,
            info: prompt.or_else(|| (kind != SnapKind::Plane).then(|| kind.label().to_string())),
            distance: self.data.ref_point.map(|r| r.distance(point)),
            ref_point: self.data.ref_point,
            shapes,
            nodes,
            plane: Some(data.plane),
            kind,
        };
        if let Some(prompt) = &self.data.prompt {
            result.info = Some(prompt(&result));
        }
        log::trace!("snap {:?} at {:?}", result.kind, result.point);
        *self.last.borrow_mut() = Some(result.clone());
        Some(result)
    }

    fn remove_dynamic_object(&self) {
        for id in self.previews.borrow_mut().drain(..) {
            self.visual.remove_preview(id);
        }
    }

    fn clear(&self) {
        self.remove_dynamic_object();
        *self.last.borrow_mut() = None;
    }
}
