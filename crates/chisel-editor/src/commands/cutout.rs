//! Cut a circular or rectangular pocket into a planar face.
//!
//! The pocket is positioned on the face by an offset from the face centre,
//! in the face's own axes. A through cut spans the whole body along the
//! face normal; a blind cut goes `depth` deep.

use super::replace_with_result;
use crate::command::{CommandContext, MultistepCommand};
use crate::error::EditorError;
use crate::step::{SelectShapeStep, Step, StepData};
use chisel_core::{Face, Plane, Shape, ShapeFactory, ShapeType};
use chisel_visual::SubShape;
use serde::{Deserialize, Serialize};

/// Smallest accepted size or depth.
const MIN_VALUE: f64 = 0.1;
/// How far the tool overshoots the faces it must clear.
const OVERSHOOT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CutoutProfile {
    Circle { radius: f64 },
    Rect { width: f64, height: f64 },
}

/// Pocket settings.
///
/// Default: **circle r10**, centred, **through**.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CutoutOptions {
    pub profile: CutoutProfile,
    /// Offset from the face centre along the face x axis.
    pub cx: f64,
    /// Offset from the face centre along the face y axis.
    pub cy: f64,
    /// Ignored for through cuts.
    pub depth: f64,
    pub through: bool,
}

impl Default for CutoutOptions {
    fn default() -> Self {
        Self {
            profile: CutoutProfile::Circle { radius: 10.0 },
            cx: 0.0,
            cy: 0.0,
            depth: 10.0,
            through: true,
        }
    }
}

impl CutoutOptions {
    pub fn rect(width: f64, height: f64) -> Self {
        Self {
            profile: CutoutProfile::Rect { width, height },
            ..Self::default()
        }
    }

    pub fn blind(mut self, depth: f64) -> Self {
        self.through = false;
        self.depth = depth;
        self
    }

    pub fn offset(mut self, cx: f64, cy: f64) -> Self {
        self.cx = cx;
        self.cy = cy;
        self
    }
}

/// Build the cutting tool for `face` of `target`.
pub fn cutout_tool(
    kernel: &dyn ShapeFactory,
    target: &Shape,
    face: &Face,
    options: &CutoutOptions,
) -> Result<Shape, EditorError> {
    let plane = face.plane.ok_or(EditorError::FaceNotPlanar)?;
    let n = plane.normal;
    let (xvec, yvec) = (plane.xvec, plane.yvec());
    let origin = face.center + xvec * options.cx + yvec * options.cy;

    let (base, height) = if options.through {
        let (s0, s1) = target
            .extent_along(n)
            .ok_or(chisel_core::KernelError::EmptyOperand { op: "cutout" })?;
        let span = s1 - s0;
        (origin - n * (span + OVERSHOOT), span + 2.0 * OVERSHOOT)
    } else {
        let depth = options.depth.max(MIN_VALUE);
        (origin - n * depth, depth + OVERSHOOT)
    };

    let tool = match options.profile {
        CutoutProfile::Circle { radius } => kernel.cylinder(n, base, radius.max(MIN_VALUE), height)?,
        CutoutProfile::Rect { width, height: h } => {
            let (w, h) = (width.max(MIN_VALUE), h.max(MIN_VALUE));
            let corner = base - xvec * (w / 2.0) - yvec * (h / 2.0);
            let tool_plane = Plane::new(corner, n, xvec).ok_or(EditorError::FaceNotPlanar)?;
            kernel.box_(&tool_plane, w, h, height)?
        }
    };
    Ok(tool)
}

/// `modify.cutout`: pick a body, then one of its planar faces.
#[derive(Debug, Clone, Copy, Default)]
pub struct CutoutCommand {
    pub options: CutoutOptions,
}

impl CutoutCommand {
    pub fn new(options: CutoutOptions) -> Self {
        Self { options }
    }

    fn picked_face(data: &[StepData]) -> Result<Face, EditorError> {
        let shape = data
            .get(1)
            .and_then(|d| d.shapes.first())
            .ok_or(EditorError::MissingStepData(1))?;
        match shape.sub {
            SubShape::Face(face) => Ok(face),
            _ => Err(EditorError::MissingStepData(1)),
        }
    }
}

impl MultistepCommand for CutoutCommand {
    fn key(&self) -> &'static str {
        "modify.cutout"
    }

    fn steps(&self) -> Vec<Box<dyn Step>> {
        vec![
            Box::new(
                SelectShapeStep::new(ShapeType::Shape, "prompt.select.shape")
                    .with_node_filter(crate::step::shape_nodes_only()),
            ),
            Box::new(
                SelectShapeStep::new(ShapeType::Face, "prompt.select.faces").with_filter(|d, prev| {
                    prev.first()
                        .and_then(StepData::first_node)
                        .is_some_and(|target| d.node == target)
                }),
            ),
        ]
    }

    fn execute_main(&self, ctx: &CommandContext, data: &[StepData]) -> Result<(), EditorError> {
        let target = data
            .first()
            .and_then(StepData::first_node)
            .ok_or(EditorError::MissingStepData(0))?;
        let face = Self::picked_face(data)?;
        let shape = ctx.document.shape_of(target)?;
        let kernel = ctx.document.kernel();
        let tool = cutout_tool(&*kernel, &shape, &face, &self.options)?;
        let result = kernel.boolean_cut(&[shape], &[tool])?;
        let id = replace_with_result(ctx, self.key(), "Cutout", target, &[target], result)?;
        log::debug!("cutout on {target} -> {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chisel_core::{BoundsKernel, FaceKind, XYZ};

    fn slab() -> Shape {
        BoundsKernel
            .box_(&Plane::XY, 40.0, 40.0, 10.0)
            .expect("slab")
    }

    fn top_face(shape: &Shape) -> Face {
        shape
            .faces()
            .into_iter()
            .find(|f| f.plane.is_some_and(|p| p.normal.z > 0.5))
            .expect("top face")
    }

    #[test]
    fn through_tool_clears_both_sides() {
        let target = slab();
        let face = top_face(&target);
        let tool = cutout_tool(&BoundsKernel, &target, &face, &CutoutOptions::default()).unwrap();
        let (t0, t1) = tool.extent_along(XYZ::UNIT_Z).unwrap();
        assert!(t0 < 0.0);
        assert!(t1 > 10.0);
    }

    #[test]
    fn blind_tool_stops_at_depth() {
        let target = slab();
        let face = top_face(&target);
        let options = CutoutOptions::rect(8.0, 6.0).blind(4.0).offset(5.0, 0.0);
        let tool = cutout_tool(&BoundsKernel, &target, &face, &options).unwrap();
        let (t0, t1) = tool.extent_along(XYZ::UNIT_Z).unwrap();
        assert!((t0 - 6.0).abs() < 1e-9);
        assert!((t1 - 11.0).abs() < 1e-9);
        assert!(BoundsKernel.boolean_cut(&[target], &[tool]).is_ok());
    }

    #[test]
    fn curved_face_is_rejected() {
        let target = slab();
        let face = Face {
            kind: FaceKind::Cylindrical,
            plane: None,
            ..top_face(&target)
        };
        let err = cutout_tool(&BoundsKernel, &target, &face, &CutoutOptions::default()).unwrap_err();
        assert!(matches!(err, EditorError::FaceNotPlanar));
        assert_eq!(err.to_string(), "Face not planar");
    }
}
