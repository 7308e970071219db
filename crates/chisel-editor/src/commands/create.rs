//! Body creation commands.

use crate::command::{CommandContext, MultistepCommand};
use crate::error::EditorError;
use crate::snap::{SnapData, SnapResult};
use crate::step::{PointStep, Step, StepData};
use crate::transaction::Transaction;
use chisel_core::{BodyKind, Node, NodeId, ParamValue, Params, Plane, ShapeNode, XYZ};
use chisel_visual::mesh::{MeshData, PREVIEW_COLOR};
use std::rc::Rc;

const MIN_SIZE: f64 = 1e-6;

fn point_of(data: &[StepData], step: usize) -> Result<&SnapResult, EditorError> {
    data.get(step)
        .and_then(|d| d.point.as_ref())
        .ok_or(EditorError::MissingStepData(step))
}

/// Rectangle spanned by two corners on `plane`: a plane at the lower corner
/// and the two side lengths.
fn footprint(plane: &Plane, a: XYZ, b: XYZ) -> (Plane, f64, f64) {
    let (au, av, _) = plane.to_local(a);
    let (bu, bv, _) = plane.to_local(b);
    let origin = plane.to_world(au.min(bu), av.min(bv));
    (plane.with_origin(origin), (au - bu).abs(), (av - bv).abs())
}

fn plan_distance(plane: &Plane, a: XYZ, b: XYZ) -> f64 {
    let (au, av, _) = plane.to_local(a);
    let (bu, bv, _) = plane.to_local(b);
    (au - bu).hypot(av - bv)
}

/// Validate the body's geometry, then add it under the root in one
/// transaction.
fn commit_body(
    ctx: &CommandContext,
    label: &str,
    name: &str,
    params: Params,
) -> Result<NodeId, EditorError> {
    params.validate()?;
    let body = ShapeNode::new(params);
    body.shape(&*ctx.document.kernel())?;
    Transaction::execute(&ctx.document, label, |tx| {
        tx.add_node(NodeId::root(), Node::shape(name, body))
    })
}

// ─── Box by three points ─────────────────────────────────────────────────

/// `create.box`: two opposite corners of the base, then a height point.
#[derive(Debug, Default)]
pub struct CreateBoxCommand;

impl CreateBoxCommand {
    fn plane_of(data: &[StepData], step: usize) -> Option<Plane> {
        data.get(step).and_then(|d| d.point.as_ref()).and_then(|p| p.plane)
    }
}

impl MultistepCommand for CreateBoxCommand {
    fn key(&self) -> &'static str {
        "create.box"
    }

    fn steps(&self) -> Vec<Box<dyn Step>> {
        vec![
            Box::new(PointStep::new("prompt.pickFirstPoint")),
            Box::new(PointStep::new("prompt.pickNextPoint").with_snap(|prev| {
                let Some(first) = prev.first().and_then(|d| d.point.clone()) else {
                    return SnapData::default();
                };
                let p1 = first.point;
                let plane = first.plane.unwrap_or(Plane::XY);
                SnapData {
                    ref_point: Some(p1),
                    plane: first.plane,
                    preview: Some(Rc::new(move |p: Option<XYZ>| {
                        let Some(p) = p else { return Vec::new() };
                        let (base, dx, dy) = footprint(&plane, p1, p);
                        vec![MeshData::rect_outline(&base, dx, dy, PREVIEW_COLOR)]
                    })),
                    validator: Some(Rc::new(move |p: XYZ| {
                        let (_, dx, dy) = footprint(&plane, p1, p);
                        dx > MIN_SIZE && dy > MIN_SIZE
                    })),
                    ..SnapData::default()
                }
            })),
            Box::new(PointStep::new("prompt.pickNextPoint").with_snap(|prev| {
                let Some(second) = prev.get(1).and_then(|d| d.point.clone()) else {
                    return SnapData::default();
                };
                let p2 = second.point;
                let plane = second.plane.unwrap_or(Plane::XY);
                SnapData {
                    ref_point: Some(p2),
                    plane: second.plane,
                    validator: Some(Rc::new(move |p: XYZ| plan_distance(&plane, p2, p) > MIN_SIZE)),
                    ..SnapData::default()
                }
            })),
        ]
    }

    fn execute_main(&self, ctx: &CommandContext, data: &[StepData]) -> Result<(), EditorError> {
        let p1 = point_of(data, 0)?.point;
        let p2 = point_of(data, 1)?.point;
        let p3 = point_of(data, 2)?.point;
        let plane = Self::plane_of(data, 0).unwrap_or_else(|| ctx.view.workplane());
        let (base, width, length) = footprint(&plane, p1, p2);
        let height = plan_distance(&plane, p2, p3);
        let params = Params::with(
            BodyKind::Box,
            &[
                ("plane", base.into()),
                ("width", width.into()),
                ("length", length.into()),
                ("height", height.into()),
            ],
        )?;
        let id = commit_body(ctx, self.key(), "Box", params)?;
        log::debug!("created {id} ({width} × {length} × {height})");
        Ok(())
    }
}

// ─── One-shot bodies ─────────────────────────────────────────────────────

/// Creates a body with fixed default dimensions on the view's working
/// plane. Dimensions are edited afterwards through parameters.
#[derive(Debug, Clone, Copy)]
pub struct CreateBodyCommand {
    key: &'static str,
    kind: BodyKind,
    name: &'static str,
    values: &'static [(&'static str, f64)],
}

impl CreateBodyCommand {
    pub const BOX: Self = Self {
        key: "create.popupbox",
        kind: BodyKind::Box,
        name: "Box",
        values: &[("width", 10.0), ("length", 10.0), ("height", 10.0)],
    };

    pub const CYLINDER: Self = Self {
        key: "create.popupcylinder",
        kind: BodyKind::Cylinder,
        name: "Cylinder",
        values: &[("radius", 10.0), ("height", 20.0)],
    };

    pub const TUBE: Self = Self {
        key: "create.popuptube",
        kind: BodyKind::Tube,
        name: "Tube",
        values: &[("outerRadius", 10.0), ("innerRadius", 5.0), ("height", 20.0)],
    };

    pub const H_SECTION: Self = Self {
        key: "create.popupHSection",
        kind: BodyKind::HSection,
        name: "H Section",
        values: &[
            ("width", 100.0),
            ("height", 50.0),
            ("flangeThickness", 10.0),
            ("webThickness", 6.0),
            ("length", 1000.0),
        ],
    };

    pub const L_SECTION: Self = Self {
        key: "create.popupLSection",
        kind: BodyKind::LSection,
        name: "L Section",
        values: &[("width", 20.0), ("widthTwo", 20.0), ("thickness", 1.5), ("length", 1000.0)],
    };

    pub const U_SECTION: Self = Self {
        key: "create.popupUSection",
        kind: BodyKind::USection,
        name: "U Section",
        values: &[("height", 40.0), ("width", 20.0), ("thickness", 5.0), ("length", 1000.0)],
    };

    pub const TEE_SECTION: Self = Self {
        key: "create.popupTeeSection",
        kind: BodyKind::TeeSection,
        name: "Tee Section",
        values: &[("width", 100.0), ("height", 100.0), ("thickness", 10.0), ("length", 10.0)],
    };

    pub const REC_SECTION: Self = Self {
        key: "create.popupRecSection",
        kind: BodyKind::RecSection,
        name: "Rectangular Section",
        values: &[("height", 40.0), ("width", 20.0), ("thickness", 5.0), ("length", 1000.0)],
    };

    pub const ALL: [Self; 8] = [
        Self::BOX,
        Self::CYLINDER,
        Self::TUBE,
        Self::H_SECTION,
        Self::L_SECTION,
        Self::U_SECTION,
        Self::TEE_SECTION,
        Self::REC_SECTION,
    ];

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    fn params(&self, plane: Plane) -> Result<Params, EditorError> {
        let mut values: Vec<(&str, ParamValue)> = vec![("plane", plane.into())];
        values.extend(self.values.iter().map(|&(name, v)| (name, ParamValue::from(v))));
        Ok(Params::with(self.kind, &values)?)
    }
}

impl MultistepCommand for CreateBodyCommand {
    fn key(&self) -> &'static str {
        self.key
    }

    fn steps(&self) -> Vec<Box<dyn Step>> {
        Vec::new()
    }

    fn execute_main(&self, ctx: &CommandContext, _data: &[StepData]) -> Result<(), EditorError> {
        let params = self.params(ctx.view.workplane())?;
        let id = commit_body(ctx, self.key, self.name, params)?;
        log::debug!("created {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_normalizes_corners() {
        let (base, dx, dy) = footprint(&Plane::XY, XYZ::new(10.0, 2.0, 0.0), XYZ::new(4.0, 8.0, 0.0));
        assert_eq!(base.origin, XYZ::new(4.0, 2.0, 0.0));
        assert!((dx - 6.0).abs() < 1e-9);
        assert!((dy - 6.0).abs() < 1e-9);
    }

    #[test]
    fn popup_defaults_are_valid_params() {
        for cmd in CreateBodyCommand::ALL {
            let params = cmd.params(Plane::XY).expect("valid params");
            assert_eq!(params.kind(), cmd.kind());
            params.validate().expect("defaults validate");
        }
    }

    #[test]
    fn tube_popup_uses_its_own_defaults() {
        let params = CreateBodyCommand::TUBE.params(Plane::XY).unwrap();
        assert_eq!(params.number("outerRadius").unwrap(), 10.0);
        assert_eq!(params.number("innerRadius").unwrap(), 5.0);
        assert_eq!(params.number("height").unwrap(), 20.0);
    }
}
