//! Geometry kernel contract and the reference kernel.
//!
//! The editor never builds geometry itself. Everything goes through a
//! `ShapeFactory`, and every call returns a `KernelResult` that the caller
//! must check before chaining it into the next call.
//!
//! `BoundsKernel` is a small constructive kernel that keeps shapes as
//! primitive unions/differences. It validates inputs the way a B-rep kernel
//! would reject them (non-positive sizes, zero normals, cut tools that would
//! split or erase the target) without doing any surface math.

use crate::error::KernelError;
use crate::math::{Plane, TOLERANCE, XYZ};
use crate::shape::{Primitive, Shape, ShapeType};

pub type KernelResult<T = Shape> = Result<T, KernelError>;

pub trait ShapeFactory {
    /// Box of size `dx × dy × dz` along the plane's x, y and normal axes.
    fn box_(&self, plane: &Plane, dx: f64, dy: f64, dz: f64) -> KernelResult;

    /// Cylinder whose base circle is centred at `center`, extruded along `normal`.
    fn cylinder(&self, normal: XYZ, center: XYZ, radius: f64, height: f64) -> KernelResult;

    /// Planar circular face.
    fn circle(&self, normal: XYZ, center: XYZ, radius: f64) -> KernelResult;

    /// Planar rectangular face from `plane.origin`.
    fn rect(&self, plane: &Plane, dx: f64, dy: f64) -> KernelResult;

    /// Extrude a planar profile along `vec`.
    fn prism(&self, profile: &Shape, vec: XYZ) -> KernelResult;

    fn boolean_fuse(&self, targets: &[Shape], tools: &[Shape]) -> KernelResult;

    fn boolean_cut(&self, targets: &[Shape], tools: &[Shape]) -> KernelResult;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BoundsKernel;

impl BoundsKernel {
    pub fn new() -> Self {
        Self
    }
}

fn check_length(op: &'static str, name: &str, value: f64) -> Result<(), KernelError> {
    if !value.is_finite() || value <= TOLERANCE {
        return Err(KernelError::invalid(op, format!("{name} must be positive, got {value}")));
    }
    Ok(())
}

fn check_normal(op: &'static str, normal: XYZ) -> Result<XYZ, KernelError> {
    normal
        .normalize()
        .ok_or_else(|| KernelError::invalid(op, "zero-length normal"))
}

fn check_operands(op: &'static str, shapes: &[Shape]) -> Result<(), KernelError> {
    if shapes.is_empty() || shapes.iter().any(Shape::is_empty) {
        return Err(KernelError::EmptyOperand { op });
    }
    Ok(())
}

fn merged_type(solids: &[Primitive]) -> ShapeType {
    if solids.iter().all(Primitive::is_solid) {
        ShapeType::Solid
    } else {
        ShapeType::Compound
    }
}

impl ShapeFactory for BoundsKernel {
    fn box_(&self, plane: &Plane, dx: f64, dy: f64, dz: f64) -> KernelResult {
        check_length("box", "dx", dx)?;
        check_length("box", "dy", dy)?;
        check_length("box", "dz", dz)?;
        if !plane.origin.is_finite() {
            return Err(KernelError::invalid("box", "non-finite origin"));
        }
        Ok(Shape::from_primitive(Primitive::Cuboid {
            plane: *plane,
            dx,
            dy,
            dz,
        }))
    }

    fn cylinder(&self, normal: XYZ, center: XYZ, radius: f64, height: f64) -> KernelResult {
        let normal = check_normal("cylinder", normal)?;
        check_length("cylinder", "radius", radius)?;
        if !height.is_finite() || height.abs() <= TOLERANCE {
            return Err(KernelError::invalid("cylinder", "height must be non-zero"));
        }
        // A negative height extrudes the other way.
        let (center, height) = if height < 0.0 {
            (center + normal * height, -height)
        } else {
            (center, height)
        };
        Ok(Shape::from_primitive(Primitive::Cylinder {
            center,
            normal,
            radius,
            height,
        }))
    }

    fn circle(&self, normal: XYZ, center: XYZ, radius: f64) -> KernelResult {
        let normal = check_normal("circle", normal)?;
        check_length("circle", "radius", radius)?;
        Ok(Shape::from_primitive(Primitive::Disc {
            center,
            normal,
            radius,
        }))
    }

    fn rect(&self, plane: &Plane, dx: f64, dy: f64) -> KernelResult {
        check_length("rect", "dx", dx)?;
        check_length("rect", "dy", dy)?;
        Ok(Shape::from_primitive(Primitive::Rectangle {
            plane: *plane,
            dx,
            dy,
        }))
    }

    fn prism(&self, profile: &Shape, vec: XYZ) -> KernelResult {
        let [primitive] = profile.solids.as_slice() else {
            return Err(KernelError::UnsupportedProfile { op: "prism" });
        };
        let length = vec.length();
        check_length("prism", "length", length)?;
        if !primitive.axis().is_parallel(vec) {
            return Err(KernelError::invalid(
                "prism",
                "direction must be normal to the profile",
            ));
        }
        match *primitive {
            Primitive::Disc {
                center, radius, ..
            } => self.cylinder(vec, center, radius, length),
            Primitive::Rectangle { plane, dx, dy } => {
                // Re-seat the frame so the extrusion runs along `vec`.
                let flipped = plane.normal.dot(vec) < 0.0;
                let frame = if flipped {
                    Plane {
                        origin: plane.origin + plane.yvec() * dy,
                        normal: -plane.normal,
                        xvec: plane.xvec,
                    }
                } else {
                    plane
                };
                self.box_(&frame, dx, dy, length)
            }
            Primitive::Cuboid { .. } | Primitive::Cylinder { .. } => {
                Err(KernelError::UnsupportedProfile { op: "prism" })
            }
        }
    }

    fn boolean_fuse(&self, targets: &[Shape], tools: &[Shape]) -> KernelResult {
        check_operands("booleanFuse", targets)?;
        check_operands("booleanFuse", tools)?;
        let mut solids = Vec::new();
        let mut voids = Vec::new();
        for shape in targets.iter().chain(tools) {
            solids.extend(shape.solids.iter().copied());
            voids.extend(shape.voids.iter().copied());
        }
        let shape_type = merged_type(&solids);
        Ok(Shape::new(shape_type, solids, voids))
    }

    fn boolean_cut(&self, targets: &[Shape], tools: &[Shape]) -> KernelResult {
        check_operands("booleanCut", targets)?;
        check_operands("booleanCut", tools)?;

        let mut solids = Vec::new();
        let mut voids = Vec::new();
        for target in targets {
            solids.extend(target.solids.iter().copied());
            voids.extend(target.voids.iter().copied());
        }
        let target = Shape::new(merged_type(&solids), solids, voids);

        for tool in tools.iter().flat_map(|t| t.solids.iter()) {
            // Along the tool axis the tool must at least touch the target.
            let axis = tool.axis();
            let (t0, t1) = tool.extent_along(axis);
            let (s0, s1) = target.extent_along(axis).ok_or(KernelError::EmptyOperand {
                op: "booleanCut",
            })?;
            if t1 <= s0 + TOLERANCE || t0 >= s1 - TOLERANCE {
                return Err(KernelError::degenerate(
                    "booleanCut",
                    "tool does not intersect the target",
                ));
            }
            // Across the axis the tool footprint must sit strictly inside the
            // target footprint, otherwise the cut would split or erase it.
            let (u, v) = tool.cross_axes();
            for dir in [u, v] {
                let (t0, t1) = tool.extent_along(dir);
                let Some((s0, s1)) = target.extent_along(dir) else {
                    return Err(KernelError::EmptyOperand { op: "booleanCut" });
                };
                if t0 <= s0 + TOLERANCE || t1 >= s1 - TOLERANCE {
                    log::debug!(
                        "booleanCut rejected: tool [{t0:.3}, {t1:.3}] vs target [{s0:.3}, {s1:.3}]"
                    );
                    return Err(KernelError::ToolNotContained);
                }
            }
        }

        let mut result = target;
        for tool in tools {
            result.voids.extend(tool.solids.iter().copied());
        }
        Ok(Shape::new(result.shape_type, result.solids, result.voids))
    }
}
