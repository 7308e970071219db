//! Shapes produced by the geometry kernel.
//!
//! A `Shape` is a constructive description: a union of solid primitives
//! minus a union of void primitives. Faces, edges and vertices are derived
//! from the primitives on demand and addressed by their enumeration index,
//! which is what the picking layer stores as sub-shape indices.

use crate::math::{BoundingBox, Plane, XYZ};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Topological kind of a shape or sub-shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeType {
    /// Any shape, picked as a whole.
    Shape,
    Compound,
    Solid,
    Face,
    Edge,
    Vertex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId(pub u64);

impl ShapeId {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ShapeId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

// ─── Primitives ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    /// Box spanning `dx` along `plane.xvec`, `dy` along `plane.yvec`,
    /// `dz` along `plane.normal`, starting at `plane.origin`.
    Cuboid { plane: Plane, dx: f64, dy: f64, dz: f64 },
    /// Cylinder with its base circle centred at `center`, extruded `height` along `normal`.
    Cylinder {
        center: XYZ,
        normal: XYZ,
        radius: f64,
        height: f64,
    },
    /// Planar circular profile.
    Disc { center: XYZ, normal: XYZ, radius: f64 },
    /// Planar rectangular profile from `plane.origin`.
    Rectangle { plane: Plane, dx: f64, dy: f64 },
}

impl Primitive {
    /// Axis the primitive was built along.
    pub fn axis(&self) -> XYZ {
        match self {
            Primitive::Cuboid { plane, .. } | Primitive::Rectangle { plane, .. } => plane.normal,
            Primitive::Cylinder { normal, .. } | Primitive::Disc { normal, .. } => *normal,
        }
    }

    /// Two unit directions perpendicular to `axis()`.
    pub fn cross_axes(&self) -> (XYZ, XYZ) {
        match self {
            Primitive::Cuboid { plane, .. } | Primitive::Rectangle { plane, .. } => {
                (plane.xvec, plane.yvec())
            }
            Primitive::Cylinder { normal, .. } | Primitive::Disc { normal, .. } => {
                let u = normal.any_perpendicular().unwrap_or(XYZ::UNIT_X);
                (u, normal.cross(u))
            }
        }
    }

    pub fn is_solid(&self) -> bool {
        matches!(self, Primitive::Cuboid { .. } | Primitive::Cylinder { .. })
    }

    /// `(min, max)` of the primitive projected on the unit direction `dir`.
    pub fn extent_along(&self, dir: XYZ) -> (f64, f64) {
        match *self {
            Primitive::Cuboid { plane, dx, dy, dz } => {
                let corners = cuboid_corners(&plane, dx, dy, dz);
                fold_extent(corners.iter().map(|c| c.dot(dir)))
            }
            Primitive::Rectangle { plane, dx, dy } => {
                let corners = rect_corners(&plane, dx, dy);
                fold_extent(corners.iter().map(|c| c.dot(dir)))
            }
            Primitive::Cylinder {
                center,
                normal,
                radius,
                height,
            } => {
                let along = normal.dot(dir);
                let spread = radius * (1.0 - along * along).max(0.0).sqrt();
                let a = center.dot(dir);
                let b = a + height * along;
                (a.min(b) - spread, a.max(b) + spread)
            }
            Primitive::Disc {
                center,
                normal,
                radius,
            } => {
                let along = normal.dot(dir);
                let spread = radius * (1.0 - along * along).max(0.0).sqrt();
                let a = center.dot(dir);
                (a - spread, a + spread)
            }
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        let (x0, x1) = self.extent_along(XYZ::UNIT_X);
        let (y0, y1) = self.extent_along(XYZ::UNIT_Y);
        let (z0, z1) = self.extent_along(XYZ::UNIT_Z);
        BoundingBox {
            min: XYZ::new(x0, y0, z0),
            max: XYZ::new(x1, y1, z1),
        }
    }

    fn push_faces(&self, out: &mut Vec<Face>) {
        match *self {
            Primitive::Cuboid { plane, dx, dy, dz } => {
                let c = cuboid_corners(&plane, dx, dy, dz);
                let (x, y, n) = (plane.xvec, plane.yvec(), plane.normal);
                // bottom, top, then the four sides
                let faces = [
                    ([0, 1, 2, 3], -n, x),
                    ([4, 5, 6, 7], n, x),
                    ([0, 1, 4, 5], -y, x),
                    ([2, 3, 6, 7], y, x),
                    ([0, 2, 4, 6], -x, y),
                    ([1, 3, 5, 7], x, y),
                ];
                for (idx, normal, xvec) in faces {
                    let corners = idx.map(|i| c[i]);
                    let center = (corners[0] + corners[1] + corners[2] + corners[3]) * 0.25;
                    let frame = Plane {
                        origin: center,
                        normal,
                        xvec,
                    };
                    out.push(Face {
                        kind: FaceKind::Planar,
                        plane: Some(frame),
                        center,
                        bounds: BoundingBox::from_points(&corners).unwrap_or(BoundingBox {
                            min: center,
                            max: center,
                        }),
                    });
                }
            }
            Primitive::Cylinder {
                center,
                normal,
                radius,
                height,
            } => {
                let top = center + normal * height;
                out.push(disc_face(center, -normal, radius));
                out.push(disc_face(top, normal, radius));
                out.push(Face {
                    kind: FaceKind::Cylindrical,
                    plane: None,
                    center: (center + top) * 0.5,
                    bounds: self.bounds(),
                });
            }
            Primitive::Disc {
                center,
                normal,
                radius,
            } => out.push(disc_face(center, normal, radius)),
            Primitive::Rectangle { plane, dx, dy } => {
                let corners = rect_corners(&plane, dx, dy);
                let frame = plane.translated(plane.xvec * (dx * 0.5) + plane.yvec() * (dy * 0.5));
                out.push(Face {
                    kind: FaceKind::Planar,
                    plane: Some(frame),
                    center: frame.origin,
                    bounds: BoundingBox::from_points(&corners).unwrap_or(BoundingBox {
                        min: plane.origin,
                        max: plane.origin,
                    }),
                });
            }
        }
    }

    fn push_edges(&self, out: &mut Vec<Edge>) {
        match *self {
            Primitive::Cuboid { plane, dx, dy, dz } => {
                let c = cuboid_corners(&plane, dx, dy, dz);
                const PAIRS: [(usize, usize); 12] = [
                    (0, 1), (1, 3), (3, 2), (2, 0),
                    (4, 5), (5, 7), (7, 6), (6, 4),
                    (0, 4), (1, 5), (2, 6), (3, 7),
                ];
                for (a, b) in PAIRS {
                    out.push(Edge::Line {
                        start: c[a],
                        end: c[b],
                    });
                }
            }
            Primitive::Cylinder {
                center,
                normal,
                radius,
                height,
            } => {
                out.push(Edge::Circle {
                    center,
                    normal,
                    radius,
                });
                out.push(Edge::Circle {
                    center: center + normal * height,
                    normal,
                    radius,
                });
            }
            Primitive::Disc {
                center,
                normal,
                radius,
            } => out.push(Edge::Circle {
                center,
                normal,
                radius,
            }),
            Primitive::Rectangle { plane, dx, dy } => {
                let c = rect_corners(&plane, dx, dy);
                for (a, b) in [(0, 1), (1, 3), (3, 2), (2, 0)] {
                    out.push(Edge::Line {
                        start: c[a],
                        end: c[b],
                    });
                }
            }
        }
    }

    fn push_vertices(&self, out: &mut Vec<XYZ>) {
        match *self {
            Primitive::Cuboid { plane, dx, dy, dz } => {
                out.extend(cuboid_corners(&plane, dx, dy, dz));
            }
            Primitive::Rectangle { plane, dx, dy } => out.extend(rect_corners(&plane, dx, dy)),
            Primitive::Cylinder { .. } | Primitive::Disc { .. } => {}
        }
    }
}

fn fold_extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p), hi.max(p))
    })
}

/// Corner order: bit 0 = x, bit 1 = y, bit 2 = z.
fn cuboid_corners(plane: &Plane, dx: f64, dy: f64, dz: f64) -> [XYZ; 8] {
    let (x, y, n) = (plane.xvec * dx, plane.yvec() * dy, plane.normal * dz);
    let o = plane.origin;
    [
        o,
        o + x,
        o + y,
        o + x + y,
        o + n,
        o + x + n,
        o + y + n,
        o + x + y + n,
    ]
}

fn rect_corners(plane: &Plane, dx: f64, dy: f64) -> [XYZ; 4] {
    let (x, y) = (plane.xvec * dx, plane.yvec() * dy);
    let o = plane.origin;
    [o, o + x, o + y, o + x + y]
}

fn disc_face(center: XYZ, normal: XYZ, radius: f64) -> Face {
    let plane = Plane::from_normal(center, normal);
    let prim = Primitive::Disc {
        center,
        normal,
        radius,
    };
    Face {
        kind: FaceKind::Planar,
        plane,
        center,
        bounds: prim.bounds(),
    }
}

// ─── Sub-shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceKind {
    Planar,
    Cylindrical,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub kind: FaceKind,
    /// Surface frame for planar faces, centred on the face, normal pointing outward.
    pub plane: Option<Plane>,
    pub center: XYZ,
    pub bounds: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Edge {
    Line { start: XYZ, end: XYZ },
    Circle { center: XYZ, normal: XYZ, radius: f64 },
}

impl Edge {
    pub fn endpoints(&self) -> Option<(XYZ, XYZ)> {
        match *self {
            Edge::Line { start, end } => Some((start, end)),
            Edge::Circle { .. } => None,
        }
    }

    pub fn midpoint(&self) -> Option<XYZ> {
        self.endpoints().map(|(a, b)| (a + b) * 0.5)
    }

    pub fn center(&self) -> Option<XYZ> {
        match *self {
            Edge::Circle { center, .. } => Some(center),
            Edge::Line { .. } => None,
        }
    }
}

// ─── Shape ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub shape_type: ShapeType,
    pub solids: Vec<Primitive>,
    pub voids: Vec<Primitive>,
}

impl Shape {
    pub fn new(shape_type: ShapeType, solids: Vec<Primitive>, voids: Vec<Primitive>) -> Self {
        Self {
            id: ShapeId::next(),
            shape_type,
            solids,
            voids,
        }
    }

    pub fn from_primitive(primitive: Primitive) -> Self {
        let shape_type = if primitive.is_solid() {
            ShapeType::Solid
        } else {
            ShapeType::Face
        };
        Self::new(shape_type, vec![primitive], Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.solids.is_empty()
    }

    /// Bounds of the solid material (voids never enlarge a shape).
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.solids
            .iter()
            .map(Primitive::bounds)
            .reduce(|a, b| a.union(&b))
    }

    /// `(min, max)` of the solid material projected on `dir`.
    pub fn extent_along(&self, dir: XYZ) -> Option<(f64, f64)> {
        self.solids
            .iter()
            .map(|p| p.extent_along(dir))
            .reduce(|(a0, a1), (b0, b1)| (a0.min(b0), a1.max(b1)))
    }

    pub fn faces(&self) -> Vec<Face> {
        let mut out = Vec::new();
        for p in self.solids.iter().chain(&self.voids) {
            p.push_faces(&mut out);
        }
        out
    }

    /// Faces of the solid material come first in `faces()`; this many.
    pub fn solid_face_count(&self) -> usize {
        let mut out = Vec::new();
        for p in &self.solids {
            p.push_faces(&mut out);
        }
        out.len()
    }

    pub fn edges(&self) -> Vec<Edge> {
        let mut out = Vec::new();
        for p in self.solids.iter().chain(&self.voids) {
            p.push_edges(&mut out);
        }
        out
    }

    pub fn vertices(&self) -> Vec<XYZ> {
        let mut out = Vec::new();
        for p in self.solids.iter().chain(&self.voids) {
            p.push_vertices(&mut out);
        }
        out
    }

    pub fn face(&self, index: usize) -> Option<Face> {
        self.faces().get(index).copied()
    }

    pub fn edge(&self, index: usize) -> Option<Edge> {
        self.edges().get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Shape {
        Shape::from_primitive(Primitive::Cuboid {
            plane: Plane::XY,
            dx: 20.0,
            dy: 10.0,
            dz: 5.0,
        })
    }

    #[test]
    fn cuboid_topology_counts() {
        let shape = unit_box();
        assert_eq!(shape.faces().len(), 6);
        assert_eq!(shape.edges().len(), 12);
        assert_eq!(shape.vertices().len(), 8);
        assert_eq!(shape.shape_type, ShapeType::Solid);
    }

    #[test]
    fn cuboid_top_face_faces_up() {
        let top = unit_box().face(1).unwrap();
        let plane = top.plane.unwrap();
        assert_eq!(plane.normal, XYZ::UNIT_Z);
        assert_eq!(top.center, XYZ::new(10.0, 5.0, 5.0));
    }

    #[test]
    fn cylinder_bounds_and_faces() {
        let shape = Shape::from_primitive(Primitive::Cylinder {
            center: XYZ::new(10.0, 10.0, 0.0),
            normal: XYZ::UNIT_Z,
            radius: 5.0,
            height: 8.0,
        });
        let bb = shape.bounds().unwrap();
        assert!((bb.min.x - 5.0).abs() < 1e-9);
        assert!((bb.max.y - 15.0).abs() < 1e-9);
        assert!((bb.max.z - 8.0).abs() < 1e-9);
        let faces = shape.faces();
        assert_eq!(faces.len(), 3);
        assert_eq!(faces[2].kind, FaceKind::Cylindrical);
        assert!(faces[2].plane.is_none());
    }

    #[test]
    fn voids_do_not_grow_bounds() {
        let mut shape = unit_box();
        shape.voids.push(Primitive::Cylinder {
            center: XYZ::new(10.0, 5.0, -50.0),
            normal: XYZ::UNIT_Z,
            radius: 2.0,
            height: 100.0,
        });
        let bb = shape.bounds().unwrap();
        assert_eq!(bb.min.z, 0.0);
        assert_eq!(bb.max.z, 5.0);
        // but the hole contributes its walls
        assert_eq!(shape.faces().len(), 9);
    }
}
