//! Hit detection: cursor → pickable entities.
//!
//! Plan-view detection against the working plane. The cursor is a point on
//! the plane; everything is compared in plane coordinates `(u, v)` and
//! ordered by height along the plane normal, topmost first. Later siblings
//! win ties, mirroring paint order.

use crate::context::{VisualContext, VisualId};
use chisel_core::math::TOLERANCE;
use chisel_core::{DocumentGraph, Edge, Face, NodeId, Plane, Primitive, Shape, ShapeType, XYZ};
use smallvec::SmallVec;

/// Local placement of a visual. Identity for everything built in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: XYZ,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: XYZ::ZERO,
    };

    pub fn apply(&self, p: XYZ) -> XYZ {
        p + self.translation
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubShape {
    Whole,
    Face(Face),
    Edge(Edge),
    Vertex(XYZ),
}

/// One pickable entity under the cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualShapeData {
    pub owner: VisualId,
    pub node: NodeId,
    /// The node's full shape.
    pub shape: Shape,
    pub shape_type: ShapeType,
    /// Sub-shape indices into `shape`; empty for whole shapes.
    pub indexes: SmallVec<[usize; 4]>,
    pub sub: SubShape,
    pub transform: Transform,
    /// World point on the entity under the cursor.
    pub point: XYZ,
}

impl VisualShapeData {
    /// The whole shape of `node`, as seen by filters when a node is selected
    /// without a cursor hit.
    pub fn whole(owner: VisualId, node: NodeId, shape: Shape) -> Self {
        let point = shape.bounds().map_or(XYZ::ZERO, |b| b.center());
        Self {
            owner,
            node,
            shape,
            shape_type: ShapeType::Shape,
            indexes: SmallVec::new(),
            sub: SubShape::Whole,
            transform: Transform::IDENTITY,
            point,
        }
    }
}

fn plan(plane: &Plane, p: XYZ) -> (f64, f64, f64) {
    plane.to_local(p)
}

fn footprint_contains(prim: &Primitive, plane: &Plane, u: f64, v: f64, margin: f64) -> bool {
    match *prim {
        Primitive::Cylinder { center, normal, radius, .. } | Primitive::Disc { center, normal, radius }
            if normal.is_parallel(plane.normal) =>
        {
            let (cu, cv, _) = plan(plane, center);
            ((u - cu).powi(2) + (v - cv).powi(2)).sqrt() <= radius + margin
        }
        _ => {
            let (u0, u1) = prim.extent_along(plane.xvec);
            let (v0, v1) = prim.extent_along(plane.yvec());
            let (ou, ov, _) = plan(plane, XYZ::ZERO);
            // extents are absolute; shift into plane coordinates
            let (u, v) = (u - ou, v - ov);
            u >= u0 - margin && u <= u1 + margin && v >= v0 - margin && v <= v1 + margin
        }
    }
}

fn face_contains(face: &Face, plane: &Plane, u: f64, v: f64) -> bool {
    let (u0, u1) = face.bounds.extent_along(plane.xvec);
    let (v0, v1) = face.bounds.extent_along(plane.yvec());
    let (ou, ov, _) = plan(plane, XYZ::ZERO);
    let (u, v) = (u - ou, v - ov);
    u >= u0 - TOLERANCE && u <= u1 + TOLERANCE && v >= v0 - TOLERANCE && v <= v1 + TOLERANCE
}

/// Plan distance from `(u, v)` to an edge, and the height of the nearest point.
fn edge_distance(edge: &Edge, plane: &Plane, u: f64, v: f64) -> (f64, f64) {
    match *edge {
        Edge::Line { start, end } => {
            let (au, av, aw) = plan(plane, start);
            let (bu, bv, bw) = plan(plane, end);
            let (du, dv) = (bu - au, bv - av);
            let len2 = du * du + dv * dv;
            let t = if len2 < TOLERANCE {
                0.0
            } else {
                (((u - au) * du + (v - av) * dv) / len2).clamp(0.0, 1.0)
            };
            let (pu, pv) = (au + t * du, av + t * dv);
            (((u - pu).powi(2) + (v - pv).powi(2)).sqrt(), aw + t * (bw - aw))
        }
        Edge::Circle { center, radius, .. } => {
            let (cu, cv, cw) = plan(plane, center);
            let r = ((u - cu).powi(2) + (v - cv).powi(2)).sqrt();
            ((r - radius).abs(), cw)
        }
    }
}

struct Candidate {
    height: f64,
    order: usize,
    data: VisualShapeData,
}

/// Everything of `shape_type` under `point` on `plane`, topmost first.
///
/// `shape_type` of `Shape` matches whole shapes of any kind; `Solid` and
/// `Compound` match whole shapes of exactly that kind.
pub fn detect(
    graph: &DocumentGraph,
    context: &VisualContext,
    plane: &Plane,
    point: XYZ,
    shape_type: ShapeType,
    tolerance: f64,
) -> Vec<VisualShapeData> {
    let (u, v, _) = plan(plane, point);
    let mut hits: Vec<Candidate> = Vec::new();

    for (order, id) in graph.shape_nodes().into_iter().enumerate() {
        let Some(node) = graph.get_by_id(id) else {
            continue;
        };
        if !node.visible {
            continue;
        }
        let Some(owner) = context.visual_of(id) else {
            continue;
        };
        let shape = match graph.shape_of(id) {
            Ok(shape) => shape,
            Err(e) => {
                log::trace!("detect: skipping {id}: {e}");
                continue;
            }
        };
        let make = |shape_type, indexes: &[usize], sub, hit: XYZ| VisualShapeData {
            owner,
            node: id,
            shape: shape.clone(),
            shape_type,
            indexes: SmallVec::from_slice(indexes),
            sub,
            transform: Transform::IDENTITY,
            point: hit,
        };

        // Cursor over a hole: nothing of this shape is under it except edges.
        let in_void = shape
            .voids
            .iter()
            .any(|p| footprint_contains(p, plane, u, v, -tolerance));

        match shape_type {
            ShapeType::Shape | ShapeType::Solid | ShapeType::Compound => {
                if shape_type != ShapeType::Shape && shape.shape_type != shape_type {
                    continue;
                }
                let in_solid = shape
                    .solids
                    .iter()
                    .any(|p| footprint_contains(p, plane, u, v, tolerance));
                if in_solid && !in_void {
                    let (_, top) = shape.extent_along(plane.normal).unwrap_or((0.0, 0.0));
                    let (_, _, base) = plan(plane, XYZ::ZERO);
                    let height = top + base;
                    let hit = plane.to_world(u, v) + plane.normal * height;
                    hits.push(Candidate {
                        height,
                        order,
                        data: make(shape.shape_type, &[], SubShape::Whole, hit),
                    });
                }
            }
            ShapeType::Face if in_void => {}
            ShapeType::Face => {
                let solid_faces = shape.solid_face_count();
                for (i, face) in shape.faces().into_iter().enumerate().take(solid_faces) {
                    let Some(fp) = face.plane else { continue };
                    if fp.normal.dot(plane.normal) < 1.0 - 1e-6 {
                        continue;
                    }
                    if !face_contains(&face, plane, u, v) {
                        continue;
                    }
                    let (_, _, height) = plan(plane, face.center);
                    let hit = plane.to_world(u, v) + plane.normal * height;
                    hits.push(Candidate {
                        height,
                        order,
                        data: make(ShapeType::Face, &[i], SubShape::Face(face), hit),
                    });
                }
            }
            ShapeType::Edge => {
                for (i, edge) in shape.edges().into_iter().enumerate() {
                    let (dist, height) = edge_distance(&edge, plane, u, v);
                    if dist <= tolerance {
                        let hit = plane.to_world(u, v) + plane.normal * height;
                        hits.push(Candidate {
                            height,
                            order,
                            data: make(ShapeType::Edge, &[i], SubShape::Edge(edge), hit),
                        });
                    }
                }
            }
            ShapeType::Vertex => {
                for (i, vertex) in shape.vertices().into_iter().enumerate() {
                    let (vu, vv, height) = plan(plane, vertex);
                    if ((u - vu).powi(2) + (v - vv).powi(2)).sqrt() <= tolerance {
                        hits.push(Candidate {
                            height,
                            order,
                            data: make(ShapeType::Vertex, &[i], SubShape::Vertex(vertex), vertex),
                        });
                    }
                }
            }
        }
    }

    hits.sort_by(|a, b| {
        b.height
            .total_cmp(&a.height)
            .then_with(|| b.order.cmp(&a.order))
    });
    hits.into_iter().map(|c| c.data).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chisel_core::{BodyKind, BoundsKernel, GraphMutation, Node, Params, ShapeNode, Subtree};
    use std::rc::Rc;

    fn scene() -> (DocumentGraph, VisualContext, NodeId, NodeId) {
        let mut g = DocumentGraph::new(Rc::new(BoundsKernel));
        let ctx = VisualContext::new();
        let low = Node::shape(
            "low",
            ShapeNode::new(
                Params::with(BodyKind::Box, &[("width", 20.0.into()), ("height", 2.0.into())])
                    .unwrap(),
            ),
        );
        let high = Node::shape(
            "high",
            ShapeNode::new(Params::with(BodyKind::Box, &[("height", 8.0.into())]).unwrap()),
        );
        let (low_id, high_id) = (low.id, high.id);
        for (i, n) in [low, high].into_iter().enumerate() {
            ctx.register(n.id);
            GraphMutation::add(NodeId::root(), i, Subtree::leaf(n))
                .apply(&mut g)
                .unwrap();
        }
        (g, ctx, low_id, high_id)
    }

    #[test]
    fn whole_shapes_topmost_first() {
        let (g, ctx, low, high) = scene();
        let hits = detect(&g, &ctx, &Plane::XY, XYZ::new(5.0, 5.0, 0.0), ShapeType::Shape, 1.0);
        let ids: Vec<_> = hits.iter().map(|h| h.node).collect();
        assert_eq!(ids, vec![high, low]);

        let hits = detect(&g, &ctx, &Plane::XY, XYZ::new(15.0, 5.0, 0.0), ShapeType::Shape, 1.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node, low);
    }

    #[test]
    fn faces_only_when_facing_the_view() {
        let (g, ctx, _, high) = scene();
        let hits = detect(&g, &ctx, &Plane::XY, XYZ::new(5.0, 5.0, 0.0), ShapeType::Face, 1.0);
        assert_eq!(hits[0].node, high);
        assert_eq!(hits[0].indexes.as_slice(), &[1]);
        let SubShape::Face(face) = &hits[0].sub else {
            panic!("expected a face");
        };
        assert_eq!(face.plane.unwrap().normal, XYZ::UNIT_Z);
        assert!((hits[0].point.z - 8.0).abs() < 1e-9);
    }

    #[test]
    fn edges_and_vertices_use_tolerance() {
        let (g, ctx, _, _) = scene();
        let near = detect(&g, &ctx, &Plane::XY, XYZ::new(20.5, 5.0, 0.0), ShapeType::Edge, 1.0);
        assert!(!near.is_empty());
        let far = detect(&g, &ctx, &Plane::XY, XYZ::new(23.0, 5.0, 0.0), ShapeType::Edge, 1.0);
        assert!(far.is_empty());
        let corner = detect(&g, &ctx, &Plane::XY, XYZ::new(0.2, 0.2, 0.0), ShapeType::Vertex, 1.0);
        assert!(corner.iter().all(|h| h.shape_type == ShapeType::Vertex));
        assert!(!corner.is_empty());
    }

    #[test]
    fn unregistered_and_hidden_nodes_are_skipped() {
        let (mut g, ctx, low, high) = scene();
        ctx.unregister(high);
        GraphMutation::SetVisible { id: low, visible: false }
            .apply(&mut g)
            .unwrap();
        let hits = detect(&g, &ctx, &Plane::XY, XYZ::new(5.0, 5.0, 0.0), ShapeType::Shape, 1.0);
        assert!(hits.is_empty());
    }
}
