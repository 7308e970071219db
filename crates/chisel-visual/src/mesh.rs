//! Transient preview geometry.

use chisel_core::{Edge, Plane, Shape, XYZ};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshKind {
    Points,
    /// Pairs of positions, one segment per pair.
    Lines,
}

/// RGBA packed as `0xRRGGBBAA`.
pub type Color = u32;

pub const PREVIEW_COLOR: Color = 0x3080_FFFF;
pub const MARKER_COLOR: Color = 0xFFB0_00FF;

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub kind: MeshKind,
    pub positions: Vec<XYZ>,
    pub color: Color,
}

const CIRCLE_SEGMENTS: usize = 32;

impl MeshData {
    pub fn point_marker(point: XYZ, color: Color) -> Self {
        Self {
            kind: MeshKind::Points,
            positions: vec![point],
            color,
        }
    }

    pub fn lines(segments: &[(XYZ, XYZ)], color: Color) -> Self {
        Self {
            kind: MeshKind::Lines,
            positions: segments.iter().flat_map(|&(a, b)| [a, b]).collect(),
            color,
        }
    }

    /// Outline of a `dx × dy` rectangle on `plane` from its origin.
    pub fn rect_outline(plane: &Plane, dx: f64, dy: f64, color: Color) -> Self {
        let c = [
            plane.to_world(0.0, 0.0),
            plane.to_world(dx, 0.0),
            plane.to_world(dx, dy),
            plane.to_world(0.0, dy),
        ];
        Self::lines(&[(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])], color)
    }

    /// Wireframe of every edge of `shape`; circles are tessellated.
    pub fn wireframe(shape: &Shape, color: Color) -> Self {
        let mut segments = Vec::new();
        for edge in shape.edges() {
            match edge {
                Edge::Line { start, end } => segments.push((start, end)),
                Edge::Circle {
                    center,
                    normal,
                    radius,
                } => {
                    let Some(frame) = Plane::from_normal(center, normal) else {
                        continue;
                    };
                    let at = |i: usize| {
                        let a = std::f64::consts::TAU * i as f64 / CIRCLE_SEGMENTS as f64;
                        frame.to_world(radius * a.cos(), radius * a.sin())
                    };
                    segments.extend((0..CIRCLE_SEGMENTS).map(|i| (at(i), at(i + 1))));
                }
            }
        }
        Self::lines(&segments, color)
    }

    pub fn segment_count(&self) -> usize {
        match self.kind {
            MeshKind::Points => 0,
            MeshKind::Lines => self.positions.len() / 2,
        }
    }
}
