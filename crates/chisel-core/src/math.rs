//! Small 3D math toolkit: vectors, planes and axis-aligned bounds.
//!
//! Only what the document model, the reference kernel and plan-view picking
//! need. Camera and projection math live outside this crate.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// Length below which values are treated as zero.
pub const TOLERANCE: f64 = 1e-9;

// ─── XYZ ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct XYZ {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl XYZ {
    pub const ZERO: XYZ = XYZ::new(0.0, 0.0, 0.0);
    pub const UNIT_X: XYZ = XYZ::new(1.0, 0.0, 0.0);
    pub const UNIT_Y: XYZ = XYZ::new(0.0, 1.0, 0.0);
    pub const UNIT_Z: XYZ = XYZ::new(0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: XYZ) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: XYZ) -> XYZ {
        XYZ::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: XYZ) -> f64 {
        (self - other).length()
    }

    /// Unit vector in the same direction, or `None` for a zero vector.
    pub fn normalize(self) -> Option<XYZ> {
        let len = self.length();
        if len < TOLERANCE || !len.is_finite() {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn min(self, other: XYZ) -> XYZ {
        XYZ::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: XYZ) -> XYZ {
        XYZ::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// `true` when both vectors lie on the same line (either direction).
    pub fn is_parallel(self, other: XYZ) -> bool {
        self.cross(other).length() < 1e-6 * self.length().max(1.0) * other.length().max(1.0)
    }

    /// Any unit vector perpendicular to `self`.
    pub fn any_perpendicular(self) -> Option<XYZ> {
        let n = self.normalize()?;
        let seed = if n.x.abs() < 0.9 { XYZ::UNIT_X } else { XYZ::UNIT_Y };
        n.cross(seed).normalize()
    }
}

impl Add for XYZ {
    type Output = XYZ;
    fn add(self, rhs: XYZ) -> XYZ {
        XYZ::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for XYZ {
    type Output = XYZ;
    fn sub(self, rhs: XYZ) -> XYZ {
        XYZ::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for XYZ {
    type Output = XYZ;
    fn mul(self, rhs: f64) -> XYZ {
        XYZ::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for XYZ {
    type Output = XYZ;
    fn neg(self) -> XYZ {
        XYZ::new(-self.x, -self.y, -self.z)
    }
}

// ─── Plane ───────────────────────────────────────────────────────────────

/// A placed coordinate frame: origin, unit normal and unit x direction.
/// The y direction is derived as `normal × xvec`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub origin: XYZ,
    pub normal: XYZ,
    pub xvec: XYZ,
}

impl Plane {
    pub const XY: Plane = Plane {
        origin: XYZ::ZERO,
        normal: XYZ::UNIT_Z,
        xvec: XYZ::UNIT_X,
    };

    /// Build a plane, normalizing the axes. `xvec` is re-orthogonalized
    /// against `normal`. Returns `None` for degenerate axes.
    pub fn new(origin: XYZ, normal: XYZ, xvec: XYZ) -> Option<Plane> {
        let normal = normal.normalize()?;
        let xvec = (xvec - normal * xvec.dot(normal)).normalize()?;
        Some(Plane {
            origin,
            normal,
            xvec,
        })
    }

    /// A plane with the given normal and an arbitrary x direction.
    pub fn from_normal(origin: XYZ, normal: XYZ) -> Option<Plane> {
        let xvec = normal.any_perpendicular()?;
        Plane::new(origin, normal, xvec)
    }

    pub fn yvec(&self) -> XYZ {
        self.normal.cross(self.xvec)
    }

    /// Same axes, origin moved by `offset`.
    pub fn translated(&self, offset: XYZ) -> Plane {
        Plane {
            origin: self.origin + offset,
            ..*self
        }
    }

    /// Same axes, origin moved to `origin`.
    pub fn with_origin(&self, origin: XYZ) -> Plane {
        Plane { origin, ..*self }
    }

    /// Point at plane coordinates `(u, v)`.
    pub fn to_world(&self, u: f64, v: f64) -> XYZ {
        self.origin + self.xvec * u + self.yvec() * v
    }

    /// `(u, v, w)` coordinates of `point` in this frame.
    pub fn to_local(&self, point: XYZ) -> (f64, f64, f64) {
        let d = point - self.origin;
        (d.dot(self.xvec), d.dot(self.yvec()), d.dot(self.normal))
    }

    /// Orthogonal projection of `point` onto the plane.
    pub fn project(&self, point: XYZ) -> XYZ {
        let (u, v, _) = self.to_local(point);
        self.to_world(u, v)
    }
}

// ─── Bounding box ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: XYZ,
    pub max: XYZ,
}

impl BoundingBox {
    pub fn from_points(points: &[XYZ]) -> Option<BoundingBox> {
        let (first, rest) = points.split_first()?;
        let mut bb = BoundingBox {
            min: *first,
            max: *first,
        };
        for p in rest {
            bb.min = bb.min.min(*p);
            bb.max = bb.max.max(*p);
        }
        Some(bb)
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> XYZ {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> XYZ {
        self.max - self.min
    }

    pub fn corners(&self) -> [XYZ; 8] {
        let (a, b) = (self.min, self.max);
        [
            XYZ::new(a.x, a.y, a.z),
            XYZ::new(b.x, a.y, a.z),
            XYZ::new(a.x, b.y, a.z),
            XYZ::new(a.x, a.y, b.z),
            XYZ::new(b.x, b.y, a.z),
            XYZ::new(b.x, a.y, b.z),
            XYZ::new(a.x, b.y, b.z),
            XYZ::new(b.x, b.y, b.z),
        ]
    }

    /// `(min, max)` of the corners projected on `dir`.
    pub fn extent_along(&self, dir: XYZ) -> (f64, f64) {
        self.corners()
            .iter()
            .map(|c| c.dot(dir))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p), hi.max(p))
            })
    }

    pub fn contains(&self, p: XYZ) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }
}
