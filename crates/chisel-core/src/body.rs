//! Parametric bodies and their schema descriptors.
//!
//! Every body kind has one static `Schema`: the ordered list of its fields
//! with defaults and whether writing the field changes geometry. Parameter
//! storage, validation and serialization all go through the schema, so there
//! is no per-kind boilerplate and no runtime reflection.

use crate::error::{KernelError, ModelError};
use crate::kernel::{KernelResult, ShapeFactory};
use crate::math::{Plane, XYZ};
use crate::shape::Shape;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyKind {
    Box,
    Cylinder,
    Tube,
    HSection,
    LSection,
    USection,
    TeeSection,
    RecSection,
    /// Result of a boolean or cutout; geometry lives in the node's source shape.
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Number(f64),
    Plane(Plane),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Number(_) => "number",
            ParamValue::Plane(_) => "plane",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match *self {
            ParamValue::Number(n) => Some(n),
            ParamValue::Plane(_) => None,
        }
    }

    pub fn as_plane(&self) -> Option<Plane> {
        match *self {
            ParamValue::Plane(p) => Some(p),
            ParamValue::Number(_) => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<Plane> for ParamValue {
    fn from(p: Plane) -> Self {
        ParamValue::Plane(p)
    }
}

// ─── Schema ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub default: ParamValue,
    pub affects_shape: bool,
}

#[derive(Debug, PartialEq)]
pub struct Schema {
    pub kind: BodyKind,
    /// Stable name written to serialized documents.
    pub type_name: &'static str,
    pub fields: &'static [Field],
}

impl Schema {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn by_type_name(name: &str) -> Option<&'static Schema> {
        ALL_SCHEMAS.iter().copied().find(|s| s.type_name == name)
    }
}

const fn num(name: &'static str, default: f64) -> Field {
    Field {
        name,
        default: ParamValue::Number(default),
        affects_shape: true,
    }
}

const PLANE: Field = Field {
    name: "plane",
    default: ParamValue::Plane(Plane::XY),
    affects_shape: true,
};

static BOX: Schema = Schema {
    kind: BodyKind::Box,
    type_name: "BoxNode",
    fields: &[PLANE, num("width", 10.0), num("length", 10.0), num("height", 10.0)],
};

static CYLINDER: Schema = Schema {
    kind: BodyKind::Cylinder,
    type_name: "CylinderNode",
    fields: &[PLANE, num("radius", 10.0), num("height", 20.0)],
};

static TUBE: Schema = Schema {
    kind: BodyKind::Tube,
    type_name: "TubeNode",
    fields: &[PLANE, num("outerRadius", 5.0), num("innerRadius", 2.0), num("height", 10.0)],
};

static H_SECTION: Schema = Schema {
    kind: BodyKind::HSection,
    type_name: "HSectionNode",
    fields: &[
        PLANE,
        num("width", 10.0),
        num("height", 10.0),
        num("flangeThickness", 1.0),
        num("webThickness", 1.0),
        num("length", 10.0),
    ],
};

static L_SECTION: Schema = Schema {
    kind: BodyKind::LSection,
    type_name: "LSectionNode",
    fields: &[
        PLANE,
        num("width", 10.0),
        num("widthTwo", 10.0),
        num("thickness", 1.0),
        num("length", 10.0),
    ],
};

static U_SECTION: Schema = Schema {
    kind: BodyKind::USection,
    type_name: "USectionNode",
    fields: &[
        PLANE,
        num("width", 10.0),
        num("height", 10.0),
        num("thickness", 1.0),
        num("length", 10.0),
    ],
};

static TEE_SECTION: Schema = Schema {
    kind: BodyKind::TeeSection,
    type_name: "TeeSectionNode",
    fields: &[
        PLANE,
        num("width", 10.0),
        num("height", 10.0),
        num("thickness", 1.0),
        num("length", 10.0),
    ],
};

static REC_SECTION: Schema = Schema {
    kind: BodyKind::RecSection,
    type_name: "RecSectionNode",
    fields: &[
        PLANE,
        num("width", 10.0),
        num("height", 10.0),
        num("thickness", 1.0),
        num("length", 10.0),
    ],
};

static BOOLEAN: Schema = Schema {
    kind: BodyKind::Boolean,
    type_name: "BooleanNode",
    fields: &[],
};

static ALL_SCHEMAS: [&Schema; 9] = [
    &BOX,
    &CYLINDER,
    &TUBE,
    &H_SECTION,
    &L_SECTION,
    &U_SECTION,
    &TEE_SECTION,
    &REC_SECTION,
    &BOOLEAN,
];

impl BodyKind {
    pub fn schema(self) -> &'static Schema {
        match self {
            BodyKind::Box => &BOX,
            BodyKind::Cylinder => &CYLINDER,
            BodyKind::Tube => &TUBE,
            BodyKind::HSection => &H_SECTION,
            BodyKind::LSection => &L_SECTION,
            BodyKind::USection => &U_SECTION,
            BodyKind::TeeSection => &TEE_SECTION,
            BodyKind::RecSection => &REC_SECTION,
            BodyKind::Boolean => &BOOLEAN,
        }
    }

    /// Prefix used for generated node ids.
    pub fn id_prefix(self) -> &'static str {
        match self {
            BodyKind::Box => "box",
            BodyKind::Cylinder => "cylinder",
            BodyKind::Tube => "tube",
            BodyKind::HSection => "hsection",
            BodyKind::LSection => "lsection",
            BodyKind::USection => "usection",
            BodyKind::TeeSection => "teesection",
            BodyKind::RecSection => "recsection",
            BodyKind::Boolean => "boolean",
        }
    }
}

// ─── Params ──────────────────────────────────────────────────────────────

/// Parameter values of one body, stored in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    kind: BodyKind,
    values: SmallVec<[ParamValue; 6]>,
}

impl Params {
    pub fn defaults(kind: BodyKind) -> Self {
        Self {
            kind,
            values: kind.schema().fields.iter().map(|f| f.default).collect(),
        }
    }

    /// Build from `(name, value)` pairs; unnamed fields keep their defaults.
    pub fn with(kind: BodyKind, values: &[(&str, ParamValue)]) -> Result<Self, ModelError> {
        let mut params = Self::defaults(kind);
        for (name, value) in values {
            params.set(name, *value)?;
        }
        Ok(params)
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn schema(&self) -> &'static Schema {
        self.kind.schema()
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        let i = self.schema().field_index(name)?;
        self.values.get(i).copied()
    }

    pub fn number(&self, name: &str) -> Result<f64, ModelError> {
        self.lookup(name)?
            .as_number()
            .ok_or_else(|| ModelError::TypeMismatch {
                name: name.to_string(),
                expected: "number",
            })
    }

    pub fn plane(&self, name: &str) -> Result<Plane, ModelError> {
        self.lookup(name)?
            .as_plane()
            .ok_or_else(|| ModelError::TypeMismatch {
                name: name.to_string(),
                expected: "plane",
            })
    }

    fn lookup(&self, name: &str) -> Result<ParamValue, ModelError> {
        self.get(name).ok_or_else(|| ModelError::UnknownParameter {
            kind: self.kind,
            name: name.to_string(),
        })
    }

    /// Write a value, returning the previous one.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<ParamValue, ModelError> {
        let schema = self.schema();
        let i = schema
            .field_index(name)
            .ok_or_else(|| ModelError::UnknownParameter {
                kind: self.kind,
                name: name.to_string(),
            })?;
        let expected = schema.fields[i].default.type_name();
        if value.type_name() != expected {
            return Err(ModelError::TypeMismatch {
                name: name.to_string(),
                expected,
            });
        }
        Ok(std::mem::replace(&mut self.values[i], value))
    }

    /// `(field, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static Field, ParamValue)> + '_ {
        self.schema().fields.iter().zip(self.values.iter().copied())
    }

    /// Reject parameter sets that cannot describe a body.
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |reason: String| ModelError::InvalidParameters {
            kind: self.kind,
            reason,
        };
        for (field, value) in self.iter() {
            if let ParamValue::Number(n) = value
                && !(n.is_finite() && n > 0.0)
            {
                return Err(invalid(format!("{} must be positive", field.name)));
            }
        }
        match self.kind {
            BodyKind::Tube => {
                if self.number("innerRadius")? >= self.number("outerRadius")? {
                    return Err(invalid("innerRadius must be smaller than outerRadius".into()));
                }
            }
            BodyKind::HSection => {
                let (w, h) = (self.number("width")?, self.number("height")?);
                if self.number("webThickness")? >= w {
                    return Err(invalid("webThickness must be smaller than width".into()));
                }
                if 2.0 * self.number("flangeThickness")? >= h {
                    return Err(invalid("flanges must leave room for the web".into()));
                }
            }
            BodyKind::LSection => {
                let t = self.number("thickness")?;
                if t >= self.number("width")? || t >= self.number("widthTwo")? {
                    return Err(invalid("thickness must be smaller than both legs".into()));
                }
            }
            BodyKind::USection | BodyKind::RecSection => {
                let t = self.number("thickness")?;
                if 2.0 * t >= self.number("width")? || 2.0 * t >= self.number("height")? {
                    return Err(invalid("thickness must leave an opening".into()));
                }
            }
            BodyKind::TeeSection => {
                let t = self.number("thickness")?;
                if t >= self.number("width")? || t >= self.number("height")? {
                    return Err(invalid("thickness must be smaller than width and height".into()));
                }
            }
            BodyKind::Box | BodyKind::Cylinder | BodyKind::Boolean => {}
        }
        Ok(())
    }
}

// ─── Generation ──────────────────────────────────────────────────────────

fn shifted(p: &Plane, offset: XYZ) -> Plane {
    p.translated(offset)
}

fn param_error(err: ModelError) -> KernelError {
    KernelError::InvalidParameter {
        op: "generate",
        reason: err.to_string(),
    }
}

/// Build the shape of a body. Each kernel call is checked before its result
/// feeds the next one; the first failure aborts the construction.
pub fn generate(
    params: &Params,
    source: Option<&Shape>,
    kernel: &dyn ShapeFactory,
) -> KernelResult {
    if params.kind() == BodyKind::Boolean {
        return source.cloned().ok_or(KernelError::MissingSource);
    }
    let p = params.plane("plane").map_err(param_error)?;
    let n = |name: &str| params.number(name).map_err(param_error);

    match params.kind() {
        BodyKind::Box => kernel.box_(&p, n("width")?, n("length")?, n("height")?),
        BodyKind::Cylinder => kernel.cylinder(p.normal, p.origin, n("radius")?, n("height")?),
        BodyKind::Tube => {
            let outer_r = n("outerRadius")?;
            let inner_r = n("innerRadius")?.min(outer_r - 1e-6).max(0.0);
            let h = n("height")?;
            let outer = kernel.cylinder(p.normal, p.origin, outer_r, h)?;
            let inner = kernel.cylinder(p.normal, p.origin, inner_r, h)?;
            kernel.boolean_cut(&[outer], &[inner])
        }
        BodyKind::HSection => {
            let (w, h, l) = (n("width")?, n("height")?, n("length")?);
            let (tf, tw) = (n("flangeThickness")?, n("webThickness")?);
            let bottom = kernel.box_(&p, w, tf, l)?;
            let top = kernel.box_(&shifted(&p, p.yvec() * (h - tf)), w, tf, l)?;
            let web = kernel.box_(&shifted(&p, p.xvec * ((w - tw) / 2.0)), tw, h, l)?;
            let lower = kernel.boolean_fuse(&[bottom], &[web])?;
            kernel.boolean_fuse(&[lower], &[top])
        }
        BodyKind::LSection => {
            let (w1, w2, t, l) = (n("width")?, n("widthTwo")?, n("thickness")?, n("length")?);
            let horizontal = kernel.box_(&p, w2, t, l)?;
            let vertical = kernel.box_(&p, t, w1, l)?;
            kernel.boolean_fuse(&[horizontal], &[vertical])
        }
        BodyKind::USection => {
            let (w, h, t, l) = (n("width")?, n("height")?, n("thickness")?, n("length")?);
            let bottom = kernel.box_(&p, w, t, l)?;
            let top = kernel.box_(&shifted(&p, p.yvec() * (h - t)), w, t, l)?;
            let web = kernel.box_(&p, t, h, l)?;
            let lower = kernel.boolean_fuse(&[bottom], &[web])?;
            kernel.boolean_fuse(&[lower], &[top])
        }
        BodyKind::TeeSection => {
            let (w, h, t, l) = (n("width")?, n("height")?, n("thickness")?, n("length")?);
            let flange = kernel.box_(&shifted(&p, p.yvec() * (h - t)), w, t, l)?;
            let web = kernel.box_(&shifted(&p, p.xvec * ((w - t) / 2.0)), t, (h - t).max(0.0), l)?;
            kernel.boolean_fuse(&[flange], &[web])
        }
        BodyKind::RecSection => {
            let (w, h, t, l) = (n("width")?, n("height")?, n("thickness")?, n("length")?);
            let outer = kernel.box_(&p, w, h, l)?;
            let inner_plane = shifted(&p, p.xvec * t + p.yvec() * t);
            let inner = kernel.box_(
                &inner_plane,
                (w - 2.0 * t).max(0.0),
                (h - 2.0 * t).max(0.0),
                l,
            )?;
            kernel.boolean_cut(&[outer], &[inner])
        }
        BodyKind::Boolean => source.cloned().ok_or(KernelError::MissingSource),
    }
}
