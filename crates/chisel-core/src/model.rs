//! Document tree nodes.
//!
//! A node is a folder or a parametric shape. Shape nodes own their
//! parameters and derive their `Shape` lazily through the kernel; the cache
//! is dropped whenever a geometry-affecting parameter is written.

use crate::body::{BodyKind, ParamValue, Params};
use crate::error::{KernelError, ModelError};
use crate::id::NodeId;
use crate::kernel::ShapeFactory;
use crate::shape::Shape;
use std::cell::OnceCell;

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub visible: bool,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Root,
    Folder,
    Shape(ShapeNode),
}

impl Node {
    pub fn root() -> Self {
        Self {
            id: NodeId::root(),
            name: "root".to_string(),
            visible: true,
            kind: NodeKind::Root,
        }
    }

    pub fn folder(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            visible: true,
            kind: NodeKind::Folder,
        }
    }

    /// Shape node with a generated id.
    pub fn shape(name: impl Into<String>, body: ShapeNode) -> Self {
        let id = NodeId::with_prefix(body.kind().id_prefix());
        Self::shape_with_id(id, name, body)
    }

    pub fn shape_with_id(id: NodeId, name: impl Into<String>, body: ShapeNode) -> Self {
        Self {
            id,
            name: name.into(),
            visible: true,
            kind: NodeKind::Shape(body),
        }
    }

    pub fn as_shape(&self) -> Option<&ShapeNode> {
        match &self.kind {
            NodeKind::Shape(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_shape_mut(&mut self) -> Option<&mut ShapeNode> {
        match &mut self.kind {
            NodeKind::Shape(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_shape(&self) -> bool {
        matches!(self.kind, NodeKind::Shape(_))
    }
}

// ─── Shape nodes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ShapeNode {
    params: Params,
    /// Fixed geometry for boolean results.
    source: Option<Shape>,
    cache: OnceCell<Result<Shape, KernelError>>,
}

impl PartialEq for ShapeNode {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.source == other.source
    }
}

impl ShapeNode {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            source: None,
            cache: OnceCell::new(),
        }
    }

    /// A body whose geometry is a precomputed boolean result.
    pub fn from_shape(shape: Shape) -> Self {
        Self {
            params: Params::defaults(BodyKind::Boolean),
            source: Some(shape),
            cache: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> BodyKind {
        self.params.kind()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn source(&self) -> Option<&Shape> {
        self.source.as_ref()
    }

    /// Write a parameter, returning the previous value.
    /// Geometry-affecting fields invalidate the cached shape.
    pub fn set_parameter(&mut self, name: &str, value: ParamValue) -> Result<ParamValue, ModelError> {
        let old = self.params.set(name, value)?;
        let affects = self
            .params
            .schema()
            .field_index(name)
            .is_some_and(|i| self.params.schema().fields[i].affects_shape);
        if affects && old != value {
            self.cache = OnceCell::new();
        }
        Ok(old)
    }

    /// The derived shape, regenerating it when stale.
    pub fn shape(&self, kernel: &dyn ShapeFactory) -> Result<&Shape, KernelError> {
        self.cache
            .get_or_init(|| {
                let result = crate::body::generate(&self.params, self.source.as_ref(), kernel);
                if let Err(e) = &result {
                    log::warn!("{:?} generation failed: {e}", self.kind());
                }
                result
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// The cached shape, if one was generated and is still current.
    pub fn cached_shape(&self) -> Option<&Shape> {
        self.cache.get().and_then(|r| r.as_ref().ok())
    }

    pub fn is_stale(&self) -> bool {
        self.cache.get().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::BoundsKernel;

    #[test]
    fn shape_is_generated_lazily_and_invalidated() {
        let mut body = ShapeNode::new(Params::defaults(BodyKind::Box));
        assert!(body.is_stale());
        assert!(body.cached_shape().is_none());

        let first = body.shape(&BoundsKernel).unwrap().id;
        assert!(!body.is_stale());
        assert_eq!(body.shape(&BoundsKernel).unwrap().id, first);

        body.set_parameter("height", 3.0.into()).unwrap();
        assert!(body.is_stale());
        let regenerated = body.shape(&BoundsKernel).unwrap();
        assert_ne!(regenerated.id, first);
        assert!((regenerated.bounds().unwrap().max.z - 3.0).abs() < 1e-9);
    }

    #[test]
    fn writing_the_same_value_keeps_cache() {
        let mut body = ShapeNode::new(Params::defaults(BodyKind::Cylinder));
        body.shape(&BoundsKernel).unwrap();
        body.set_parameter("radius", 10.0.into()).unwrap();
        assert!(!body.is_stale());
    }

    #[test]
    fn failed_generation_is_reported() {
        let mut body = ShapeNode::new(Params::defaults(BodyKind::Box));
        body.set_parameter("width", 0.0.into()).unwrap();
        assert!(body.shape(&BoundsKernel).is_err());
        assert!(body.cached_shape().is_none());
    }
}
