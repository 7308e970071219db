pub mod body;
pub mod error;
pub mod graph;
pub mod id;
pub mod kernel;
pub mod math;
pub mod model;
pub mod mutation;
pub mod serialize;
pub mod shape;

pub use body::{BodyKind, Field, ParamValue, Params, Schema};
pub use error::{KernelError, ModelError};
pub use graph::{DocumentGraph, Subtree};
pub use id::NodeId;
pub use kernel::{BoundsKernel, KernelResult, ShapeFactory};
pub use math::{BoundingBox, Plane, XYZ};
pub use model::*;
pub use mutation::{Applied, Change, GraphMutation};
pub use shape::{Edge, Face, FaceKind, Primitive, Shape, ShapeId, ShapeType};

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
