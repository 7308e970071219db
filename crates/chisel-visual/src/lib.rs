pub mod context;
pub mod highlight;
pub mod hit;
pub mod mesh;

pub use context::{VisualContext, VisualId};
pub use highlight::{HighlightKey, Highlighter, VisualState};
pub use hit::{SubShape, Transform, VisualShapeData, detect};
pub use mesh::{MeshData, MeshId, MeshKind};
