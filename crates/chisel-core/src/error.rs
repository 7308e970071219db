use crate::body::BodyKind;
use crate::id::NodeId;
use thiserror::Error;

/// Failure reported by a geometry kernel call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("{op}: invalid parameter: {reason}")]
    InvalidParameter { op: &'static str, reason: String },

    #[error("{op}: degenerate result: {reason}")]
    Degenerate { op: &'static str, reason: String },

    #[error("booleanCut: tool is not fully contained in the target")]
    ToolNotContained,

    #[error("{op}: empty operand")]
    EmptyOperand { op: &'static str },

    #[error("{op}: unsupported profile")]
    UnsupportedProfile { op: &'static str },

    #[error("boolean body has no source shape")]
    MissingSource,
}

impl KernelError {
    pub(crate) fn invalid(op: &'static str, reason: impl Into<String>) -> Self {
        KernelError::InvalidParameter {
            op,
            reason: reason.into(),
        }
    }

    pub(crate) fn degenerate(op: &'static str, reason: impl Into<String>) -> Self {
        KernelError::Degenerate {
            op,
            reason: reason.into(),
        }
    }
}

/// Failure of a document-model operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    #[error("node {0} is not a shape node")]
    NotAShape(NodeId),

    #[error("{kind:?} has no parameter `{name}`")]
    UnknownParameter { kind: BodyKind, name: String },

    #[error("parameter `{name}` expects a {expected} value")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("invalid parent for {0}")]
    InvalidParent(NodeId),

    #[error("invalid parameters for {kind:?}: {reason}")]
    InvalidParameters { kind: BodyKind, reason: String },

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("serialization failed: {0}")]
    Serialization(String),
}
