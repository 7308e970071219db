use chisel_core::{KernelError, ModelError, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    /// A kernel call failed while building geometry.
    #[error("geometry construction failed: {0}")]
    Geometry(KernelError),

    #[error(transparent)]
    Model(ModelError),

    #[error("Face not planar")]
    FaceNotPlanar,

    /// A node picked in an earlier step disappeared across a suspension point.
    #[error("node {0} is no longer in the document")]
    StaleSelection(NodeId),

    #[error("step {0} produced no usable data")]
    MissingStepData(usize),

    #[error("transaction `{label}` rolled back: {source}")]
    TransactionAborted {
        label: String,
        #[source]
        source: Box<EditorError>,
    },

    #[error("cannot undo or redo while transaction `{0}` is open")]
    TransactionInProgress(String),

    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl From<KernelError> for EditorError {
    fn from(e: KernelError) -> Self {
        EditorError::Geometry(e)
    }
}

impl From<ModelError> for EditorError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Kernel(k) => EditorError::Geometry(k),
            other => EditorError::Model(other),
        }
    }
}

impl EditorError {
    /// The innermost error, looking through rolled-back transactions.
    pub fn root_cause(&self) -> &EditorError {
        match self {
            EditorError::TransactionAborted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Why an interactive operation ended without succeeding.
///
/// Cancellation is not an error: it unwinds the operation and leaves the
/// document untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// Escape, the cancel button, or an explicit call.
    User,
    /// A new pick on the same view replaced this one.
    Superseded,
    /// The view closed mid-operation.
    ViewClosed,
    /// An enclosing pick unwound.
    Unwound,
    Disposed,
    /// The pick succeeded with nothing selected.
    EmptySelection,
    Custom(String),
}
