//! Errors emitted by the state engine.

use crate::id::ShapeId;
use crate::validate::ValidateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The intent payload or the resulting tree failed structural checks.
    #[error(transparent)]
    Invalid(#[from] ValidateError),

    /// An intent referenced a shape that does not exist.
    #[error("unknown shape `{0}`")]
    MissingShape(ShapeId),

    /// `shape.create` with an id that is already taken.
    #[error("shape `{0}` already exists")]
    DuplicateShape(ShapeId),

    /// `layer.ungroup` targeted a shape that is not a group.
    #[error("shape `{0}` is not a group")]
    NotAGroup(ShapeId),

    /// Deleting a group that still owns children. Ungroup first.
    #[error("group `{0}` still owns children")]
    GroupNotEmpty(ShapeId),

    /// A layer operation targeted a shape that is not in the top-level
    /// paint order (it is owned by a group).
    #[error("shape `{0}` is not top-level")]
    NotTopLevel(ShapeId),

    #[error("a batch is already open")]
    BatchInProgress,

    #[error("no batch is open")]
    NoActiveBatch,

    #[error("import failed: {0}")]
    Import(#[from] serde_json::Error),

    #[error("binary encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("binary decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}
