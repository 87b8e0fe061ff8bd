use crate::buffer::BufferId;
use std::io;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("result buffer {buffer:?} was released while a handle still referenced it")]
    DanglingReference { buffer: BufferId },
    #[error("matrix is singular: determinant {determinant} is within {epsilon} of zero")]
    SingularMatrix { determinant: f32, epsilon: f32 },
    #[error("slot {slot} of result buffer {buffer:?} has not been evaluated")]
    UnevaluatedHandle { buffer: BufferId, slot: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
