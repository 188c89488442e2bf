use crate::model::RoomId;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("timed out waiting for room {0}")]
    Timeout(RoomId),
    #[error("invalid date range: start is after end")]
    InvalidRange,
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}
