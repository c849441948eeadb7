use thiserror::Error;

/// Errors that end the processing of a single cleanup config.
///
/// None of these abort an invocation: the runner records the error against the config and moves
/// on to the next one in the group.
#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("connection profile {profile} is not configured")]
    UnknownProfile { profile: String },
    #[error("connection using profile {profile} failed with: {error}")]
    ConnectionError { profile: String, error: sqlx::Error },
    #[error("{command} statement failed with: {error}")]
    StatementError { command: String, error: sqlx::Error },
    #[error("deletion aborted after {rows_deleted} rows in {batches} batches: {error}")]
    PartialBatchFailure {
        rows_deleted: u64,
        batches: u64,
        error: Box<CleanupError>,
    },
    #[error("binary log not restored after deleting {rows_deleted} rows in {batches} batches: {error}")]
    ReplicationRestoreFailure {
        rows_deleted: u64,
        batches: u64,
        error: Box<CleanupError>,
    },
    #[error("cleanup config {config_id} is invalid: {reason}")]
    InvalidConfig { config_id: i64, reason: String },
    #[error("{command} query on config store failed with: {error}")]
    StoreError { command: String, error: sqlx::Error },
}

impl CleanupError {
    /// Rows already committed before the error, when the error happened during or after a batch
    /// loop.
    pub fn rows_deleted(&self) -> u64 {
        match self {
            CleanupError::PartialBatchFailure { rows_deleted, .. }
            | CleanupError::ReplicationRestoreFailure { rows_deleted, .. } => *rows_deleted,
            _ => 0,
        }
    }
}
