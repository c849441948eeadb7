use serde_derive::Serialize;

use crate::error::CleanupError;

/// Whether delete statements issued for a config are written to the binary log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationMode {
    /// Deletes are logged and propagate to replicas.
    Replicated,
    /// Deletes run with `sql_log_bin` disabled for the session.
    Suppressed,
}

impl ReplicationMode {
    /// Map the `binlog_on_off` column: `0` disables the binary log, anything else keeps it.
    pub fn from_binlog_flag(binlog_on_off: i64) -> Self {
        if binlog_on_off == 0 {
            ReplicationMode::Suppressed
        } else {
            ReplicationMode::Replicated
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, ReplicationMode::Suppressed)
    }
}

/// One row of `c_sup_cleanup_config`: the cleanup policy for a single table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleanupConfig {
    pub config_id: i64,
    /// Name of the connection profile used to reach the target database.
    pub connection_profile: String,
    pub schema: String,
    pub table: String,
    /// Predicate with zero or more `RETENSION` placeholders.
    pub where_template: String,
    pub retention_days: i64,
    pub cleanup_group: String,
    pub group_id: i64,
    pub active: bool,
    pub replication: ReplicationMode,
    /// Upper bound on rows removed by a single delete statement.
    pub batch_size: i64,
}

/// The numeric settings of a config once they have been checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidatedLimits {
    pub retention_days: u32,
    pub batch_size: u64,
}

impl CleanupConfig {
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Check the numeric columns the database schema cannot constrain on its own.
    pub fn validate(&self) -> Result<ValidatedLimits, CleanupError> {
        let retention_days =
            u32::try_from(self.retention_days).map_err(|_| CleanupError::InvalidConfig {
                config_id: self.config_id,
                reason: format!(
                    "retension_days must be a non-negative 32-bit integer, got {}",
                    self.retention_days
                ),
            })?;

        if self.batch_size <= 0 {
            return Err(CleanupError::InvalidConfig {
                config_id: self.config_id,
                reason: format!("delete_limit must be positive, got {}", self.batch_size),
            });
        }

        Ok(ValidatedLimits {
            retention_days,
            batch_size: self.batch_size as u64,
        })
    }
}
