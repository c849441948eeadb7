use serde_derive::Serialize;
use tracing::info;

use cleanup_common::cleanup_config::CleanupConfig;
use cleanup_common::error::CleanupError;

/// Counters for one config's batch loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeletionStats {
    pub rows_deleted: u64,
    /// Delete statements issued, including the final one that removed nothing.
    pub statements: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    DryRun,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConfigOutcome {
    pub config_id: i64,
    pub group_id: i64,
    pub table: String,
    pub status: OutcomeStatus,
    pub rows_deleted: u64,
    pub statements: u64,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl ConfigOutcome {
    pub fn new(config: &CleanupConfig) -> Self {
        Self {
            config_id: config.config_id,
            group_id: config.group_id,
            table: config.qualified_table(),
            status: OutcomeStatus::Failed,
            rows_deleted: 0,
            statements: 0,
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn succeeded(mut self, stats: DeletionStats) -> Self {
        self.status = OutcomeStatus::Succeeded;
        self.rows_deleted = stats.rows_deleted;
        self.statements = stats.statements;
        self
    }

    pub fn failed(mut self, error: &CleanupError) -> Self {
        self.status = OutcomeStatus::Failed;
        self.rows_deleted = error.rows_deleted();
        self.error = Some(error.to_string());
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.status = OutcomeStatus::DryRun;
        self
    }
}

/// Per-config results of one invocation. There is no overall verdict beyond the counts.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub group_id: Option<i64>,
    pub dry_run: bool,
    pub outcomes: Vec<ConfigOutcome>,
}

impl RunReport {
    pub fn new(group_id: Option<i64>, dry_run: bool) -> Self {
        Self {
            group_id,
            dry_run,
            outcomes: Vec::new(),
        }
    }

    fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(OutcomeStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(OutcomeStatus::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Rows removed across every config, partial failures included.
    pub fn rows_deleted(&self) -> u64 {
        self.outcomes.iter().map(|o| o.rows_deleted).sum()
    }

    pub fn log_summary(&self) {
        info!(
            group_id = ?self.group_id,
            total = self.outcomes.len(),
            succeeded = self.succeeded(),
            failed = self.failed(),
            rows_deleted = self.rows_deleted(),
            dry_run = self.dry_run,
            "cleanup run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use cleanup_common::cleanup_config::ReplicationMode;

    use super::*;

    fn config(config_id: i64) -> CleanupConfig {
        CleanupConfig {
            config_id,
            connection_profile: "main".to_owned(),
            schema: "sales".to_owned(),
            table: format!("t{}", config_id),
            where_template: "created < NOW() - INTERVAL RETENSION DAY".to_owned(),
            retention_days: 30,
            cleanup_group: "daily".to_owned(),
            group_id: 7,
            active: true,
            replication: ReplicationMode::Replicated,
            batch_size: 100,
        }
    }

    #[test]
    fn test_counts_and_rows() {
        let mut report = RunReport::new(Some(7), false);
        report.outcomes.push(ConfigOutcome::new(&config(1)).succeeded(DeletionStats {
            rows_deleted: 250,
            statements: 4,
        }));
        report.outcomes.push(ConfigOutcome::new(&config(2)).failed(
            &CleanupError::PartialBatchFailure {
                rows_deleted: 100,
                batches: 1,
                error: Box::new(CleanupError::StatementError {
                    command: "DELETE".to_owned(),
                    error: sqlx::Error::Protocol("lock wait timeout".to_owned()),
                }),
            },
        ));

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.has_failures());
        assert_eq!(report.rows_deleted(), 350);
    }

    #[test]
    fn test_serializes_per_config_status() {
        let mut report = RunReport::new(None, true);
        report.outcomes.push(ConfigOutcome::new(&config(1)).dry_run());

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["group_id"], serde_json::Value::Null);
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["outcomes"][0]["status"], "dry_run");
        assert_eq!(json["outcomes"][0]["table"], "sales.t1");
        assert!(!report.has_failures());
    }
}
