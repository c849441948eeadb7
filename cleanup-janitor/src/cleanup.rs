use chrono::Utc;
use tracing::{debug, error, info, warn};

use cleanup_common::cleanup_config::{CleanupConfig, ReplicationMode};
use cleanup_common::error::CleanupError;
use cleanup_common::session::{DeletionSession, ReplicationScope, TargetConnector};
use cleanup_common::statement::DeleteStatement;
use cleanup_common::store::ConfigStore;
use cleanup_common::template::{self, TemplateWarning};

use crate::report::{ConfigOutcome, DeletionStats, RunReport};

/// A config's resolved delete statement, ready to run.
#[derive(Debug)]
pub struct DeletionPlan {
    pub statement: DeleteStatement,
    /// Placeholders replaced in the template.
    pub substitutions: usize,
    pub warning: Option<TemplateWarning>,
}

pub fn plan_deletion(config: &CleanupConfig) -> Result<DeletionPlan, CleanupError> {
    let limits = config.validate()?;
    let resolution = template::resolve(&config.where_template, limits.retention_days);

    Ok(DeletionPlan {
        statement: DeleteStatement::new(
            &config.schema,
            &config.table,
            &resolution.predicate,
            limits.batch_size,
        ),
        substitutions: resolution.substitutions,
        warning: resolution.warning,
    })
}

/// Issue `statement` until a run removes no rows. Each statement commits on its own, so rows
/// deleted before an error stay deleted.
pub async fn delete_in_batches<D: DeletionSession + ?Sized>(
    session: &mut D,
    statement: &DeleteStatement,
) -> Result<DeletionStats, CleanupError> {
    let mut stats = DeletionStats::default();

    loop {
        let affected = match session.delete_batch(statement).await {
            Ok(affected) => affected,
            Err(error) if stats.rows_deleted > 0 => {
                return Err(CleanupError::PartialBatchFailure {
                    rows_deleted: stats.rows_deleted,
                    batches: stats.statements,
                    error: Box::new(error),
                })
            }
            Err(error) => return Err(error),
        };
        stats.statements += 1;

        if affected == 0 {
            break;
        }

        stats.rows_deleted += affected;
        debug!(
            batch = stats.statements,
            affected,
            total = stats.rows_deleted,
            "deleted batch"
        );
    }

    Ok(stats)
}

/// Run the batch loop inside a [`ReplicationScope`], restoring the binary log whatever the loop
/// returned. A loop error takes precedence over a restore error.
async fn delete_with_replication_mode<D: DeletionSession + ?Sized>(
    session: &mut D,
    replication: ReplicationMode,
    statement: &DeleteStatement,
) -> Result<DeletionStats, CleanupError> {
    let mut scope = ReplicationScope::enter(session, replication).await?;
    debug!(suppressed = scope.is_suppressed(), "entered replication scope");
    let deleted = delete_in_batches(scope.session(), statement).await;
    let restored = scope.exit().await;

    let stats = deleted?;
    restored.map_err(|error| CleanupError::ReplicationRestoreFailure {
        rows_deleted: stats.rows_deleted,
        batches: stats.statements,
        error: Box::new(error),
    })?;
    Ok(stats)
}

pub struct Cleaner<S, C> {
    store: S,
    connector: C,
    dry_run: bool,
}

impl<S: ConfigStore, C: TargetConnector> Cleaner<S, C> {
    pub fn new(store: S, connector: C, dry_run: bool) -> Self {
        Cleaner {
            store,
            connector,
            dry_run,
        }
    }

    /// Process every active config of `group_id` (or of all groups) in order.
    ///
    /// Only failing to read the configs is an error: a failing config is recorded in the report
    /// and the remaining configs still run.
    pub async fn run(&self, group_id: Option<i64>) -> Result<RunReport, CleanupError> {
        if self.dry_run {
            info!("DRY RUN: no rows will be deleted");
        }

        let configs = self.store.active_configs(group_id).await?;
        let mut report = RunReport::new(group_id, self.dry_run);

        if configs.is_empty() {
            info!(?group_id, "no active cleanup configs found");
            return Ok(report);
        }
        info!(?group_id, count = configs.len(), "found cleanup configs");

        let total = configs.len();
        for (index, config) in configs.iter().enumerate() {
            info!(
                config_id = config.config_id,
                table = %config.qualified_table(),
                "[{}/{}] processing cleanup config",
                index + 1,
                total
            );
            report.outcomes.push(self.process(config).await);
        }

        Ok(report)
    }

    async fn process(&self, config: &CleanupConfig) -> ConfigOutcome {
        let mut outcome = ConfigOutcome::new(config);

        let plan = match plan_deletion(config) {
            Ok(plan) => plan,
            Err(e) => {
                error!(config_id = config.config_id, error = %e, "cleanup config failed");
                return outcome.failed(&e);
            }
        };

        if let Some(warning) = plan.warning {
            warn!(
                config_id = config.config_id,
                template = %config.where_template,
                "{}",
                warning
            );
            outcome.warnings.push(warning.to_string());
        }

        info!(
            config_id = config.config_id,
            retention_days = config.retention_days,
            batch_size = config.batch_size,
            replication = ?config.replication,
            substitutions = plan.substitutions,
            statement = %plan.statement,
            "resolved delete statement"
        );

        if self.dry_run {
            info!(config_id = config.config_id, "DRY RUN: skipping deletion");
            return outcome.dry_run();
        }

        let stats = match self.execute(config, &plan.statement).await {
            Ok(stats) => stats,
            Err(e) => {
                error!(
                    config_id = config.config_id,
                    rows_deleted = e.rows_deleted(),
                    error = %e,
                    "cleanup config failed"
                );
                return outcome.failed(&e);
            }
        };

        info!(
            config_id = config.config_id,
            rows_deleted = stats.rows_deleted,
            statements = stats.statements,
            "cleanup config succeeded"
        );

        if let Err(e) = self.store.record_success(config.config_id, Utc::now()).await {
            warn!(config_id = config.config_id, error = %e, "failed to record last_run_at");
            outcome
                .warnings
                .push(format!("last_run_at not updated: {}", e));
        }

        outcome.succeeded(stats)
    }

    async fn execute(
        &self,
        config: &CleanupConfig,
        statement: &DeleteStatement,
    ) -> Result<DeletionStats, CleanupError> {
        let mut session = self.connector.connect(&config.connection_profile).await?;

        let result =
            delete_with_replication_mode(session.as_mut(), config.replication, statement).await;

        if let Err(e) = session.close().await {
            warn!(config_id = config.config_id, error = %e, "failed to close session");
        }

        result
    }
}
