use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;
use tracing::debug;

use crate::cleanup_config::{CleanupConfig, ReplicationMode};
use crate::error::CleanupError;
use crate::statement::quote_identifier;

pub const DEFAULT_CONFIG_TABLE: &str = "c_sup_cleanup_config";

/// Where cleanup configs are read from and where successful runs are recorded.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Active configs of `group_id` ordered by `config_id`, or of every group ordered by
    /// `group_id, config_id` when no group is given.
    async fn active_configs(&self, group_id: Option<i64>)
        -> Result<Vec<CleanupConfig>, CleanupError>;

    /// Set `last_run_at` for a config whose deletion loop completed.
    async fn record_success(&self, config_id: i64, at: DateTime<Utc>) -> Result<(), CleanupError>;
}

/// A [`ConfigStore`] backed by the `c_sup_cleanup_config` table.
#[derive(Clone)]
pub struct MySqlConfigStore {
    pool: MySqlPool,
    table: String,
}

impl MySqlConfigStore {
    pub async fn connect(url: &str, table: &str) -> Result<Self, CleanupError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|error| CleanupError::StoreError {
                command: "CONNECT".to_owned(),
                error,
            })?;

        Ok(Self::from_pool(pool, table))
    }

    /// `table` may be qualified with a database name, as in `ops.c_sup_cleanup_config`.
    pub fn from_pool(pool: MySqlPool, table: &str) -> Self {
        let table = table
            .split('.')
            .map(quote_identifier)
            .collect::<Vec<_>>()
            .join(".");

        Self { pool, table }
    }

    fn select_sql(&self, group_id: Option<i64>) -> String {
        let (filter, order) = match group_id {
            Some(_) => ("group_id = ? AND ", "config_id"),
            None => ("", "group_id, config_id"),
        };

        // Integer columns are cast so decoding does not depend on their signedness or width.
        format!(
            r#"
SELECT
    CAST(config_id AS SIGNED) AS config_id,
    login_path,
    db_schema,
    table_name,
    where_condition,
    CAST(retension_days AS SIGNED) AS retension_days,
    cleanup_group,
    CAST(group_id AS SIGNED) AS group_id,
    CAST(status AS SIGNED) AS status,
    CAST(binlog_on_off AS SIGNED) AS binlog_on_off,
    CAST(delete_limit AS SIGNED) AS delete_limit
FROM {}
WHERE {}status = 1 AND login_path IS NOT NULL
ORDER BY {}
            "#,
            self.table, filter, order
        )
    }
}

fn config_from_row(row: &MySqlRow) -> Result<CleanupConfig, sqlx::Error> {
    Ok(CleanupConfig {
        config_id: row.try_get("config_id")?,
        connection_profile: row.try_get("login_path")?,
        schema: row.try_get("db_schema")?,
        table: row.try_get("table_name")?,
        where_template: row.try_get("where_condition")?,
        retention_days: row.try_get("retension_days")?,
        cleanup_group: row.try_get("cleanup_group")?,
        group_id: row.try_get("group_id")?,
        active: row.try_get::<i64, _>("status")? != 0,
        replication: ReplicationMode::from_binlog_flag(row.try_get("binlog_on_off")?),
        batch_size: row.try_get("delete_limit")?,
    })
}

#[async_trait]
impl ConfigStore for MySqlConfigStore {
    async fn active_configs(
        &self,
        group_id: Option<i64>,
    ) -> Result<Vec<CleanupConfig>, CleanupError> {
        let sql = self.select_sql(group_id);
        debug!(?group_id, "fetching cleanup configs");

        let mut query = sqlx::query(&sql);
        if let Some(group_id) = group_id {
            query = query.bind(group_id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|error| CleanupError::StoreError {
                command: "SELECT".to_owned(),
                error,
            })?;

        rows.iter()
            .map(config_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| CleanupError::StoreError {
                command: "SELECT".to_owned(),
                error,
            })
    }

    async fn record_success(&self, config_id: i64, at: DateTime<Utc>) -> Result<(), CleanupError> {
        let sql = format!(
            "UPDATE {} SET last_run_at = ? WHERE config_id = ?",
            self.table
        );

        sqlx::query(&sql)
            .bind(at)
            .bind(config_id)
            .execute(&self.pool)
            .await
            .map_err(|error| CleanupError::StoreError {
                command: "UPDATE".to_owned(),
                error,
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_store(table: &str) -> MySqlConfigStore {
        let pool = MySqlPoolOptions::new()
            .connect_lazy("mysql://cleanup@localhost:3306/ops")
            .expect("failed to build lazy pool");

        MySqlConfigStore::from_pool(pool, table)
    }

    #[tokio::test]
    async fn test_select_for_group() {
        let store = lazy_store(DEFAULT_CONFIG_TABLE);

        let sql = store.select_sql(Some(1));

        assert!(sql.contains("FROM `c_sup_cleanup_config`"));
        assert!(sql.contains("WHERE group_id = ? AND status = 1 AND login_path IS NOT NULL"));
        assert!(sql.trim_end().ends_with("ORDER BY config_id"));
    }

    #[tokio::test]
    async fn test_select_for_all_groups() {
        let store = lazy_store("ops.c_sup_cleanup_config");

        let sql = store.select_sql(None);

        assert!(sql.contains("FROM `ops`.`c_sup_cleanup_config`"));
        assert!(sql.contains("WHERE status = 1 AND login_path IS NOT NULL"));
        assert!(!sql.contains("group_id = ?"));
        assert!(sql.trim_end().ends_with("ORDER BY group_id, config_id"));
    }
}
