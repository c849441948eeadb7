//! Sessions against the databases holding the rows to delete.
//!
//! Every config gets a dedicated connection, opened for its batch loop and closed afterwards.
//! Nothing is pooled, so session variables such as `sql_log_bin` never outlive a config.
use async_trait::async_trait;
use std::str::FromStr;

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, Executor};
use tracing::{debug, error};

use crate::cleanup_config::ReplicationMode;
use crate::error::CleanupError;
use crate::profiles::ConnectionProfiles;
use crate::statement::DeleteStatement;

/// Opens deletion sessions from connection profile names.
#[async_trait]
pub trait TargetConnector: Send + Sync {
    async fn connect(&self, profile: &str) -> Result<Box<dyn DeletionSession>, CleanupError>;
}

#[async_trait]
pub trait DeletionSession: Send {
    /// Toggle binary logging for writes issued by this session.
    async fn set_replication(&mut self, enabled: bool) -> Result<(), CleanupError>;

    /// Execute one bounded delete and return the number of rows it removed.
    async fn delete_batch(&mut self, statement: &DeleteStatement) -> Result<u64, CleanupError>;

    async fn close(&mut self) -> Result<(), CleanupError>;
}

/// Binary logging suppressed for the lifetime of the scope.
///
/// [`ReplicationScope::exit`] must be awaited on every path, including after a failed batch loop,
/// to restore logging. A scope dropped while still suppressing only logs an error: the caller is
/// expected to discard the session in that case.
pub struct ReplicationScope<'s, S: DeletionSession + ?Sized> {
    session: &'s mut S,
    suppressed: bool,
}

impl<'s, S: DeletionSession + ?Sized> ReplicationScope<'s, S> {
    pub async fn enter(session: &'s mut S, mode: ReplicationMode) -> Result<Self, CleanupError> {
        if mode.is_suppressed() {
            session.set_replication(false).await?;
            debug!("binary log disabled for session");
        }

        Ok(Self {
            session,
            suppressed: mode.is_suppressed(),
        })
    }

    pub fn session(&mut self) -> &mut S {
        &mut *self.session
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub async fn exit(mut self) -> Result<(), CleanupError> {
        if self.suppressed {
            self.suppressed = false;
            self.session.set_replication(true).await?;
            debug!("binary log restored for session");
        }

        Ok(())
    }
}

impl<'s, S: DeletionSession + ?Sized> Drop for ReplicationScope<'s, S> {
    fn drop(&mut self) {
        if self.suppressed {
            error!("replication scope dropped with binary log still disabled");
        }
    }
}

/// Connects to MySQL targets using the urls of [`ConnectionProfiles`].
pub struct MySqlConnector {
    profiles: ConnectionProfiles,
}

impl MySqlConnector {
    pub fn new(profiles: ConnectionProfiles) -> Self {
        Self { profiles }
    }
}

/// Options for a target session. Predicates are written for the server's own dialect, so the
/// session keeps its `sql_mode` and `time_zone` instead of the driver's `PIPES_AS_CONCAT` and UTC.
pub fn target_options(url: &str) -> Result<MySqlConnectOptions, sqlx::Error> {
    Ok(MySqlConnectOptions::from_str(url)?
        .pipes_as_concat(false)
        .timezone(None::<String>))
}

#[async_trait]
impl TargetConnector for MySqlConnector {
    async fn connect(&self, profile: &str) -> Result<Box<dyn DeletionSession>, CleanupError> {
        let url = self.profiles.resolve(profile)?;
        let connection_error = |error| CleanupError::ConnectionError {
            profile: profile.to_owned(),
            error,
        };

        let options = target_options(url).map_err(connection_error)?;
        let connection = MySqlConnection::connect_with(&options)
            .await
            .map_err(connection_error)?;

        Ok(Box::new(MySqlSession {
            connection: Some(connection),
        }))
    }
}

pub struct MySqlSession {
    connection: Option<MySqlConnection>,
}

impl MySqlSession {
    fn connection(&mut self, command: &str) -> Result<&mut MySqlConnection, CleanupError> {
        self.connection
            .as_mut()
            .ok_or_else(|| CleanupError::StatementError {
                command: command.to_owned(),
                error: sqlx::Error::Protocol("session already closed".to_owned()),
            })
    }
}

#[async_trait]
impl DeletionSession for MySqlSession {
    async fn set_replication(&mut self, enabled: bool) -> Result<(), CleanupError> {
        let sql = if enabled {
            "SET SESSION sql_log_bin = 1"
        } else {
            "SET SESSION sql_log_bin = 0"
        };
        let connection = self.connection("SET")?;

        connection
            .execute(sql)
            .await
            .map_err(|error| CleanupError::StatementError {
                command: "SET".to_owned(),
                error,
            })?;

        Ok(())
    }

    async fn delete_batch(&mut self, statement: &DeleteStatement) -> Result<u64, CleanupError> {
        let sql = statement.sql();
        let connection = self.connection("DELETE")?;

        // Sent without arguments so it goes over the text protocol and commits on its own.
        let result =
            connection
                .execute(sql.as_str())
                .await
                .map_err(|error| CleanupError::StatementError {
                    command: "DELETE".to_owned(),
                    error,
                })?;

        Ok(result.rows_affected())
    }

    async fn close(&mut self) -> Result<(), CleanupError> {
        if let Some(connection) = self.connection.take() {
            connection
                .close()
                .await
                .map_err(|error| CleanupError::StatementError {
                    command: "QUIT".to_owned(),
                    error,
                })?;
        }

        Ok(())
    }
}
