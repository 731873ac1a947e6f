use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{ConnectOptions, Executor, Row};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use super::{
    DelayInfo, InstanceConnector, InstanceSession, MasterStatus, RouteInfo, SlaveStatus,
    TdbctlNode,
};
use crate::config::MysqlConfig;
use crate::constants::{sql, tdbctl, DEFAULT_DATABASE};
use crate::errors::GmError;

/// Opens sqlx MySQL connections with the monitoring account
#[derive(Debug, Clone)]
pub struct MysqlConnector {
    user: String,
    password: String,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl MysqlConnector {
    pub fn new(config: &MysqlConfig) -> Self {
        Self {
            user: config.user.clone(),
            password: config.password.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_seconds),
            query_timeout: Duration::from_secs(config.query_timeout_seconds),
        }
    }
}

#[async_trait]
impl InstanceConnector for MysqlConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn InstanceSession>, GmError> {
        let target = format!("{}:{}", host, port);
        let options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(&self.user)
            .password(&self.password)
            .database(DEFAULT_DATABASE);

        let conn = match timeout(self.connect_timeout, options.connect()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(GmError::connectivity(&target, e)),
            Err(_) => {
                return Err(GmError::connectivity(
                    &target,
                    format!("timed out after {:?}", self.connect_timeout),
                ))
            }
        };

        debug!("connected to {}", target);
        Ok(Box::new(MysqlSession {
            target,
            conn,
            query_timeout: self.query_timeout,
        }))
    }
}

/// Statements without bind arguments go over the text protocol, which is the
/// only one control nodes and replication commands accept. Every column is
/// therefore read as text and parsed here.
pub struct MysqlSession {
    target: String,
    conn: MySqlConnection,
    query_timeout: Duration,
}

async fn bounded<T, F>(
    target: &str,
    limit: Duration,
    statement: &str,
    fut: F,
) -> Result<T, GmError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(GmError::query(target, statement, e)),
        // the statement may still be running on the server
        Err(_) => Err(GmError::query(
            target,
            statement,
            format!("timed out after {:?}", limit),
        )),
    }
}

fn text(row: &MySqlRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row
        .try_get_unchecked::<Option<String>, _>(column)?
        .unwrap_or_default())
}

/// Empty for columns some server versions do not return
fn optional_text(row: &MySqlRow, column: &str) -> String {
    text(row, column).unwrap_or_default()
}

fn number<T>(row: &MySqlRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    let raw = text(row, column)?;
    if raw.is_empty() {
        return Ok(T::default());
    }
    raw.trim().parse::<T>().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("[{}] is not a number: {}", raw, e).into(),
    })
}

impl MysqlSession {
    async fn fetch(&mut self, statement: &str) -> Result<Vec<MySqlRow>, GmError> {
        bounded(
            &self.target,
            self.query_timeout,
            statement,
            (&mut self.conn).fetch_all(statement),
        )
        .await
    }

    fn decode<T>(&self, statement: &str, result: Result<T, sqlx::Error>) -> Result<T, GmError> {
        result.map_err(|e| GmError::query(&self.target, statement, e))
    }
}

#[async_trait]
impl InstanceSession for MysqlSession {
    fn target(&self) -> &str {
        &self.target
    }

    async fn execute(&mut self, statement: &str) -> Result<u64, GmError> {
        let result = bounded(
            &self.target,
            self.query_timeout,
            statement,
            (&mut self.conn).execute(statement),
        )
        .await?;
        Ok(result.rows_affected())
    }

    async fn slave_status(&mut self) -> Result<SlaveStatus, GmError> {
        let rows = self.fetch(sql::SHOW_SLAVE_STATUS).await?;
        let row = rows.first().ok_or_else(|| {
            GmError::query(&self.target, sql::SHOW_SLAVE_STATUS, "instance is not a slave")
        })?;

        let status = (|| -> Result<SlaveStatus, sqlx::Error> {
            Ok(SlaveStatus {
                master_host: text(row, "Master_Host")?,
                master_port: number(row, "Master_Port")?,
                master_log_file: text(row, "Master_Log_File")?,
                read_master_log_pos: number(row, "Read_Master_Log_Pos")?,
                relay_master_log_file: text(row, "Relay_Master_Log_File")?,
                exec_master_log_pos: number(row, "Exec_Master_Log_Pos")?,
                slave_io_running: text(row, "Slave_IO_Running")?,
                slave_sql_running: text(row, "Slave_SQL_Running")?,
                master_server_id: number(row, "Master_Server_Id")?,
            })
        })();
        self.decode(sql::SHOW_SLAVE_STATUS, status)
    }

    async fn master_status(&mut self) -> Result<MasterStatus, GmError> {
        let rows = self.fetch(sql::SHOW_MASTER_STATUS).await?;
        let row = rows.first().ok_or_else(|| {
            GmError::query(&self.target, sql::SHOW_MASTER_STATUS, "binary log is disabled")
        })?;

        let status = (|| -> Result<MasterStatus, sqlx::Error> {
            Ok(MasterStatus {
                file: text(row, "File")?,
                position: number(row, "Position")?,
            })
        })();
        self.decode(sql::SHOW_MASTER_STATUS, status)
    }

    async fn max_binlog_size(&mut self) -> Result<u64, GmError> {
        let rows = self.fetch(sql::MAX_BINLOG_SIZE).await?;
        let row = rows.first().ok_or_else(|| {
            GmError::query(&self.target, sql::MAX_BINLOG_SIZE, "variable not found")
        })?;
        let size = number::<u64>(row, "Value");
        self.decode(sql::MAX_BINLOG_SIZE, size)
    }

    async fn databases(&mut self) -> Result<Vec<String>, GmError> {
        let rows = self.fetch(sql::SHOW_DATABASES).await?;
        let names = rows
            .iter()
            .map(|row| {
                row.try_get_unchecked::<Option<String>, _>(0)
                    .map(|name| name.unwrap_or_default())
            })
            .collect::<Result<Vec<_>, _>>();
        self.decode(sql::SHOW_DATABASES, names)
    }

    async fn count(&mut self, statement: &str) -> Result<i64, GmError> {
        let rows = self.fetch(statement).await?;
        let Some(row) = rows.first() else {
            return Ok(0);
        };
        let raw = self.decode(statement, row.try_get_unchecked::<Option<String>, _>(0))?;
        match raw {
            None => Ok(0),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|e| GmError::query(&self.target, statement, e)),
        }
    }

    async fn delay_info(&mut self, master_server_id: u64) -> Result<DelayInfo, GmError> {
        let statement = format!("{}{}", sql::DELAY_BY_MASTER_ID, master_server_id);
        let rows = self.fetch(&statement).await?;
        let row = rows.first().ok_or_else(|| {
            GmError::query(
                &self.target,
                &statement,
                format!("no heartbeat row for master server id {}", master_server_id),
            )
        })?;

        let delay = (|| -> Result<DelayInfo, sqlx::Error> {
            Ok(DelayInfo {
                slave_delay: number(row, "slave_delay")?,
                time_delay: number(row, "time_delay")?,
            })
        })();
        self.decode(&statement, delay)
    }

    async fn tdbctl_nodes(&mut self) -> Result<Vec<TdbctlNode>, GmError> {
        let rows = self.fetch(tdbctl::GET_NODES).await?;
        let nodes = rows
            .iter()
            .map(|row| {
                Ok(TdbctlNode {
                    server_name: text(row, "SERVER_NAME")?,
                    host: text(row, "HOST")?,
                    port: number(row, "PORT")?,
                    replication_master: text(row, "REPLICATION_MASTER")?,
                    cluster_role: text(row, "CLUSTER_ROLE")?,
                    status: text(row, "STATUS")?,
                    message: optional_text(row, "MESSAGE"),
                    replication_info: optional_text(row, "REPLICATION_INFO"),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>();
        self.decode(tdbctl::GET_NODES, nodes)
    }

    async fn route_table(&mut self) -> Result<Vec<RouteInfo>, GmError> {
        let rows = self.fetch(tdbctl::GET_ROUTE).await?;
        let routes = rows
            .iter()
            .map(|row| {
                Ok(RouteInfo {
                    server_name: text(row, "Server_name")?,
                    host: text(row, "Host")?,
                    username: text(row, "Username")?,
                    password: text(row, "Password")?,
                    port: number(row, "Port")?,
                    wrapper: text(row, "Wrapper")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>();
        self.decode(tdbctl::GET_ROUTE, routes)
    }
}
