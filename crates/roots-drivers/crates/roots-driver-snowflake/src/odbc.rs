//! Snowflake session over ODBC
//!
//! An ODBC connection handle is not `Send`, so each session owns a
//! dedicated thread that opens the connection and runs every call on it.
//! Callers hand work to that thread over a channel and await the reply.
//! Parameters are bound as text and every result cell is fetched as text;
//! the warehouse performs the type coercion.

use async_trait::async_trait;
use odbc_api::{ConnectionOptions, Cursor, Environment, IntoParameter, ResultSetMetadata};
use parking_lot::Mutex;
use roots_core::{
    ColumnMeta, Connection, QueryResult, Result, RootsError, Row, StatementResult, Value,
};
use std::sync::OnceLock;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::oneshot;

use crate::SnowflakeOptions;

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

fn environment() -> Result<&'static Environment> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new().map_err(|e| {
        RootsError::Driver(format!("Failed to initialise ODBC environment: {}", e))
    })?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

type Job = Box<dyn FnOnce(&odbc_api::Connection<'static>) + Send>;

/// A live Snowflake session
pub struct OdbcConnection {
    /// `None` once closed; dropping the sender stops the session thread
    jobs: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl OdbcConnection {
    /// Open a session and run the bootstrap statements. Blocks until the
    /// session thread has connected or failed.
    pub fn open(options: &SnowflakeOptions) -> Result<Self> {
        tracing::info!(
            connection = %options.redacted_connection_string(),
            "opening Snowflake ODBC session"
        );
        let env = environment()?;
        let connection_string = options.connection_string();
        let session_statements = options.session_statements();

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();

        let worker = std::thread::Builder::new()
            .name("snowflake-odbc".into())
            .spawn(move || {
                let conn = match connect(env, &connection_string, &session_statements) {
                    Ok(conn) => conn,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                for job in jobs_rx {
                    job(&conn);
                }
                // dropping the connection disconnects it
                drop(conn);
                tracing::info!("Snowflake session closed");
            })
            .map_err(|e| RootsError::Connection(format!("Failed to start ODBC session thread: {}", e)))?;

        ready_rx.recv().map_err(|_| {
            RootsError::Connection("ODBC session thread exited before connecting".into())
        })??;

        Ok(Self {
            jobs: Mutex::new(Some(jobs_tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    async fn with_session<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&odbc_api::Connection<'static>) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            let _ = reply_tx.send(work(conn));
        });

        {
            let jobs = self.jobs.lock();
            let sender = jobs
                .as_ref()
                .ok_or_else(|| RootsError::Connection("Snowflake session is closed".into()))?;
            sender
                .send(job)
                .map_err(|_| RootsError::Connection("Snowflake session thread has stopped".into()))?;
        }

        reply_rx
            .await
            .map_err(|_| RootsError::Connection("Snowflake session thread dropped the request".into()))?
    }
}

fn connect(
    env: &'static Environment,
    connection_string: &str,
    session_statements: &[String],
) -> Result<odbc_api::Connection<'static>> {
    let conn = env
        .connect_with_connection_string(connection_string, ConnectionOptions::default())
        .map_err(|e| RootsError::Connection(format!("Failed to connect to Snowflake: {}", e)))?;

    for statement in session_statements {
        tracing::debug!(statement = %statement, "applying session setting");
        conn.execute(statement, (), None).map_err(|e| {
            RootsError::Connection(format!("Session setup '{}' failed: {}", statement, e))
        })?;
    }
    Ok(conn)
}

#[async_trait]
impl Connection for OdbcConnection {
    fn driver_name(&self) -> &str {
        "snowflake"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let sql = sql.to_string();
        let params = bind_texts(params);
        self.with_session(move |conn| {
            let bound: Vec<_> = params.iter().map(|p| p.as_deref().into_parameter()).collect();
            let mut prepared = conn.preallocate().map_err(odbc_error)?;
            let _ = prepared.execute(&sql, bound.as_slice()).map_err(odbc_error)?;
            let affected_rows = prepared.row_count().map_err(odbc_error)?.unwrap_or(0) as u64;
            tracing::debug!(affected_rows, "statement executed");
            Ok(StatementResult { affected_rows })
        })
        .await
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let sql = sql.to_string();
        let params = bind_texts(params);
        self.with_session(move |conn| fetch_all(conn, &sql, &params)).await
    }

    async fn close(&self) -> Result<()> {
        // queued work still runs before the thread exits
        drop(self.jobs.lock().take());
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || worker.join())
            .await
            .map_err(|e| RootsError::Connection(format!("ODBC worker failed: {}", e)))?
            .map_err(|_| RootsError::Connection("Snowflake session thread panicked".into()))
    }

    fn is_closed(&self) -> bool {
        self.jobs.lock().is_none()
    }
}

fn fetch_all(
    conn: &odbc_api::Connection<'static>,
    sql: &str,
    params: &[Option<String>],
) -> Result<QueryResult> {
    let start_time = Instant::now();
    let bound: Vec<_> = params.iter().map(|p| p.as_deref().into_parameter()).collect();

    let Some(mut cursor) = conn.execute(sql, bound.as_slice(), None).map_err(odbc_error)? else {
        return Ok(QueryResult::empty());
    };

    let column_count = cursor.num_result_cols().map_err(odbc_error)?.max(0) as u16;
    let mut columns = Vec::with_capacity(column_count as usize);
    for number in 1..=column_count {
        let name = cursor.col_name(number).map_err(odbc_error)?;
        let data_type = cursor
            .col_data_type(number)
            .map(|dt| format!("{:?}", dt))
            .unwrap_or_else(|_| "UNKNOWN".to_string());
        columns.push(ColumnMeta::new(name, data_type, number as usize - 1));
    }
    let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let mut rows = Vec::new();
    let mut buffer = Vec::new();
    while let Some(mut row) = cursor.next_row().map_err(odbc_error)? {
        let mut values = Vec::with_capacity(column_names.len());
        for number in 1..=column_count {
            buffer.clear();
            let present = row.get_text(number, &mut buffer).map_err(odbc_error)?;
            values.push(if present {
                Value::String(String::from_utf8_lossy(&buffer).into_owned())
            } else {
                Value::Null
            });
        }
        rows.push(Row::new(column_names.clone(), values));
    }

    let execution_time_ms = start_time.elapsed().as_millis() as u64;
    tracing::debug!(row_count = rows.len(), execution_time_ms, "query executed successfully");
    Ok(QueryResult {
        id: uuid::Uuid::new_v4(),
        columns,
        rows,
        affected_rows: 0,
        execution_time_ms,
    })
}

fn bind_texts(params: &[Value]) -> Vec<Option<String>> {
    params.iter().map(Value::to_bind_text).collect()
}

fn odbc_error(err: odbc_api::Error) -> RootsError {
    RootsError::Query(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_options() -> SnowflakeOptions {
        SnowflakeOptions {
            account: "xy12345.ap-south-1".into(),
            user: "DASHBOARD".into(),
            password: "secret".into(),
            database: "ROOTS_ROUTES".into(),
            schema: "PUBLIC".into(),
            warehouse: "COMPUTE_WH".into(),
            role: None,
            odbc_driver: "Roots Missing ODBC Driver".into(),
            login_timeout_secs: 1,
            statement_timeout_secs: 1,
        }
    }

    #[test]
    fn test_open_without_installed_driver_fails() {
        let err = OdbcConnection::open(&unreachable_options())
            .err()
            .expect("no such ODBC driver");
        assert!(
            matches!(err, RootsError::Connection(_) | RootsError::Driver(_)),
            "unexpected error: {err}"
        );
    }
}
