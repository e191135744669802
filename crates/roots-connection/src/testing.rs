//! Scriptable connection and factory doubles shared by the unit tests

use crate::health::PROBE_QUERY;
use crate::reconnect::ConnectionFactory;
use async_trait::async_trait;
use parking_lot::Mutex;
use roots_core::{
    ColumnMeta, Connection, QueryResult, Result, RootsError, Row, StatementResult, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

pub(crate) struct MockConnection {
    driver: &'static str,
    pub queries: AtomicU32,
    pub executes: AtomicU32,
    pub closes: AtomicU32,
    closed: AtomicBool,
    broken: AtomicBool,
    fail_statements: AtomicBool,
    fail_close: AtomicBool,
    query_delay: Mutex<Option<Duration>>,
    statement_delay: Mutex<Option<Duration>>,
    rows: Mutex<Vec<Vec<Value>>>,
    pub seen: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockConnection {
    fn new(driver: &'static str) -> Self {
        Self {
            driver,
            queries: AtomicU32::new(0),
            executes: AtomicU32::new(0),
            closes: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            broken: AtomicBool::new(false),
            fail_statements: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            query_delay: Mutex::new(None),
            statement_delay: Mutex::new(None),
            rows: Mutex::new(vec![vec![Value::Int64(1)]]),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every subsequent query or statement fails as if the socket died
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    /// Probes keep answering but every other statement errors
    pub fn set_fail_statements(&self, fail: bool) {
        self.fail_statements.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Delay every query, probes included
    pub fn set_query_delay(&self, delay: Duration) {
        *self.query_delay.lock() = Some(delay);
    }

    /// Delay everything except probes
    pub fn set_statement_delay(&self, delay: Duration) {
        *self.statement_delay.lock() = Some(delay);
    }

    pub fn set_rows(&self, rows: Vec<Vec<Value>>) {
        *self.rows.lock() = rows;
    }

    pub fn queries(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn executes(&self) -> u32 {
        self.executes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    async fn check(&self, is_probe: bool) -> Result<()> {
        let delay = match *self.query_delay.lock() {
            Some(delay) => Some(delay),
            None if !is_probe => *self.statement_delay.lock(),
            None => None,
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.closed.load(Ordering::SeqCst) {
            return Err(RootsError::Connection("connection is closed".into()));
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(RootsError::Connection("connection reset by peer".into()));
        }
        if !is_probe && self.fail_statements.load(Ordering::SeqCst) {
            return Err(RootsError::Query("SQL compilation error".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        self.driver
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push((sql.to_string(), params.to_vec()));
        self.check(false).await?;
        Ok(StatementResult { affected_rows: 1 })
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push((sql.to_string(), params.to_vec()));
        self.check(sql == PROBE_QUERY && params.is_empty()).await?;

        let rows: Vec<Row> = self
            .rows
            .lock()
            .iter()
            .map(|values| {
                let columns = (0..values.len()).map(|i| format!("c{i}")).collect();
                Row::new(columns, values.clone())
            })
            .collect();
        let width = rows.first().map(|r| r.values.len()).unwrap_or(0);
        Ok(QueryResult {
            columns: (0..width)
                .map(|i| ColumnMeta::new(format!("c{i}"), "NUMBER", i))
                .collect(),
            rows,
            ..QueryResult::empty()
        })
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(RootsError::Connection("close handshake failed".into()));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Factory that records every connection it hands out
pub(crate) struct MockFactory {
    driver: &'static str,
    creates: AtomicU32,
    /// Number of upcoming `create` calls that fail; `u32::MAX` fails forever
    failures_left: AtomicU32,
    create_delay: Mutex<Option<Duration>>,
    new_connections_broken: AtomicBool,
    new_statement_delay: Mutex<Option<Duration>>,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Self::with_driver("mock")
    }

    pub fn with_driver(driver: &'static str) -> Arc<Self> {
        Arc::new(Self {
            driver,
            creates: AtomicU32::new(0),
            failures_left: AtomicU32::new(0),
            create_delay: Mutex::new(None),
            new_connections_broken: AtomicBool::new(false),
            new_statement_delay: Mutex::new(None),
            connections: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn fail_always(&self) {
        self.failures_left.store(u32::MAX, Ordering::SeqCst);
    }

    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock() = Some(delay);
    }

    /// Connections created from now on reject every query and statement
    pub fn break_new_connections(&self) {
        self.new_connections_broken.store(true, Ordering::SeqCst);
    }

    /// Connections created from now on stall on every non-probe statement
    pub fn slow_new_statements(&self, delay: Duration) {
        *self.new_statement_delay.lock() = Some(delay);
    }

    pub fn creates(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.connections.lock()[index].clone()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    fn driver_name(&self) -> &str {
        self.driver
    }

    async fn create(&self) -> Result<Arc<dyn Connection>> {
        let attempt = self.creates.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.create_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            if left != u32::MAX {
                self.failures_left.store(left - 1, Ordering::SeqCst);
            }
            return Err(RootsError::Connection(format!(
                "warehouse unreachable (attempt {attempt})"
            )));
        }

        let mut connections = self.connections.lock();
        let conn = Arc::new(MockConnection::new(self.driver));
        if self.new_connections_broken.load(Ordering::SeqCst) {
            conn.set_broken(true);
        }
        if let Some(delay) = *self.new_statement_delay.lock() {
            conn.set_statement_delay(delay);
        }
        connections.push(conn.clone());
        Ok(conn)
    }
}
