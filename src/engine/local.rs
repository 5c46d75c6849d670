//! Local query engine backed by SQLite.
//!
//! Executes each submitted query on a background task against a SQLite pool,
//! tracks its status in memory and writes the finished result as JSON under a
//! `file://` output location.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    parse_output_location, ColumnInfo, ExecutionHandle, ExecutionState, ExecutionStatus,
    QueryEngine, QueryRequest, QueryResult, Row, Value,
};
use crate::error::{QueryDeskError, Result};

/// Maximum rows kept from a single query.
const MAX_ROWS: usize = 10_000;

/// Finished executions kept for status reads before the oldest are dropped.
const MAX_RETAINED_FINISHED: usize = 256;

#[derive(Debug)]
struct LocalExecution {
    state: ExecutionState,
    result: Option<QueryResult>,
    finished_at: Option<Instant>,
}

type ExecutionTable = Arc<Mutex<HashMap<String, LocalExecution>>>;

/// SQLite-backed query engine.
///
/// An execution is released once its results have been fetched. Finished
/// executions that are never fetched are kept up to a fixed limit, oldest
/// dropped first.
#[derive(Debug, Clone)]
pub struct LocalQueryEngine {
    pool: SqlitePool,
    executions: ExecutionTable,
    retain_finished: usize,
}

impl LocalQueryEngine {
    /// Opens a SQLite database (e.g. `sqlite::memory:` or `sqlite:data.db`).
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| QueryDeskError::config(format!("Invalid database URL: {e}")))?
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        // An in-memory database lives only as long as its single connection.
        let in_memory = database_url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .acquire_timeout(Duration::from_secs(10));
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| QueryDeskError::engine(format!("Failed to open {database_url}: {e}")))?;

        info!("Local query engine opened {database_url}");
        Ok(Self::from_pool(pool))
    }

    /// Creates an engine from an existing connection pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            executions: Arc::new(Mutex::new(HashMap::new())),
            retain_finished: MAX_RETAINED_FINISHED,
        }
    }

    /// Runs a multi-statement SQL script synchronously, e.g. a seed file.
    pub async fn execute_script(&self, sql: &str) -> Result<()> {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| QueryDeskError::engine(format!("Failed to run SQL script: {e}")))?;
        Ok(())
    }

    fn output_dir(request: &QueryRequest) -> Result<PathBuf> {
        let location = parse_output_location(request.output_location())?;
        if location.scheme() != "file" {
            return Err(QueryDeskError::submission(format!(
                "local engine only writes to file:// output locations, got '{}'",
                location.scheme()
            )));
        }
        location.to_file_path().map_err(|_| {
            QueryDeskError::submission(format!(
                "output location '{}' is not a local path",
                request.output_location()
            ))
        })
    }

    fn with_execution<T>(
        &self,
        handle: &ExecutionHandle,
        f: impl FnOnce(&LocalExecution) -> Result<T>,
    ) -> Result<T> {
        let executions = self
            .executions
            .lock()
            .map_err(|_| QueryDeskError::internal("local engine state poisoned"))?;
        let execution = executions
            .get(handle.id())
            .ok_or_else(|| QueryDeskError::engine(format!("unknown execution {handle}")))?;
        f(execution)
    }

    #[cfg(test)]
    fn with_retention(mut self, limit: usize) -> Self {
        self.retain_finished = limit;
        self
    }

    #[cfg(test)]
    fn tracked_executions(&self) -> usize {
        self.executions.lock().map(|table| table.len()).unwrap_or(0)
    }
}

/// Drops the oldest finished executions beyond `limit`.
fn prune_finished(table: &mut HashMap<String, LocalExecution>, limit: usize) {
    let mut finished: Vec<(Instant, String)> = table
        .iter()
        .filter_map(|(id, execution)| execution.finished_at.map(|at| (at, id.clone())))
        .collect();
    if finished.len() <= limit {
        return;
    }

    finished.sort();
    let excess = finished.len() - limit;
    for (_, id) in finished.into_iter().take(excess) {
        table.remove(&id);
    }
    debug!("Released {excess} unfetched executions");
}

#[async_trait]
impl QueryEngine for LocalQueryEngine {
    async fn start_execution(&self, request: &QueryRequest) -> Result<ExecutionHandle> {
        let output_dir = Self::output_dir(request)?;
        let id = Uuid::new_v4().to_string();

        {
            let mut table = self
                .executions
                .lock()
                .map_err(|_| QueryDeskError::internal("local engine state poisoned"))?;
            prune_finished(&mut table, self.retain_finished);
            table.insert(
                id.clone(),
                LocalExecution {
                    state: ExecutionState::new(ExecutionStatus::Queued),
                    result: None,
                    finished_at: None,
                },
            );
        }

        tokio::spawn(run_execution(
            self.pool.clone(),
            Arc::clone(&self.executions),
            id.clone(),
            request.query_text().to_string(),
            output_dir,
        ));

        debug!("Started local execution {id}");
        Ok(ExecutionHandle::new(id))
    }

    async fn get_status(&self, handle: &ExecutionHandle) -> Result<ExecutionState> {
        self.with_execution(handle, |execution| Ok(execution.state.clone()))
    }

    /// Hands over the results and releases the execution.
    async fn get_results(&self, handle: &ExecutionHandle) -> Result<QueryResult> {
        let mut table = self
            .executions
            .lock()
            .map_err(|_| QueryDeskError::internal("local engine state poisoned"))?;
        let execution = table
            .get(handle.id())
            .ok_or_else(|| QueryDeskError::engine(format!("unknown execution {handle}")))?;
        if execution.result.is_none() {
            return Err(QueryDeskError::engine(format!(
                "execution {handle} is {}, no results available",
                execution.state.status
            )));
        }

        table
            .remove(handle.id())
            .and_then(|execution| execution.result)
            .ok_or_else(|| QueryDeskError::internal(format!("execution {handle} vanished")))
    }
}

/// Runs one execution to completion, updating the shared table as it goes.
async fn run_execution(
    pool: SqlitePool,
    executions: ExecutionTable,
    id: String,
    sql: String,
    output_dir: PathBuf,
) {
    update(&executions, &id, ExecutionState::new(ExecutionStatus::Running), None);

    let start = Instant::now();
    let outcome = match sqlx::query(&sql).fetch_all(&pool).await {
        Ok(rows) => {
            let mut result = convert_rows(&rows).with_execution_time(start.elapsed());
            if rows.is_empty() {
                result.columns = describe_columns(&pool, &sql).await;
            }
            match write_result(&output_dir, &id, &result).await {
                Ok(path) => {
                    debug!("Execution {id} wrote {}", path.display());
                    Ok(result)
                }
                Err(e) => Err(format!("failed to write results: {e}")),
            }
        }
        Err(e) => Err(format_query_error(e)),
    };

    match outcome {
        Ok(result) => update(
            &executions,
            &id,
            ExecutionState::new(ExecutionStatus::Succeeded),
            Some(result),
        ),
        Err(reason) => {
            warn!("Execution {id} failed: {reason}");
            update(
                &executions,
                &id,
                ExecutionState::new(ExecutionStatus::Failed).with_reason(reason),
                None,
            );
        }
    }
}

fn update(
    executions: &ExecutionTable,
    id: &str,
    state: ExecutionState,
    result: Option<QueryResult>,
) {
    match executions.lock() {
        Ok(mut table) => {
            if let Some(execution) = table.get_mut(id) {
                if state.status.is_terminal() {
                    execution.finished_at = Some(Instant::now());
                }
                execution.state = state;
                execution.result = result;
            }
        }
        Err(_) => warn!("Execution table poisoned; dropping update for {id}"),
    }
}

async fn write_result(dir: &Path, id: &str, result: &QueryResult) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{id}.json"));
    let body = serde_json::to_vec_pretty(result)?;
    tokio::fs::write(&path, body).await?;
    Ok(path)
}

fn convert_rows(rows: &[SqliteRow]) -> QueryResult {
    let columns: Vec<ColumnInfo> = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect()
        })
        .unwrap_or_default();

    if rows.len() > MAX_ROWS {
        warn!("Query returned {} rows, keeping {MAX_ROWS}", rows.len());
    }

    let rows: Vec<Row> = rows.iter().take(MAX_ROWS).map(convert_row).collect();
    QueryResult::with_data(columns, rows)
}

/// Reads column metadata from the prepared statement, for results without rows.
async fn describe_columns(pool: &SqlitePool, sql: &str) -> Vec<ColumnInfo> {
    match pool.prepare(sql).await {
        Ok(statement) => statement
            .columns()
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect(),
        Err(e) => {
            debug!("Could not describe statement: {e}");
            Vec::new()
        }
    }
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Converts a single cell using its runtime storage class.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "BOOLEAN" => row
            .try_get::<bool, _>(index)
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INTEGER" => row
            .try_get::<i64, _>(index)
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" => row
            .try_get::<f64, _>(index)
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .or_else(|_| row.try_get::<i64, _>(index).map(Value::Int))
            .or_else(|_| row.try_get::<f64, _>(index).map(Value::Float))
            .unwrap_or(Value::Null),
    }
}

fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn engine() -> LocalQueryEngine {
        LocalQueryEngine::connect("sqlite::memory:").await.unwrap()
    }

    fn file_location(dir: &Path) -> String {
        url::Url::from_directory_path(dir).unwrap().to_string()
    }

    async fn wait_for_terminal(engine: &LocalQueryEngine, handle: &ExecutionHandle) -> ExecutionState {
        loop {
            let state = engine.get_status(handle).await.unwrap();
            if state.status.is_terminal() {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_local_select_succeeds_and_writes_output() {
        let engine = engine().await;
        let dir = tempfile::tempdir().unwrap();

        let handle = engine
            .start_execution(&QueryRequest::new(
                "SELECT 1 AS num, 'hello' AS greeting, NULL AS nothing",
                file_location(dir.path()),
            ))
            .await
            .unwrap();

        let state = wait_for_terminal(&engine, &handle).await;
        assert_eq!(state.status, ExecutionStatus::Succeeded);

        let result = engine.get_results(&handle).await.unwrap();
        assert_eq!(result.row_count, 1);
        assert_eq!(result.columns[0].name, "num");
        assert_eq!(result.rows[0][0], Value::Int(1));
        assert_eq!(result.rows[0][1], Value::String("hello".to_string()));
        assert_eq!(result.rows[0][2], Value::Null);

        let written = dir.path().join(format!("{}.json", handle.id()));
        let contents = std::fs::read_to_string(written).unwrap();
        let parsed: QueryResult = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.rows, result.rows);
    }

    #[tokio::test]
    async fn test_local_bad_sql_fails_with_reason() {
        let engine = engine().await;
        let dir = tempfile::tempdir().unwrap();

        let handle = engine
            .start_execution(&QueryRequest::new(
                "SELECT * FROM missing_table",
                file_location(dir.path()),
            ))
            .await
            .unwrap();

        let state = wait_for_terminal(&engine, &handle).await;
        assert_eq!(state.status, ExecutionStatus::Failed);
        assert!(state.reason.unwrap().contains("missing_table"));
        assert!(engine.get_results(&handle).await.is_err());
    }

    #[tokio::test]
    async fn test_local_rejects_non_file_location() {
        let engine = engine().await;
        let err = engine
            .start_execution(&QueryRequest::new("SELECT 1", "store://bucket/prefix"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryDeskError::Submission(_)));
        assert!(err.to_string().contains("file://"));
    }

    #[tokio::test]
    async fn test_local_unknown_handle() {
        let engine = engine().await;
        let err = engine
            .get_status(&ExecutionHandle::new("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryDeskError::Engine(_)));
    }

    #[tokio::test]
    async fn test_local_state_persists_across_executions() {
        let engine = engine().await;
        let dir = tempfile::tempdir().unwrap();
        let location = file_location(dir.path());

        for sql in [
            "CREATE TABLE procedures (id INTEGER PRIMARY KEY, category TEXT, insured BOOLEAN)",
            "INSERT INTO procedures (category, insured) VALUES ('imaging', 1), ('laboratory', 0)",
        ] {
            let handle = engine
                .start_execution(&QueryRequest::new(sql, location.clone()))
                .await
                .unwrap();
            assert_eq!(
                wait_for_terminal(&engine, &handle).await.status,
                ExecutionStatus::Succeeded
            );
        }

        let handle = engine
            .start_execution(&QueryRequest::new(
                "SELECT category FROM procedures WHERE insured = 1",
                location,
            ))
            .await
            .unwrap();
        wait_for_terminal(&engine, &handle).await;
        let result = engine.get_results(&handle).await.unwrap();
        assert_eq!(result.rows, vec![vec![Value::String("imaging".to_string())]]);
    }

    #[tokio::test]
    async fn test_execute_script_seeds_tables() {
        let engine = engine().await;
        engine
            .execute_script(
                "CREATE TABLE customers (cust_id INTEGER, vip BOOLEAN);\n\
                 INSERT INTO customers VALUES (1, 1), (2, 0), (3, 1);",
            )
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let handle = engine
            .start_execution(&QueryRequest::new(
                "SELECT COUNT(*) AS vips FROM customers WHERE vip = 1",
                file_location(dir.path()),
            ))
            .await
            .unwrap();
        wait_for_terminal(&engine, &handle).await;
        let result = engine.get_results(&handle).await.unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(2)]]);
    }

    #[tokio::test]
    async fn test_execute_script_reports_errors() {
        let engine = engine().await;
        let err = engine.execute_script("CREATE TABLE (").await.unwrap_err();
        assert!(matches!(err, QueryDeskError::Engine(_)));
    }

    #[tokio::test]
    async fn test_fetched_execution_is_released() {
        let engine = engine().await;
        let dir = tempfile::tempdir().unwrap();

        let handle = engine
            .start_execution(&QueryRequest::new("SELECT 1", file_location(dir.path())))
            .await
            .unwrap();
        wait_for_terminal(&engine, &handle).await;
        assert_eq!(engine.tracked_executions(), 1);

        engine.get_results(&handle).await.unwrap();

        assert_eq!(engine.tracked_executions(), 0);
        assert!(matches!(
            engine.get_status(&handle).await.unwrap_err(),
            QueryDeskError::Engine(_)
        ));
    }

    #[tokio::test]
    async fn test_unfetched_finished_executions_are_bounded() {
        let engine = engine().await.with_retention(2);
        let dir = tempfile::tempdir().unwrap();
        let location = file_location(dir.path());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let handle = engine
                .start_execution(&QueryRequest::new("SELECT * FROM missing", location.clone()))
                .await
                .unwrap();
            assert_eq!(
                wait_for_terminal(&engine, &handle).await.status,
                ExecutionStatus::Failed
            );
            handles.push(handle);
        }
        assert_eq!(engine.tracked_executions(), 4);

        let latest = engine
            .start_execution(&QueryRequest::new("SELECT 1", location))
            .await
            .unwrap();

        assert!(engine.tracked_executions() <= 3);
        assert!(engine.get_status(&handles[0]).await.is_err());
        assert!(engine.get_status(&handles[1]).await.is_err());
        assert!(engine.get_status(&handles[3]).await.is_ok());
        assert!(engine.get_status(&latest).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_result_keeps_columns() {
        let engine = engine().await;
        engine
            .execute_script("CREATE TABLE customers (cust_id INTEGER, customer_name TEXT);")
            .await
            .unwrap();
        let dir = tempfile::tempdir().unwrap();

        let handle = engine
            .start_execution(&QueryRequest::new(
                "SELECT cust_id, customer_name FROM customers WHERE cust_id < 0",
                file_location(dir.path()),
            ))
            .await
            .unwrap();
        wait_for_terminal(&engine, &handle).await;
        let result = engine.get_results(&handle).await.unwrap();

        assert_eq!(result.row_count, 0);
        let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["cust_id", "customer_name"]);
    }
}
