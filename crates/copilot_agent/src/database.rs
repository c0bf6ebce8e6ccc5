//! Database boundary: schema inspection and statement execution.
//!
//! `SqliteDatabase` implements both traits over one SQLite file. Every
//! statement gets its own read-only connection and a progress handler
//! that interrupts it once the statement timeout has passed.

use copilot_shared::{CellValue, ExecutionError, SqlRows};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Statements that would change the database
static WRITE_KEYWORDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(insert|update|delete|drop|alter|create|truncate|attach|detach|pragma|vacuum)\b")
        .expect("valid regex")
});

/// Schema lookup failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("cannot open database {path}: {message}")]
    Open { path: String, message: String },

    #[error("schema query failed: {0}")]
    Query(String),
}

/// One column as reported by `PRAGMA table_info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub primary_key: bool,
}

/// One table and its columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    /// `"Name"(\n  Col TYPE PRIMARY KEY,\n  ...\n)`
    pub fn render(&self) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let pk = if c.primary_key { " PRIMARY KEY" } else { "" };
                format!("  {} {}{}", c.name, c.decl_type, pk)
            })
            .collect();
        format!("\"{}\"(\n{}\n)", self.name, cols.join(",\n"))
    }
}

/// Table and column metadata
pub trait SchemaInspector {
    fn tables(&self) -> Result<Vec<TableSchema>, SchemaError>;

    /// Schema text for generator prompts
    fn render_schema(&self) -> Result<String, SchemaError> {
        Ok(self
            .tables()?
            .iter()
            .map(TableSchema::render)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    fn table_names(&self) -> Result<Vec<String>, SchemaError> {
        Ok(self.tables()?.into_iter().map(|t| t.name).collect())
    }
}

/// Runs one SQL statement
pub trait SqlExecutor {
    fn run(&self, sql: &str) -> Result<SqlRows, ExecutionError>;
}

/// Reject statements that are not plain reads
pub fn check_read_only(sql: &str) -> Result<(), ExecutionError> {
    let head = sql.trim_start().to_uppercase();
    if !(head.starts_with("SELECT") || head.starts_with("WITH")) {
        return Err(ExecutionError::new("only SELECT queries are allowed", sql));
    }
    if let Some(m) = WRITE_KEYWORDS_RE.find(sql) {
        return Err(ExecutionError::new(
            format!("keyword {} not allowed", m.as_str().to_uppercase()),
            sql,
        ));
    }
    Ok(())
}

/// SQLite file adapter
#[derive(Debug)]
pub struct SqliteDatabase {
    path: PathBuf,
    timeout: Duration,
    schema: OnceCell<Vec<TableSchema>>,
}

impl SqliteDatabase {
    pub fn new(path: impl Into<PathBuf>, statement_timeout_ms: u64) -> Self {
        Self {
            path: path.into(),
            timeout: Duration::from_millis(statement_timeout_ms.max(1)),
            schema: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// Connection check for `doctor`
    pub fn ping(&self) -> bool {
        self.open()
            .and_then(|c| c.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)))
            .map(|v| v == 1)
            .unwrap_or(false)
    }

    fn load_tables(&self) -> Result<Vec<TableSchema>, SchemaError> {
        let conn = self.open().map_err(|e| SchemaError::Open {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        let query = |e: rusqlite::Error| SchemaError::Query(e.to_string());

        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .map_err(query)?;
        let names: Vec<String> = stmt
            .query_map([], |r| r.get(0))
            .map_err(query)?
            .collect::<Result<_, _>>()
            .map_err(query)?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let mut info = conn
                .prepare(&format!("PRAGMA table_info(\"{}\")", name.replace('"', "\"\"")))
                .map_err(query)?;
            let columns = info
                .query_map([], |r| {
                    Ok(ColumnInfo {
                        name: r.get(1)?,
                        decl_type: r.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        primary_key: r.get::<_, i64>(5)? > 0,
                    })
                })
                .map_err(query)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query)?;
            tables.push(TableSchema { name, columns });
        }
        info!("Loaded schema: {} tables from {}", tables.len(), self.path.display());
        Ok(tables)
    }

    fn execute(&self, sql: &str) -> rusqlite::Result<SqlRows> {
        let conn = self.open()?;
        let started = Instant::now();
        let limit = self.timeout;
        // Returning true aborts the running statement
        conn.progress_handler(1_000, Some(move || started.elapsed() > limit));

        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(match row.get::<_, Value>(i)? {
                    Value::Null => CellValue::Null,
                    Value::Integer(v) => CellValue::Integer(v),
                    Value::Real(v) => CellValue::Real(v),
                    Value::Text(v) => CellValue::Text(v),
                    Value::Blob(b) => CellValue::Text(format!("<blob {} bytes>", b.len())),
                });
            }
            rows.push(cells);
        }
        Ok(SqlRows::new(columns, rows))
    }
}

impl SchemaInspector for SqliteDatabase {
    /// Cached after the first successful load
    fn tables(&self) -> Result<Vec<TableSchema>, SchemaError> {
        self.schema
            .get_or_try_init(|| self.load_tables())
            .map(|t| t.clone())
    }
}

impl SqlExecutor for SqliteDatabase {
    fn run(&self, sql: &str) -> Result<SqlRows, ExecutionError> {
        check_read_only(sql)?;
        let started = Instant::now();
        match self.execute(sql) {
            Ok(rows) => {
                debug!("SQL ok: {} rows in {:?}", rows.row_count(), started.elapsed());
                Ok(rows)
            }
            Err(e) => {
                let message = match &e {
                    rusqlite::Error::SqliteFailure(err, _)
                        if err.code == rusqlite::ErrorCode::OperationInterrupted =>
                    {
                        format!("statement interrupted after {} ms", self.timeout.as_millis())
                    }
                    rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.clone(),
                    other => other.to_string(),
                };
                debug!("SQL failed: {}", message);
                Err(ExecutionError::new(message, sql))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, SqliteDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE Products (ProductID INTEGER PRIMARY KEY, ProductName TEXT, UnitPrice REAL);
            CREATE TABLE "Order Details" (OrderID INTEGER, ProductID INTEGER, Quantity INTEGER);
            INSERT INTO Products VALUES (1, 'Chai', 18.0), (2, 'Chang', 19.0);
            INSERT INTO "Order Details" VALUES (10, 1, 5), (10, 2, 3);
            "#,
        )
        .unwrap();
        let db = SqliteDatabase::new(&path, 2_000);
        (dir, db)
    }

    #[test]
    fn test_schema_rendering() {
        let (_dir, db) = fixture();
        let names = db.table_names().unwrap();
        assert_eq!(names, vec!["Order Details".to_string(), "Products".to_string()]);

        let schema = db.render_schema().unwrap();
        assert!(schema.contains("\"Products\"(\n  ProductID INTEGER PRIMARY KEY,\n  ProductName TEXT"));
        assert!(schema.contains("\"Order Details\"("));
    }

    #[test]
    fn test_run_returns_typed_rows() {
        let (_dir, db) = fixture();
        let rows = db
            .run("SELECT ProductName, UnitPrice, NULL AS Missing FROM Products ORDER BY ProductID")
            .unwrap();
        assert_eq!(rows.columns, vec!["ProductName", "UnitPrice", "Missing"]);
        assert_eq!(rows.row_count(), 2);
        assert_eq!(rows.rows[0][0], CellValue::Text("Chai".into()));
        assert_eq!(rows.rows[0][1], CellValue::Real(18.0));
        assert!(rows.rows[0][2].is_null());
    }

    #[test]
    fn test_error_is_structured() {
        let (_dir, db) = fixture();
        let err = db.run("SELECT * FROM Ordrs").unwrap_err();
        assert!(err.message.contains("no such table"));
        assert_eq!(err.sql, "SELECT * FROM Ordrs");
    }

    #[test]
    fn test_writes_rejected() {
        let (_dir, db) = fixture();
        assert!(db.run("DELETE FROM Products").is_err());
        let err = db.run("SELECT 1; DROP TABLE Products").unwrap_err();
        assert!(err.message.contains("DROP"));
        assert_eq!(db.run("SELECT COUNT(*) FROM Products").unwrap().row_count(), 1);
    }

    #[test]
    fn test_ping() {
        let (_dir, db) = fixture();
        assert!(db.ping());
        let missing = SqliteDatabase::new("/nonexistent/none.sqlite", 100);
        assert!(!missing.ping());
        assert!(matches!(missing.tables(), Err(SchemaError::Open { .. })));
    }

    #[test]
    fn test_check_read_only() {
        assert!(check_read_only("WITH t AS (SELECT 1) SELECT * FROM t").is_ok());
        assert!(check_read_only("  select 1").is_ok());
        assert!(check_read_only("PRAGMA table_info(x)").is_err());
        // Column names containing a keyword as a substring are fine
        assert!(check_read_only("SELECT LastUpdated, CreatedAt FROM t").is_ok());
    }
}
