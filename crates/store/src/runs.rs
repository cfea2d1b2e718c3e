use crate::error::{Result, StoreError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Declared provenance for one source file, supplied at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRegistration {
    pub source_system: String,
    pub query_name: String,
    pub query_text: Option<String>,
    /// Declared coverage window, already normalized to RFC3339-Z.
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub executed_at: Option<String>,
    /// Re-register a file whose content hash is already present.
    pub allow_duplicate_file: bool,
}

/// One ingested (or pending) source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRun {
    pub run_id: String,
    pub case_id: String,
    pub source_system: String,
    pub query_name: String,
    pub query_text: Option<String>,
    pub executed_at: Option<String>,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    /// Raw copy location, relative to the case directory.
    pub raw_path: String,
    pub row_count: Option<i64>,
    pub file_hash: String,
    pub ingested_at: Option<String>,
}

impl QueryRun {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.ingested_at.is_none()
    }
}

/// SHA-256 of a file's content, streamed, hex-encoded.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1024 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// A prior run for this case with the same content hash, if any.
pub(crate) fn find_run_by_file_hash(
    conn: &Connection,
    case_id: &str,
    file_hash: &str,
) -> Result<Option<(String, String)>> {
    let row = conn
        .query_row(
            "SELECT run_id, query_name FROM query_runs
             WHERE case_id = ?1 AND file_hash = ?2",
            params![case_id, file_hash],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn insert_run(conn: &Connection, run: &QueryRun) -> Result<()> {
    conn.execute(
        "INSERT INTO query_runs (
            run_id, case_id, source_system, query_name, query_text,
            executed_at, time_start, time_end, raw_path, row_count,
            file_hash, ingested_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10, NULL)",
        params![
            run.run_id,
            run.case_id,
            run.source_system,
            run.query_name,
            run.query_text,
            run.executed_at,
            run.time_start,
            run.time_end,
            run.raw_path,
            run.file_hash,
        ],
    )?;
    Ok(())
}

/// Stamp a run as committed. Runs inside the ingestion transaction so a
/// rollback leaves the run pending and retryable.
pub fn mark_run_ingested(
    conn: &Connection,
    run_id: &str,
    row_count: i64,
    ingested_at: &str,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE query_runs SET row_count = ?2, ingested_at = ?3 WHERE run_id = ?1",
        params![run_id, row_count, ingested_at],
    )?;
    if updated == 0 {
        return Err(StoreError::RunNotFound(run_id.to_string()));
    }
    Ok(())
}

pub(crate) fn run_from_row(row: &Row<'_>) -> rusqlite::Result<QueryRun> {
    Ok(QueryRun {
        run_id: row.get("run_id")?,
        case_id: row.get("case_id")?,
        source_system: row.get("source_system")?,
        query_name: row.get("query_name")?,
        query_text: row.get("query_text")?,
        executed_at: row.get("executed_at")?,
        time_start: row.get("time_start")?,
        time_end: row.get("time_end")?,
        raw_path: row.get("raw_path")?,
        row_count: row.get("row_count")?,
        file_hash: row.get("file_hash")?,
        ingested_at: row.get("ingested_at")?,
    })
}
