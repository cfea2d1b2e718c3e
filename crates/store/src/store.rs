use crate::entities::{self, EntityKind, EntityRow};
use crate::error::{Result, StoreError};
use crate::events::{event_from_row, StoredEvent};
use crate::lock::{acquire_case_write_lock, CaseWriteLock};
use crate::paths::CaseLayout;
use crate::runs::{
    find_run_by_file_hash, hash_file, insert_run, run_from_row, QueryRun, RunRegistration,
};
use crate::schema;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Current instant as RFC3339 UTC with a literal `Z`.
#[must_use]
pub fn now_utc_z() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Per-source activity bounds for coverage reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceActivity {
    pub source_system: String,
    pub first_event: String,
    pub last_event: String,
    pub event_count: i64,
}

/// One case's relational store.
///
/// Holds a single connection; writers serialize through the case write
/// lock and one transaction per run. All methods take the case scope
/// from the store itself — there is no process-wide current case.
#[derive(Debug)]
pub struct CaseStore {
    conn: Connection,
    layout: CaseLayout,
    case_id: String,
}

impl CaseStore {
    /// Create the case workspace (directories, schema, case row) or
    /// open it if it already exists.
    pub fn create(
        cases_root: impl AsRef<Path>,
        case_id: &str,
        title: Option<&str>,
    ) -> Result<Self> {
        let layout = CaseLayout::new(cases_root, case_id);
        std::fs::create_dir_all(layout.raw_base())?;

        let conn = open_connection(&layout.db_path())?;
        schema::migrate(&conn)?;
        conn.execute(
            "INSERT OR IGNORE INTO cases (case_id, title, created_at) VALUES (?1, ?2, ?3)",
            params![case_id, title, now_utc_z()],
        )?;

        log::info!("case store ready at {}", layout.db_path().display());
        Ok(Self {
            conn,
            layout,
            case_id: case_id.to_string(),
        })
    }

    /// Open an existing case workspace.
    pub fn open(cases_root: impl AsRef<Path>, case_id: &str) -> Result<Self> {
        let layout = CaseLayout::new(cases_root, case_id);
        if !layout.db_path().exists() {
            return Err(StoreError::CaseNotFound(case_id.to_string()));
        }
        let conn = open_connection(&layout.db_path())?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn,
            layout,
            case_id: case_id.to_string(),
        })
    }

    #[must_use]
    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    #[must_use]
    pub fn layout(&self) -> &CaseLayout {
        &self.layout
    }

    /// Serialize writers for this case across processes.
    pub fn acquire_write_lock(&self) -> Result<CaseWriteLock> {
        acquire_case_write_lock(&self.layout)
    }

    /// One write transaction per ingestion run. Dropping the
    /// transaction without committing rolls back every write.
    pub fn begin_write(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    // ---- runs ----------------------------------------------------------

    /// Register a source file: hash it, guard against accidental
    /// re-registration of the same content, copy it into the
    /// append-only raw area, and record the run row.
    pub fn register_run(&self, reg: &RunRegistration, file_path: &Path) -> Result<QueryRun> {
        let file_hash = hash_file(file_path)?;
        if !reg.allow_duplicate_file {
            if let Some((run_id, query_name)) =
                find_run_by_file_hash(&self.conn, &self.case_id, &file_hash)?
            {
                return Err(StoreError::DuplicateFile { run_id, query_name });
            }
        }

        let run_id = Uuid::new_v4().to_string();
        let extension = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");
        let dest = self
            .layout
            .raw_file_path(&reg.source_system, &run_id, extension);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(file_path, &dest)?;

        let run = QueryRun {
            run_id,
            case_id: self.case_id.clone(),
            source_system: reg.source_system.clone(),
            query_name: reg.query_name.clone(),
            query_text: reg.query_text.clone(),
            executed_at: Some(reg.executed_at.clone().unwrap_or_else(now_utc_z)),
            time_start: reg.time_start.clone(),
            time_end: reg.time_end.clone(),
            raw_path: self.layout.relative_raw_path(&dest),
            row_count: None,
            file_hash,
            ingested_at: None,
        };
        insert_run(&self.conn, &run)?;

        log::info!(
            "registered run {} ({} / {})",
            run.run_id,
            run.source_system,
            run.query_name
        );
        Ok(run)
    }

    pub fn run(&self, run_id: &str) -> Result<QueryRun> {
        self.conn
            .query_row(
                "SELECT * FROM query_runs WHERE run_id = ?1 AND case_id = ?2",
                params![run_id, self.case_id],
                run_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))
    }

    /// Runs not yet ingested, in registration order.
    pub fn pending_runs(&self) -> Result<Vec<QueryRun>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM query_runs
             WHERE case_id = ?1 AND ingested_at IS NULL
             ORDER BY rowid",
        )?;
        let runs = stmt
            .query_map(params![self.case_id], run_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    // ---- events --------------------------------------------------------

    /// The stable export stream: all events ordered by `event_ts`,
    /// ties broken by insertion order.
    pub fn events_ordered(&self) -> Result<Vec<StoredEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM events WHERE case_id = ?1 ORDER BY event_ts ASC, event_pk ASC",
        )?;
        let events = stmt
            .query_map(params![self.case_id], event_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    pub fn event_count(&self) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM events WHERE case_id = ?1",
            params![self.case_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Observed event time range, `None` for an empty case.
    pub fn time_bounds(&self) -> Result<Option<(String, String)>> {
        let bounds: (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(event_ts), MAX(event_ts) FROM events WHERE case_id = ?1",
            params![self.case_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(match bounds {
            (Some(min), Some(max)) => Some((min, max)),
            _ => None,
        })
    }

    /// Event timestamps in ascending order, optionally per source.
    pub fn event_timestamps(&self, source: Option<&str>) -> Result<Vec<String>> {
        let timestamps = match source {
            Some(source) => {
                let mut stmt = self.conn.prepare(
                    "SELECT event_ts FROM events
                     WHERE case_id = ?1 AND source_system = ?2
                     ORDER BY event_ts ASC",
                )?;
                let rows = stmt.query_map(params![self.case_id, source], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT event_ts FROM events WHERE case_id = ?1 ORDER BY event_ts ASC",
                )?;
                let rows = stmt.query_map(params![self.case_id], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(timestamps)
    }

    /// Sources with any event in `[start, end)`.
    pub fn sources_active_between(&self, start: &str, end: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT source_system FROM events
             WHERE case_id = ?1 AND event_ts >= ?2 AND event_ts < ?3
             ORDER BY source_system",
        )?;
        let sources = stmt
            .query_map(params![self.case_id, start, end], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sources)
    }

    /// Per-source activity bounds and counts, ordered by first event.
    pub fn source_activity(&self) -> Result<Vec<SourceActivity>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_system, MIN(event_ts), MAX(event_ts), COUNT(*)
             FROM events WHERE case_id = ?1
             GROUP BY source_system
             ORDER BY MIN(event_ts)",
        )?;
        let rows = stmt
            .query_map(params![self.case_id], |row| {
                Ok(SourceActivity {
                    source_system: row.get(0)?,
                    first_event: row.get(1)?,
                    last_event: row.get(2)?,
                    event_count: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Sparse extension rows for one event, in field-name order.
    pub fn event_fields(&self, event_pk: i64) -> Result<Vec<(String, Option<String>)>> {
        let mut stmt = self.conn.prepare(
            "SELECT field_name, field_value FROM event_fields
             WHERE event_pk = ?1 ORDER BY field_name",
        )?;
        let fields = stmt
            .query_map(params![event_pk], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(fields)
    }

    // ---- entities ------------------------------------------------------

    pub fn entity(&self, kind: EntityKind, value: &str) -> Result<Option<EntityRow>> {
        entities::find_entity(&self.conn, &self.case_id, kind, value)
    }

    pub fn entity_by_id(&self, entity_id: i64) -> Result<Option<EntityRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT entity_id, case_id, entity_type, entity_value,
                        first_seen, last_seen, notes, tags
                 FROM entities WHERE entity_id = ?1",
                params![entity_id],
                entities::entity_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All (event, entity) link pairs over the events that contain the
    /// seed entity — the raw material of the co-occurrence graph.
    pub fn co_occurrence_links(&self, seed_entity_id: i64) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT ee.event_pk, ee.entity_id
             FROM event_entities ee
             JOIN event_entities seed ON seed.event_pk = ee.event_pk
             WHERE seed.entity_id = ?1
             ORDER BY ee.event_pk, ee.entity_id",
        )?;
        let links = stmt
            .query_map(params![seed_entity_id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    /// Case-wide distinct-event counts per entity.
    pub fn entity_event_counts(&self) -> Result<Vec<(i64, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT ee.entity_id, COUNT(DISTINCT ee.event_pk)
             FROM event_entities ee
             JOIN entities en ON en.entity_id = ee.entity_id
             WHERE en.case_id = ?1
             GROUP BY ee.entity_id
             ORDER BY ee.entity_id",
        )?;
        let counts = stmt
            .query_map(params![self.case_id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }
}

/// Open a case database with the store's standing pragmas: WAL journal
/// for concurrent readers, NORMAL sync, foreign keys, busy timeout for
/// registration contention.
fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(30))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{link_event_entity, upsert_entity};
    use crate::events::{insert_or_get_event, EventRecord};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn sample_event(store: &CaseStore, run_id: &str, ts: &str, host: &str) -> EventRecord {
        EventRecord {
            case_id: store.case_id().to_string(),
            run_id: run_id.to_string(),
            event_ts: ts.to_string(),
            source_system: "splunk".to_string(),
            event_type: "logon".to_string(),
            host: Some(host.to_string()),
            raw_ref: "raw/splunk/r1.ndjson#L1".to_string(),
            raw_json: "{}".to_string(),
            fingerprint: Some(format!("fp-{ts}-{host}")),
            ..EventRecord::default()
        }
    }

    fn register_sample_run(store: &CaseStore, dir: &Path, name: &str) -> QueryRun {
        let file = dir.join(name);
        std::fs::write(&file, b"{\"a\":1}\n").unwrap();
        store
            .register_run(
                &RunRegistration {
                    source_system: "splunk".to_string(),
                    query_name: name.to_string(),
                    query_text: None,
                    time_start: None,
                    time_end: None,
                    executed_at: None,
                    allow_duplicate_file: true,
                },
                &file,
            )
            .unwrap()
    }

    #[test]
    fn create_then_open_round_trip() {
        let temp = tempdir().unwrap();
        let store = CaseStore::create(temp.path(), "case-1", Some("Test case")).unwrap();
        assert_eq!(store.event_count().unwrap(), 0);
        drop(store);

        let reopened = CaseStore::open(temp.path(), "case-1").unwrap();
        assert_eq!(reopened.case_id(), "case-1");
    }

    #[test]
    fn open_missing_case_fails() {
        let temp = tempdir().unwrap();
        match CaseStore::open(temp.path(), "nope") {
            Err(StoreError::CaseNotFound(case_id)) => assert_eq!(case_id, "nope"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn duplicate_file_guard_blocks_reregistration() {
        let temp = tempdir().unwrap();
        let store = CaseStore::create(temp.path(), "case-1", None).unwrap();
        let file = temp.path().join("export.ndjson");
        std::fs::write(&file, b"{\"a\":1}\n").unwrap();

        let reg = RunRegistration {
            source_system: "splunk".to_string(),
            query_name: "q1".to_string(),
            query_text: None,
            time_start: None,
            time_end: None,
            executed_at: None,
            allow_duplicate_file: false,
        };
        let first = store.register_run(&reg, &file).unwrap();
        assert!(first.is_pending());

        match store.register_run(&reg, &file) {
            Err(StoreError::DuplicateFile { run_id, .. }) => {
                assert_eq!(run_id, first.run_id);
            }
            other => panic!("unexpected: {other:?}"),
        }

        // Explicit override lets the same content in again.
        let reg_override = RunRegistration {
            allow_duplicate_file: true,
            ..reg
        };
        assert!(store.register_run(&reg_override, &file).is_ok());
    }

    #[test]
    fn insert_or_get_reports_duplicates() {
        let temp = tempdir().unwrap();
        let store = CaseStore::create(temp.path(), "case-1", None).unwrap();
        let run = register_sample_run(&store, temp.path(), "a.ndjson");

        let event = sample_event(&store, &run.run_id, "2024-05-01T10:00:00Z", "ws01");
        let (pk1, dup1) = insert_or_get_event(&store.conn, &event).unwrap();
        let (pk2, dup2) = insert_or_get_event(&store.conn, &event).unwrap();
        assert!(!dup1);
        assert!(dup2);
        assert_eq!(pk1, pk2);
        assert_eq!(store.event_count().unwrap(), 1);
    }

    #[test]
    fn native_id_dedups_across_differing_payloads() {
        let temp = tempdir().unwrap();
        let store = CaseStore::create(temp.path(), "case-1", None).unwrap();
        let run = register_sample_run(&store, temp.path(), "a.ndjson");

        let mut first = sample_event(&store, &run.run_id, "2024-05-01T10:00:00Z", "ws01");
        first.source_event_id = Some("evt-1".to_string());
        first.fingerprint = None;
        let mut second = sample_event(&store, &run.run_id, "2024-05-01T11:00:00Z", "ws02");
        second.source_event_id = Some("evt-1".to_string());
        second.fingerprint = None;

        let (pk1, dup1) = insert_or_get_event(&store.conn, &first).unwrap();
        let (pk2, dup2) = insert_or_get_event(&store.conn, &second).unwrap();
        assert!(!dup1);
        assert!(dup2);
        assert_eq!(pk1, pk2);
    }

    #[test]
    fn entity_bounds_widen_in_any_order() {
        let temp = tempdir().unwrap();
        let store = CaseStore::create(temp.path(), "case-1", None).unwrap();

        let id1 = upsert_entity(
            &store.conn,
            "case-1",
            EntityKind::Host,
            "ws01",
            "2024-05-02T00:00:00Z",
        )
        .unwrap();
        // Older observation arrives later; bounds still widen.
        let id2 = upsert_entity(
            &store.conn,
            "case-1",
            EntityKind::Host,
            "ws01",
            "2024-05-01T00:00:00Z",
        )
        .unwrap();
        let id3 = upsert_entity(
            &store.conn,
            "case-1",
            EntityKind::Host,
            "ws01",
            "2024-05-03T00:00:00Z",
        )
        .unwrap();
        assert_eq!(id1, id2);
        assert_eq!(id2, id3);

        let entity = store.entity(EntityKind::Host, "ws01").unwrap().unwrap();
        assert_eq!(entity.first_seen, "2024-05-01T00:00:00Z");
        assert_eq!(entity.last_seen, "2024-05-03T00:00:00Z");
    }

    #[test]
    fn export_stream_orders_by_timestamp() {
        let temp = tempdir().unwrap();
        let mut store = CaseStore::create(temp.path(), "case-1", None).unwrap();
        let run = register_sample_run(&store, temp.path(), "a.ndjson");

        let late = sample_event(&store, &run.run_id, "2024-05-01T12:00:00Z", "ws02");
        let early = sample_event(&store, &run.run_id, "2024-05-01T08:00:00Z", "ws01");
        let tx = store.begin_write().unwrap();
        insert_or_get_event(&tx, &late).unwrap();
        insert_or_get_event(&tx, &early).unwrap();
        tx.commit().unwrap();

        let events = store.events_ordered().unwrap();
        let hosts: Vec<_> = events
            .iter()
            .filter_map(|e| e.record.host.as_deref())
            .collect();
        assert_eq!(hosts, ["ws01", "ws02"]);

        let bounds = store.time_bounds().unwrap().unwrap();
        assert_eq!(bounds.0, "2024-05-01T08:00:00Z");
        assert_eq!(bounds.1, "2024-05-01T12:00:00Z");
    }

    #[test]
    fn co_occurrence_links_cover_seed_events() {
        let temp = tempdir().unwrap();
        let mut store = CaseStore::create(temp.path(), "case-1", None).unwrap();
        let run = register_sample_run(&store, temp.path(), "a.ndjson");

        let event_a = sample_event(&store, &run.run_id, "2024-05-01T10:00:00Z", "ws01");
        let event_b = sample_event(&store, &run.run_id, "2024-05-01T11:00:00Z", "ws01");

        let tx = store.begin_write().unwrap();
        let (pk_a, _) = insert_or_get_event(&tx, &event_a).unwrap();
        let (pk_b, _) = insert_or_get_event(&tx, &event_b).unwrap();
        let host = upsert_entity(&tx, "case-1", EntityKind::Host, "ws01", "2024-05-01T10:00:00Z")
            .unwrap();
        let user = upsert_entity(&tx, "case-1", EntityKind::User, "alice", "2024-05-01T10:00:00Z")
            .unwrap();
        link_event_entity(&tx, pk_a, host).unwrap();
        link_event_entity(&tx, pk_a, user).unwrap();
        link_event_entity(&tx, pk_b, host).unwrap();
        tx.commit().unwrap();

        let links = store.co_occurrence_links(user).unwrap();
        // Only event A contains the user; both of A's links come back.
        assert_eq!(links, vec![(pk_a, host), (pk_a, user)]);
    }
}
