use crate::error::Result;
use rusqlite::Connection;

pub const SCHEMA_VERSION: u32 = 1;

/// Case-store DDL.
///
/// Dedup rests on the two uniqueness constraints: the native triple
/// `(case_id, source_system, source_event_id)` and the content key
/// `(case_id, fingerprint)`. Rows carry NULL in whichever key they do
/// not use, so the constraints never cross.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cases (
    case_id    TEXT PRIMARY KEY,
    title      TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS query_runs (
    run_id        TEXT PRIMARY KEY,
    case_id       TEXT NOT NULL REFERENCES cases(case_id),
    source_system TEXT NOT NULL,
    query_name    TEXT NOT NULL,
    query_text    TEXT,
    executed_at   TEXT,
    time_start    TEXT,
    time_end      TEXT,
    raw_path      TEXT NOT NULL,
    row_count     INTEGER,
    file_hash     TEXT NOT NULL,
    ingested_at   TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_case ON query_runs(case_id);
CREATE INDEX IF NOT EXISTS idx_runs_case_hash ON query_runs(case_id, file_hash);

CREATE TABLE IF NOT EXISTS events (
    event_pk            INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id             TEXT NOT NULL REFERENCES cases(case_id),
    run_id              TEXT NOT NULL REFERENCES query_runs(run_id),
    event_ts            TEXT NOT NULL,
    source_system       TEXT NOT NULL,
    source_name         TEXT,
    event_type          TEXT NOT NULL,
    host                TEXT,
    user                TEXT,
    src_ip              TEXT,
    dest_ip             TEXT,
    src_port            INTEGER,
    dest_port           INTEGER,
    protocol            TEXT,
    process_name        TEXT,
    process_cmdline     TEXT,
    process_id          INTEGER,
    parent_pid          INTEGER,
    parent_process_name TEXT,
    file_hash           TEXT,
    file_path           TEXT,
    file_name           TEXT,
    url                 TEXT,
    dns_query           TEXT,
    http_method         TEXT,
    http_status         INTEGER,
    bytes_in            INTEGER,
    bytes_out           INTEGER,
    outcome             TEXT,
    severity            TEXT,
    message             TEXT,
    logon_type          TEXT,
    session_id          TEXT,
    tactic              TEXT,
    technique           TEXT,
    event_id            TEXT,
    source_event_id     TEXT,
    raw_ref             TEXT NOT NULL,
    raw_json            TEXT NOT NULL,
    extras_json         TEXT,
    fingerprint         TEXT,
    UNIQUE(case_id, source_system, source_event_id),
    UNIQUE(case_id, fingerprint)
);

CREATE INDEX IF NOT EXISTS idx_events_case_ts ON events(case_id, event_ts);
CREATE INDEX IF NOT EXISTS idx_events_case_host ON events(case_id, host);
CREATE INDEX IF NOT EXISTS idx_events_case_user ON events(case_id, user);
CREATE INDEX IF NOT EXISTS idx_events_case_src_ip ON events(case_id, src_ip);
CREATE INDEX IF NOT EXISTS idx_events_case_dest_ip ON events(case_id, dest_ip);
CREATE INDEX IF NOT EXISTS idx_events_case_type ON events(case_id, event_type);
CREATE INDEX IF NOT EXISTS idx_events_case_source ON events(case_id, source_system);
CREATE INDEX IF NOT EXISTS idx_events_run ON events(run_id);

CREATE TABLE IF NOT EXISTS entities (
    entity_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id      TEXT NOT NULL REFERENCES cases(case_id),
    entity_type  TEXT NOT NULL,
    entity_value TEXT NOT NULL,
    first_seen   TEXT NOT NULL,
    last_seen    TEXT NOT NULL,
    notes        TEXT,
    tags         TEXT,
    UNIQUE(case_id, entity_type, entity_value)
);

CREATE INDEX IF NOT EXISTS idx_entities_case_type ON entities(case_id, entity_type);

CREATE TABLE IF NOT EXISTS event_entities (
    event_pk  INTEGER NOT NULL REFERENCES events(event_pk),
    entity_id INTEGER NOT NULL REFERENCES entities(entity_id),
    PRIMARY KEY (event_pk, entity_id)
);

CREATE INDEX IF NOT EXISTS idx_event_entities_entity ON event_entities(entity_id);

CREATE TABLE IF NOT EXISTS event_fields (
    event_pk    INTEGER NOT NULL REFERENCES events(event_pk),
    field_name  TEXT NOT NULL,
    field_value TEXT,
    PRIMARY KEY (event_pk, field_name)
);
"#;

/// Create or update the case schema. Idempotent.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
