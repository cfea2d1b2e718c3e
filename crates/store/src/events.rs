use crate::error::Result;
use casetrail_mapper::UnifiedField;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A typed value bound for a unified column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnifiedValue {
    Text(String),
    Integer(i64),
}

/// One canonical event ready for insertion: the fixed unified columns,
/// the sparse extras bag, and the verbatim raw payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub case_id: String,
    pub run_id: String,
    pub event_ts: String,
    pub source_system: String,
    pub source_name: Option<String>,
    pub event_type: String,
    pub host: Option<String>,
    pub user: Option<String>,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub src_port: Option<i64>,
    pub dest_port: Option<i64>,
    pub protocol: Option<String>,
    pub process_name: Option<String>,
    pub process_cmdline: Option<String>,
    pub process_id: Option<i64>,
    pub parent_pid: Option<i64>,
    pub parent_process_name: Option<String>,
    pub file_hash: Option<String>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub url: Option<String>,
    pub dns_query: Option<String>,
    pub http_method: Option<String>,
    pub http_status: Option<i64>,
    pub bytes_in: Option<i64>,
    pub bytes_out: Option<i64>,
    pub outcome: Option<String>,
    pub severity: Option<String>,
    pub message: Option<String>,
    pub logon_type: Option<String>,
    pub session_id: Option<String>,
    pub tactic: Option<String>,
    pub technique: Option<String>,
    pub event_id: Option<String>,
    pub source_event_id: Option<String>,
    /// `"<raw_path>#L<line>"` provenance pointer.
    pub raw_ref: String,
    /// Compact re-serialization of the full parsed source row.
    pub raw_json: String,
    /// Source fields with no unified counterpart, key-sorted.
    pub extras: BTreeMap<String, String>,
    /// Content identity; `None` when a native source ID is present.
    pub fingerprint: Option<String>,
}

impl EventRecord {
    /// Bind a unified column by enum. The normalizer converts values to
    /// the column kind before calling; an integer arriving for a text
    /// column is stringified, unparsed text for an integer column is
    /// not bound.
    pub fn set_value(&mut self, field: UnifiedField, value: UnifiedValue) {
        match (field, value) {
            (UnifiedField::EventTs, UnifiedValue::Text(v)) => self.event_ts = v,
            (UnifiedField::EventType, UnifiedValue::Text(v)) => self.event_type = v,
            (UnifiedField::Host, UnifiedValue::Text(v)) => self.host = Some(v),
            (UnifiedField::User, UnifiedValue::Text(v)) => self.user = Some(v),
            (UnifiedField::SrcIp, UnifiedValue::Text(v)) => self.src_ip = Some(v),
            (UnifiedField::DestIp, UnifiedValue::Text(v)) => self.dest_ip = Some(v),
            (UnifiedField::SrcPort, UnifiedValue::Integer(v)) => self.src_port = Some(v),
            (UnifiedField::DestPort, UnifiedValue::Integer(v)) => self.dest_port = Some(v),
            (UnifiedField::Protocol, UnifiedValue::Text(v)) => self.protocol = Some(v),
            (UnifiedField::ProcessName, UnifiedValue::Text(v)) => self.process_name = Some(v),
            (UnifiedField::ProcessCmdline, UnifiedValue::Text(v)) => {
                self.process_cmdline = Some(v)
            }
            (UnifiedField::ProcessId, UnifiedValue::Integer(v)) => self.process_id = Some(v),
            (UnifiedField::ParentPid, UnifiedValue::Integer(v)) => self.parent_pid = Some(v),
            (UnifiedField::ParentProcessName, UnifiedValue::Text(v)) => {
                self.parent_process_name = Some(v)
            }
            (UnifiedField::FileHash, UnifiedValue::Text(v)) => self.file_hash = Some(v),
            (UnifiedField::FilePath, UnifiedValue::Text(v)) => self.file_path = Some(v),
            (UnifiedField::FileName, UnifiedValue::Text(v)) => self.file_name = Some(v),
            (UnifiedField::Url, UnifiedValue::Text(v)) => self.url = Some(v),
            (UnifiedField::DnsQuery, UnifiedValue::Text(v)) => self.dns_query = Some(v),
            (UnifiedField::HttpMethod, UnifiedValue::Text(v)) => self.http_method = Some(v),
            (UnifiedField::HttpStatus, UnifiedValue::Integer(v)) => self.http_status = Some(v),
            (UnifiedField::BytesIn, UnifiedValue::Integer(v)) => self.bytes_in = Some(v),
            (UnifiedField::BytesOut, UnifiedValue::Integer(v)) => self.bytes_out = Some(v),
            (UnifiedField::Outcome, UnifiedValue::Text(v)) => self.outcome = Some(v),
            (UnifiedField::Severity, UnifiedValue::Text(v)) => self.severity = Some(v),
            (UnifiedField::Message, UnifiedValue::Text(v)) => self.message = Some(v),
            (UnifiedField::LogonType, UnifiedValue::Text(v)) => self.logon_type = Some(v),
            (UnifiedField::SessionId, UnifiedValue::Text(v)) => self.session_id = Some(v),
            (UnifiedField::Tactic, UnifiedValue::Text(v)) => self.tactic = Some(v),
            (UnifiedField::Technique, UnifiedValue::Text(v)) => self.technique = Some(v),
            (UnifiedField::EventId, UnifiedValue::Text(v)) => self.event_id = Some(v),
            (UnifiedField::SourceName, UnifiedValue::Text(v)) => self.source_name = Some(v),
            (UnifiedField::SourceEventId, UnifiedValue::Text(v)) => {
                self.source_event_id = Some(v)
            }
            (field, UnifiedValue::Integer(v)) => {
                self.set_value(field, UnifiedValue::Text(v.to_string()));
            }
            (_, UnifiedValue::Text(_)) => {}
        }
    }

    /// Whether a unified column already holds a value. Drives the
    /// first-entry-wins resolution when two source columns map to the
    /// same target.
    #[must_use]
    pub fn has_value(&self, field: UnifiedField) -> bool {
        match field {
            UnifiedField::EventTs => !self.event_ts.is_empty(),
            UnifiedField::EventType => !self.event_type.is_empty(),
            UnifiedField::Host => self.host.is_some(),
            UnifiedField::User => self.user.is_some(),
            UnifiedField::SrcIp => self.src_ip.is_some(),
            UnifiedField::DestIp => self.dest_ip.is_some(),
            UnifiedField::SrcPort => self.src_port.is_some(),
            UnifiedField::DestPort => self.dest_port.is_some(),
            UnifiedField::Protocol => self.protocol.is_some(),
            UnifiedField::ProcessName => self.process_name.is_some(),
            UnifiedField::ProcessCmdline => self.process_cmdline.is_some(),
            UnifiedField::ProcessId => self.process_id.is_some(),
            UnifiedField::ParentPid => self.parent_pid.is_some(),
            UnifiedField::ParentProcessName => self.parent_process_name.is_some(),
            UnifiedField::FileHash => self.file_hash.is_some(),
            UnifiedField::FilePath => self.file_path.is_some(),
            UnifiedField::FileName => self.file_name.is_some(),
            UnifiedField::Url => self.url.is_some(),
            UnifiedField::DnsQuery => self.dns_query.is_some(),
            UnifiedField::HttpMethod => self.http_method.is_some(),
            UnifiedField::HttpStatus => self.http_status.is_some(),
            UnifiedField::BytesIn => self.bytes_in.is_some(),
            UnifiedField::BytesOut => self.bytes_out.is_some(),
            UnifiedField::Outcome => self.outcome.is_some(),
            UnifiedField::Severity => self.severity.is_some(),
            UnifiedField::Message => self.message.is_some(),
            UnifiedField::LogonType => self.logon_type.is_some(),
            UnifiedField::SessionId => self.session_id.is_some(),
            UnifiedField::Tactic => self.tactic.is_some(),
            UnifiedField::Technique => self.technique.is_some(),
            UnifiedField::EventId => self.event_id.is_some(),
            UnifiedField::SourceName => self.source_name.is_some(),
            UnifiedField::SourceEventId => self.source_event_id.is_some(),
        }
    }

    /// Text view of a unified column, used by the fingerprint subset.
    #[must_use]
    pub fn field_text(&self, field: UnifiedField) -> Option<&str> {
        match field {
            UnifiedField::EventTs => Some(self.event_ts.as_str()),
            UnifiedField::EventType => Some(self.event_type.as_str()),
            UnifiedField::Host => self.host.as_deref(),
            UnifiedField::User => self.user.as_deref(),
            UnifiedField::SrcIp => self.src_ip.as_deref(),
            UnifiedField::DestIp => self.dest_ip.as_deref(),
            UnifiedField::Protocol => self.protocol.as_deref(),
            UnifiedField::ProcessName => self.process_name.as_deref(),
            UnifiedField::ProcessCmdline => self.process_cmdline.as_deref(),
            UnifiedField::ParentProcessName => self.parent_process_name.as_deref(),
            UnifiedField::FileHash => self.file_hash.as_deref(),
            UnifiedField::FilePath => self.file_path.as_deref(),
            UnifiedField::FileName => self.file_name.as_deref(),
            UnifiedField::Url => self.url.as_deref(),
            UnifiedField::DnsQuery => self.dns_query.as_deref(),
            UnifiedField::HttpMethod => self.http_method.as_deref(),
            UnifiedField::Outcome => self.outcome.as_deref(),
            UnifiedField::Severity => self.severity.as_deref(),
            UnifiedField::Message => self.message.as_deref(),
            UnifiedField::LogonType => self.logon_type.as_deref(),
            UnifiedField::SessionId => self.session_id.as_deref(),
            UnifiedField::Tactic => self.tactic.as_deref(),
            UnifiedField::Technique => self.technique.as_deref(),
            UnifiedField::EventId => self.event_id.as_deref(),
            UnifiedField::SourceName => self.source_name.as_deref(),
            UnifiedField::SourceEventId => self.source_event_id.as_deref(),
            UnifiedField::SrcPort
            | UnifiedField::DestPort
            | UnifiedField::ProcessId
            | UnifiedField::ParentPid
            | UnifiedField::HttpStatus
            | UnifiedField::BytesIn
            | UnifiedField::BytesOut => None,
        }
    }
}

/// A committed event row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_pk: i64,
    #[serde(flatten)]
    pub record: EventRecord,
}

/// Insert an event, or resolve the row it duplicates.
///
/// Returns `(event_pk, was_duplicate)`: a conflict on either uniqueness
/// constraint is the duplicate branch, never an error. Any other
/// constraint failure propagates as a schema write error.
pub fn insert_or_get_event(conn: &Connection, event: &EventRecord) -> Result<(i64, bool)> {
    let extras_json = if event.extras.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&event.extras).unwrap_or_default())
    };

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO events (
            case_id, run_id, event_ts, source_system, source_name, event_type,
            host, user, src_ip, dest_ip, src_port, dest_port, protocol,
            process_name, process_cmdline, process_id, parent_pid, parent_process_name,
            file_hash, file_path, file_name, url, dns_query, http_method, http_status,
            bytes_in, bytes_out, outcome, severity, message, logon_type, session_id,
            tactic, technique, event_id, source_event_id, raw_ref, raw_json,
            extras_json, fingerprint
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
            ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28,
            ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38, ?39, ?40
        )",
        params![
            event.case_id,
            event.run_id,
            event.event_ts,
            event.source_system,
            event.source_name,
            event.event_type,
            event.host,
            event.user,
            event.src_ip,
            event.dest_ip,
            event.src_port,
            event.dest_port,
            event.protocol,
            event.process_name,
            event.process_cmdline,
            event.process_id,
            event.parent_pid,
            event.parent_process_name,
            event.file_hash,
            event.file_path,
            event.file_name,
            event.url,
            event.dns_query,
            event.http_method,
            event.http_status,
            event.bytes_in,
            event.bytes_out,
            event.outcome,
            event.severity,
            event.message,
            event.logon_type,
            event.session_id,
            event.tactic,
            event.technique,
            event.event_id,
            event.source_event_id,
            event.raw_ref,
            event.raw_json,
            extras_json,
            event.fingerprint,
        ],
    )?;

    if inserted > 0 {
        return Ok((conn.last_insert_rowid(), false));
    }

    // Conflict: resolve the surviving row through whichever dedup key
    // this record carries.
    let pk: i64 = if let Some(source_event_id) = &event.source_event_id {
        conn.query_row(
            "SELECT event_pk FROM events
             WHERE case_id = ?1 AND source_system = ?2 AND source_event_id = ?3",
            params![event.case_id, event.source_system, source_event_id],
            |row| row.get(0),
        )?
    } else {
        conn.query_row(
            "SELECT event_pk FROM events WHERE case_id = ?1 AND fingerprint = ?2",
            params![event.case_id, event.fingerprint],
            |row| row.get(0),
        )?
    };

    Ok((pk, true))
}

/// Store the extras bag as sparse `event_fields` rows. Called only for
/// freshly inserted events.
pub fn insert_event_fields(
    conn: &Connection,
    event_pk: i64,
    extras: &BTreeMap<String, String>,
) -> Result<()> {
    if extras.is_empty() {
        return Ok(());
    }
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO event_fields (event_pk, field_name, field_value)
         VALUES (?1, ?2, ?3)",
    )?;
    for (name, value) in extras {
        stmt.execute(params![event_pk, name, value])?;
    }
    Ok(())
}

pub(crate) fn event_from_row(row: &Row<'_>) -> rusqlite::Result<StoredEvent> {
    let extras_json: Option<String> = row.get("extras_json")?;
    let extras = extras_json
        .as_deref()
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default();

    Ok(StoredEvent {
        event_pk: row.get("event_pk")?,
        record: EventRecord {
            case_id: row.get("case_id")?,
            run_id: row.get("run_id")?,
            event_ts: row.get("event_ts")?,
            source_system: row.get("source_system")?,
            source_name: row.get("source_name")?,
            event_type: row.get("event_type")?,
            host: row.get("host")?,
            user: row.get("user")?,
            src_ip: row.get("src_ip")?,
            dest_ip: row.get("dest_ip")?,
            src_port: row.get("src_port")?,
            dest_port: row.get("dest_port")?,
            protocol: row.get("protocol")?,
            process_name: row.get("process_name")?,
            process_cmdline: row.get("process_cmdline")?,
            process_id: row.get("process_id")?,
            parent_pid: row.get("parent_pid")?,
            parent_process_name: row.get("parent_process_name")?,
            file_hash: row.get("file_hash")?,
            file_path: row.get("file_path")?,
            file_name: row.get("file_name")?,
            url: row.get("url")?,
            dns_query: row.get("dns_query")?,
            http_method: row.get("http_method")?,
            http_status: row.get("http_status")?,
            bytes_in: row.get("bytes_in")?,
            bytes_out: row.get("bytes_out")?,
            outcome: row.get("outcome")?,
            severity: row.get("severity")?,
            message: row.get("message")?,
            logon_type: row.get("logon_type")?,
            session_id: row.get("session_id")?,
            tactic: row.get("tactic")?,
            technique: row.get("technique")?,
            event_id: row.get("event_id")?,
            source_event_id: row.get("source_event_id")?,
            raw_ref: row.get("raw_ref")?,
            raw_json: row.get("raw_json")?,
            extras,
            fingerprint: row.get("fingerprint")?,
        },
    })
}
