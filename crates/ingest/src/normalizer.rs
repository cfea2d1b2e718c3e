use crate::error::{IngestError, Result};
use crate::reader::RawRow;
use crate::timestamp;
use casetrail_mapper::{FieldKind, FieldMapping, UnifiedField};
use casetrail_store::{EventRecord, UnifiedValue};
use serde_json::Value;
use std::collections::HashSet;

/// Run-scoped context threaded into every row. There is no ambient
/// current case; callers pass the scope explicitly.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub case_id: &'a str,
    pub run_id: &'a str,
    /// Raw path as stored on the run, used for `raw_ref` provenance.
    pub raw_path: &'a str,
    /// Fallback `source_system` when the row carries none.
    pub source_system: &'a str,
}

/// Convert one parsed row plus a committed mapping into a canonical
/// event: fixed unified columns, sparse extras, verbatim raw payload.
///
/// Mapping entries apply in iteration order and the first entry to fill
/// a unified column wins; shadowed source fields fall through to
/// extras. Non-scalar values never bind a unified column.
pub fn normalize_row(
    ctx: &RowContext<'_>,
    row: &RawRow,
    mapping: &FieldMapping,
) -> Result<EventRecord> {
    let mut event = EventRecord {
        case_id: ctx.case_id.to_string(),
        run_id: ctx.run_id.to_string(),
        raw_ref: format!("{}#L{}", ctx.raw_path, row.line),
        raw_json: serde_json::to_string(&row.value).unwrap_or_else(|_| "{}".to_string()),
        ..EventRecord::default()
    };

    let mut consumed: HashSet<&str> = HashSet::new();

    // The declared source identity never routes through the mapping.
    if let Some(value) = row.scalar("source_system") {
        if let Some(text) = scalar_to_text(value) {
            event.source_system = text;
            consumed.insert("source_system");
        }
    }
    if event.source_system.is_empty() {
        event.source_system = ctx.source_system.to_string();
    }

    for entry in mapping.entries() {
        let Some(target) = entry.target else {
            continue;
        };
        if consumed.contains(entry.source_field.as_str()) {
            continue;
        }
        let Some(value) = row.scalar(&entry.source_field) else {
            continue;
        };
        if event.has_value(target) {
            // Shadowed by an earlier entry for the same target; the
            // source field keeps its value in extras below.
            continue;
        }
        if bind_value(&mut event, target, value, row.line, &entry.source_field)? {
            consumed.insert(entry.source_field.as_str());
        }
    }

    if event.event_ts.is_empty() {
        return Err(IngestError::MissingRequiredField {
            line: row.line,
            field: "event_ts",
        });
    }
    if event.event_type.is_empty() {
        return Err(IngestError::MissingRequiredField {
            line: row.line,
            field: "event_type",
        });
    }

    // Everything the mapping did not consume is preserved verbatim in
    // the extras bag, keyed by the top-level source field name.
    if let Value::Object(object) = &row.value {
        for (key, value) in object {
            if consumed.contains(key.as_str()) {
                continue;
            }
            if let Some(text) = value_to_extra(value) {
                event.extras.insert(key.clone(), text);
            }
        }
    }

    Ok(event)
}

/// Bind a scalar to a unified column, converting to the column kind.
/// Returns whether the source field was consumed.
fn bind_value(
    event: &mut EventRecord,
    target: UnifiedField,
    value: &Value,
    line: usize,
    source_field: &str,
) -> Result<bool> {
    match target.kind() {
        FieldKind::Timestamp => {
            let Some(normalized) = timestamp::normalize_timestamp_value(value) else {
                return Err(IngestError::MalformedRow {
                    line,
                    message: format!(
                        "unparseable timestamp {:?} in field '{source_field}'",
                        scalar_preview(value)
                    ),
                });
            };
            event.set_value(target, UnifiedValue::Text(normalized));
            Ok(true)
        }
        FieldKind::Integer => match scalar_to_integer(value) {
            Some(int) => {
                event.set_value(target, UnifiedValue::Integer(int));
                Ok(true)
            }
            // Unparseable integers are not fatal; the value stays in
            // extras with its provenance intact.
            None => Ok(false),
        },
        FieldKind::Text => match scalar_to_text(value) {
            Some(text) => {
                event.set_value(target, UnifiedValue::Text(text));
                Ok(true)
            }
            None => Ok(false),
        },
    }
}

/// String view of a scalar, trimmed; empty values resolve to `None`.
fn scalar_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extras keep every unconsumed field: scalars stringified, structured
/// values compactly re-serialized, nulls dropped.
fn value_to_extra(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(_) | Value::Array(_) => Some(value.to_string()),
    }
}

fn scalar_preview(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.len() > 64 {
        format!("{}…", &text[..64])
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::RowReader;
    use casetrail_mapper::{FieldMapping, SourcePreset};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const CTX: RowContext<'static> = RowContext {
        case_id: "case-1",
        run_id: "run-1",
        raw_path: "raw/generic/run-1.ndjson",
        source_system: "generic",
    };

    fn read_rows(content: &str) -> Vec<RawRow> {
        let temp = tempdir().unwrap();
        let path = temp.path().join("rows.ndjson");
        std::fs::write(&path, content).unwrap();
        RowReader::open(&path)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn maps_converts_and_banks_extras() {
        let rows = read_rows(
            r#"{"timestamp": 1714557600, "action": "logon", "hostname": "WS01", "port": "443", "custom_marker": "alpha"}"#,
        );
        let mapping = FieldMapping::suggest(rows[0].field_names());
        let event = normalize_row(&CTX, &rows[0], &mapping).unwrap();

        assert_eq!(event.event_ts, "2024-05-01T10:00:00Z");
        assert_eq!(event.event_type, "logon");
        assert_eq!(event.host.as_deref(), Some("WS01"));
        assert_eq!(event.dest_port, Some(443));
        assert_eq!(event.extras.get("custom_marker").unwrap(), "alpha");
        assert!(!event.extras.contains_key("timestamp"));
        assert_eq!(event.raw_ref, "raw/generic/run-1.ndjson#L1");
        assert!(event.raw_json.contains("custom_marker"));
    }

    #[test]
    fn missing_event_type_is_reported_with_line() {
        let rows = read_rows(r#"{"timestamp": "2024-05-01T10:00:00Z", "hostname": "ws01"}"#);
        let mapping = FieldMapping::suggest(rows[0].field_names());
        match normalize_row(&CTX, &rows[0], &mapping) {
            Err(IngestError::MissingRequiredField { line, field }) => {
                assert_eq!(line, 1);
                assert_eq!(field, "event_type");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unparseable_timestamp_is_malformed() {
        let rows =
            read_rows(r#"{"timestamp": "yesterday-ish", "action": "logon"}"#);
        let mapping = FieldMapping::suggest(rows[0].field_names());
        match normalize_row(&CTX, &rows[0], &mapping) {
            Err(IngestError::MalformedRow { line, message }) => {
                assert_eq!(line, 1);
                assert!(message.contains("timestamp"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn first_mapping_entry_wins_shadowed_field_goes_to_extras() {
        let rows = read_rows(
            r#"{"timestamp": "2024-05-01T10:00:00Z", "created_at": "2024-06-01T00:00:00Z", "action": "logon"}"#,
        );
        // Both timestamp and created_at suggest event_ts; entry order
        // decides which value lands in the column.
        let mapping = FieldMapping::suggest(["timestamp", "created_at", "action"]);
        let event = normalize_row(&CTX, &rows[0], &mapping).unwrap();
        assert_eq!(event.event_ts, "2024-05-01T10:00:00Z");
        assert_eq!(
            event.extras.get("created_at").unwrap(),
            "2024-06-01T00:00:00Z"
        );
    }

    #[test]
    fn row_source_system_overrides_run_default() {
        let rows = read_rows(
            r#"{"timestamp": "2024-05-01T10:00:00Z", "action": "logon", "source_system": "edr"}"#,
        );
        let mapping = FieldMapping::suggest(rows[0].field_names());
        let event = normalize_row(&CTX, &rows[0], &mapping).unwrap();
        assert_eq!(event.source_system, "edr");
        assert!(!event.extras.contains_key("source_system"));
    }

    #[test]
    fn okta_nested_outcome_binds_while_parent_stays_in_extras() {
        let rows = read_rows(
            r#"{"published": "2024-05-01T10:00:00Z", "eventType": "user.session.start", "outcome": {"result": "SUCCESS"}}"#,
        );
        let mapping =
            FieldMapping::suggest_for_preset(SourcePreset::Okta, rows[0].field_names());
        let event = normalize_row(&CTX, &rows[0], &mapping).unwrap();
        assert_eq!(event.event_type, "user.session.start");
        assert_eq!(event.outcome.as_deref(), Some("SUCCESS"));
        // The nested parent is preserved as a structured extra.
        assert_eq!(
            event.extras.get("outcome").unwrap(),
            r#"{"result":"SUCCESS"}"#
        );
    }

    #[test]
    fn unparseable_integer_falls_back_to_extras() {
        let rows = read_rows(
            r#"{"timestamp": "2024-05-01T10:00:00Z", "action": "flow", "bytes_in": "lots"}"#,
        );
        let mapping = FieldMapping::suggest(rows[0].field_names());
        let event = normalize_row(&CTX, &rows[0], &mapping).unwrap();
        assert_eq!(event.bytes_in, None);
        assert_eq!(event.extras.get("bytes_in").unwrap(), "lots");
    }
}
