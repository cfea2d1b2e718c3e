use crate::error::Result;
use casetrail_mapper::UnifiedField;
use casetrail_store::{link_event_entity, upsert_entity, EntityKind, EventRecord};
use rusqlite::Connection;
use std::collections::HashSet;

/// Default analyst selection: every entity-bearing unified column.
pub const DEFAULT_ENTITY_FIELDS: &[UnifiedField] = &[
    UnifiedField::Host,
    UnifiedField::User,
    UnifiedField::SrcIp,
    UnifiedField::DestIp,
    UnifiedField::FileHash,
    UnifiedField::ProcessName,
];

/// Entity observations in one canonical event, deduplicated, in the
/// order of the selected field list.
#[must_use]
pub fn extract_entities(
    event: &EventRecord,
    entity_fields: &[UnifiedField],
) -> Vec<(EntityKind, String)> {
    let mut seen: HashSet<(EntityKind, String)> = HashSet::new();
    let mut pairs = Vec::new();
    for field in entity_fields {
        let Some(kind) = EntityKind::for_column(*field) else {
            continue;
        };
        let Some(value) = event.field_text(*field) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let key = (kind, value.to_string());
        if seen.insert(key.clone()) {
            pairs.push(key);
        }
    }
    pairs
}

/// Upsert and link every entity observed in a freshly inserted event.
/// Runs inside the ingestion transaction; duplicate events never reach
/// this point, so counts and bounds stay idempotent.
pub fn link_event(
    conn: &Connection,
    event: &EventRecord,
    event_pk: i64,
    entity_fields: &[UnifiedField],
) -> Result<usize> {
    let pairs = extract_entities(event, entity_fields);
    for (kind, value) in &pairs {
        let entity_id = upsert_entity(conn, &event.case_id, *kind, value, &event.event_ts)?;
        link_event_entity(conn, event_pk, entity_id)?;
    }
    Ok(pairs.len())
}
