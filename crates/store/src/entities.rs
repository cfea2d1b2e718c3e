use crate::error::Result;
use casetrail_mapper::UnifiedField;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// First-class pivot kinds extracted from events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Host,
    User,
    Ip,
    Hash,
    Process,
}

impl EntityKind {
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::Host,
        EntityKind::User,
        EntityKind::Ip,
        EntityKind::Hash,
        EntityKind::Process,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::Host => "host",
            EntityKind::User => "user",
            EntityKind::Ip => "ip",
            EntityKind::Hash => "hash",
            EntityKind::Process => "process",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<EntityKind> {
        EntityKind::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Unified columns this kind is observed in. `ip` draws from both
    /// endpoint columns.
    #[must_use]
    pub const fn columns(self) -> &'static [UnifiedField] {
        match self {
            EntityKind::Host => &[UnifiedField::Host],
            EntityKind::User => &[UnifiedField::User],
            EntityKind::Ip => &[UnifiedField::SrcIp, UnifiedField::DestIp],
            EntityKind::Hash => &[UnifiedField::FileHash],
            EntityKind::Process => &[UnifiedField::ProcessName],
        }
    }

    /// The kind observed in a given unified column, if it is
    /// entity-bearing.
    #[must_use]
    pub fn for_column(field: UnifiedField) -> Option<EntityKind> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|k| k.columns().contains(&field))
    }
}

/// One entity row with its lifecycle bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRow {
    pub entity_id: i64,
    pub case_id: String,
    pub entity_type: EntityKind,
    pub entity_value: String,
    pub first_seen: String,
    pub last_seen: String,
    pub notes: Option<String>,
    pub tags: Option<String>,
}

/// Upsert an entity observation and widen its lifecycle bounds to
/// include `event_ts`. Idempotent, and correct for out-of-order
/// ingestion: bounds only ever widen.
pub fn upsert_entity(
    conn: &Connection,
    case_id: &str,
    kind: EntityKind,
    value: &str,
    event_ts: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO entities (case_id, entity_type, entity_value, first_seen, last_seen)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(case_id, entity_type, entity_value) DO UPDATE SET
             first_seen = MIN(first_seen, excluded.first_seen),
             last_seen  = MAX(last_seen, excluded.last_seen)",
        params![case_id, kind.name(), value, event_ts],
    )?;

    let entity_id = conn.query_row(
        "SELECT entity_id FROM entities
         WHERE case_id = ?1 AND entity_type = ?2 AND entity_value = ?3",
        params![case_id, kind.name(), value],
        |row| row.get(0),
    )?;
    Ok(entity_id)
}

/// Record one event↔entity association. Repeats within an event are
/// collapsed by the primary key.
pub fn link_event_entity(conn: &Connection, event_pk: i64, entity_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO event_entities (event_pk, entity_id) VALUES (?1, ?2)",
        params![event_pk, entity_id],
    )?;
    Ok(())
}

/// Analyst-mutable annotations, independent of event ingestion.
pub fn set_entity_notes(conn: &Connection, entity_id: i64, notes: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE entities SET notes = ?2 WHERE entity_id = ?1",
        params![entity_id, notes],
    )?;
    Ok(())
}

pub fn set_entity_tags(conn: &Connection, entity_id: i64, tags: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE entities SET tags = ?2 WHERE entity_id = ?1",
        params![entity_id, tags],
    )?;
    Ok(())
}

pub(crate) fn entity_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntityRow> {
    let type_name: String = row.get("entity_type")?;
    let entity_type = EntityKind::from_name(&type_name).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown entity type: {type_name}").into(),
        )
    })?;
    Ok(EntityRow {
        entity_id: row.get("entity_id")?,
        case_id: row.get("case_id")?,
        entity_type,
        entity_value: row.get("entity_value")?,
        first_seen: row.get("first_seen")?,
        last_seen: row.get("last_seen")?,
        notes: row.get("notes")?,
        tags: row.get("tags")?,
    })
}

pub(crate) fn find_entity(
    conn: &Connection,
    case_id: &str,
    kind: EntityKind,
    value: &str,
) -> Result<Option<EntityRow>> {
    let row = conn
        .query_row(
            "SELECT entity_id, case_id, entity_type, entity_value,
                    first_seen, last_seen, notes, tags
             FROM entities
             WHERE case_id = ?1 AND entity_type = ?2 AND entity_value = ?3",
            params![case_id, kind.name(), value],
            entity_from_row,
        )
        .optional()?;
    Ok(row)
}
