//! # Casetrail Store
//!
//! The canonical per-case relational store: cases, query runs,
//! deduplicated events, entities and their links, and sparse event
//! fields, backed by SQLite.
//!
//! ## Layout
//!
//! ```text
//! <cases_root>/<case_id>/
//!     case.sqlite    relational store (this crate)
//!     case.lock      case-scoped write lock
//!     raw/           append-only raw exports, copied at registration
//! ```
//!
//! Raw exports are the source of truth: every table except `cases` and
//! the analyst columns on `entities` can be regenerated by re-running
//! ingestion over `raw/`.

mod entities;
mod error;
mod events;
mod lock;
mod paths;
mod runs;
mod schema;
mod store;

pub use entities::{
    link_event_entity, set_entity_notes, set_entity_tags, upsert_entity, EntityKind, EntityRow,
};
pub use error::{Result, StoreError};
pub use events::{
    insert_event_fields, insert_or_get_event, EventRecord, StoredEvent, UnifiedValue,
};
pub use lock::CaseWriteLock;
pub use paths::CaseLayout;
pub use runs::{hash_file, mark_run_ingested, QueryRun, RunRegistration};
pub use schema::SCHEMA_VERSION;
pub use store::{now_utc_z, CaseStore, SourceActivity};
