//! # Casetrail Ingest
//!
//! The ingestion and normalization pipeline: one registered source
//! file in, canonical deduplicated entity-linked events out.
//!
//! ## Pipeline
//!
//! ```text
//! Raw export (NDJSON / CSV)
//!     │
//!     ├──> Row reader (line-numbered records)
//!     │
//!     ├──> Normalizer (field mapping, type/timestamp conversion)
//!     │      └─> canonical event + extras + raw payload
//!     │
//!     ├──> Fingerprinter (native ID or content hash)
//!     │
//!     └──> Store writes, one transaction per run
//!            ├─> insert-or-skip event
//!            └─> entity upsert + links
//! ```
//!
//! Strict mode aborts the run on the first bad row and commits nothing;
//! lenient mode records `{line, error, sample}` per bad row and commits
//! everything that succeeded.

mod error;
mod fingerprint;
mod linker;
mod normalizer;
mod reader;
mod report;
mod runner;
mod timestamp;

pub use error::{IngestError, Result};
pub use fingerprint::{assign_identity, content_fingerprint};
pub use linker::{extract_entities, link_event, DEFAULT_ENTITY_FIELDS};
pub use normalizer::{normalize_row, RowContext};
pub use reader::{RawRow, RowReader, SourceFormat};
pub use report::{IngestReport, RowError, RunState, MAX_ROW_ERRORS};
pub use runner::{
    ingest_pending, ingest_run, register_source_file, IngestMode, IngestOptions,
};
pub use timestamp::{format_utc_z, normalize_timestamp_value, parse_timestamp};
