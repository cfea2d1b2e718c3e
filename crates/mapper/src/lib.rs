//! # Casetrail Mapper
//!
//! Field-mapping inference for heterogeneous log exports.
//!
//! ## Pipeline
//!
//! ```text
//! Source field names
//!     │
//!     ├──> Name normalizer (lowercase, separators -> _)
//!     │
//!     ├──> Source preset aliases (splunk/kusto/cloudtrail/okta)
//!     │
//!     └──> Generic alias table (exact, then substring)
//!            └─> FieldMapping (analyst overrides win)
//! ```
//!
//! The unified schema is a closed contract: every source column either
//! maps to one [`UnifiedField`] or travels untouched in the extras bag.
//! Suggestions are deterministic — the alias table is static and
//! versioned, and the first matching entry in table order wins.

mod alias;
mod error;
mod mapping;
mod preset;
mod unified;

pub use alias::{normalize_field_name, suggest_unified_field, ALIAS_TABLE_VERSION};
pub use error::{MapperError, Result};
pub use mapping::{FieldMapping, MappingEntry};
pub use preset::SourcePreset;
pub use unified::{FieldKind, UnifiedField};
