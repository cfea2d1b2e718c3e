//! # Casetrail Coverage
//!
//! Time-bucketed coverage analysis over the case store: partition the
//! observed range into fixed buckets, count events per bucket
//! (optionally per source), and surface runs of silence as gaps with a
//! severity derived from their duration. Read-only and ephemeral — the
//! results are recomputed from stored events on every call.

mod error;
mod gaps;
mod sources;

pub use error::{CoverageError, Result};
pub use gaps::{bucket_counts, find_gaps, ActivityBuckets, CoverageGap, GapSeverity};
pub use sources::{source_coverage, SourceCoverage};
