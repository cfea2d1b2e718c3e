//! # Casetrail Graph
//!
//! On-demand entity-relationship graphs over the case store.
//!
//! Given a seed entity, collects every entity co-occurring with it in
//! at least one event and weights each pair by the number of distinct
//! shared events. The result is bounded (`max_nodes`,
//! `min_edge_weight`), deterministic, and never persisted — re-running
//! ingestion is the only way the graph changes.

mod builder;
mod error;
mod types;

pub use builder::{build_graph, GraphOptions};
pub use error::{GraphError, Result};
pub use types::{EntityEdge, EntityGraph, EntityNode};
