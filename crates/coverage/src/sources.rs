use crate::error::Result;
use crate::gaps::parse_wire;
use casetrail_store::CaseStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Per-source coverage summary across the case window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCoverage {
    pub source_system: String,
    pub first_event: String,
    pub last_event: String,
    pub event_count: i64,

    /// Distinct hours with at least one event from this source.
    pub active_hours: i64,

    /// Active hours relative to the whole case window, rounded to one
    /// decimal.
    pub coverage_pct: f64,
}

/// Summarize how much of the case window each source actually covers,
/// ordered by first event. Flags thin feeds before gap analysis runs.
pub fn source_coverage(store: &CaseStore) -> Result<Vec<SourceCoverage>> {
    let activity = store.source_activity()?;
    let Some(first) = activity.first() else {
        return Ok(Vec::new());
    };

    let case_start = parse_wire(&first.first_event)?;
    let last_event = activity
        .iter()
        .map(|a| a.last_event.as_str())
        .max()
        .unwrap_or(first.last_event.as_str());
    let case_end = parse_wire(last_event)?;
    let total_hours = ((case_end - case_start).num_seconds() as f64 / 3600.0).max(1.0);

    let mut summaries = Vec::with_capacity(activity.len());
    for source in &activity {
        let mut hours: HashSet<i64> = HashSet::new();
        for ts in store.event_timestamps(Some(&source.source_system))? {
            hours.insert(parse_wire(&ts)?.timestamp().div_euclid(3600));
        }
        let active_hours = hours.len() as i64;
        summaries.push(SourceCoverage {
            source_system: source.source_system.clone(),
            first_event: source.first_event.clone(),
            last_event: source.last_event.clone(),
            event_count: source.event_count,
            active_hours,
            coverage_pct: (active_hours as f64 / total_hours * 1000.0).round() / 10.0,
        });
    }
    Ok(summaries)
}
