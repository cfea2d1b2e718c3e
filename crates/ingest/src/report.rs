use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cap on stored row-error samples per run; the full failure count is
/// still reported in `rows_failed`.
pub const MAX_ROW_ERRORS: usize = 20;

const SAMPLE_FIELD_CAP: usize = 5;
const SAMPLE_VALUE_CAP: usize = 80;

/// Run lifecycle. `Aborted` means the transaction rolled back and the
/// run is safely retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Registered,
    Reading,
    Normalizing,
    Writing,
    Committed,
    Aborted,
}

/// One recovered row failure, with enough context to fix the mapping
/// without re-running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub line: usize,
    pub error: String,
    pub raw_ref: String,
    /// Redacted excerpt of the offending row: first few fields, values
    /// truncated.
    pub sample: BTreeMap<String, String>,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub run_id: String,
    pub source_system: String,
    pub state: RunState,

    /// Fresh events committed this run.
    pub events_ingested: usize,

    /// Rows that resolved to an already-stored event (either dedup
    /// key); never an error.
    pub events_skipped: usize,

    /// Rows that failed normalization. Lenient mode records and skips
    /// them; strict mode aborts on the first.
    pub rows_failed: usize,

    /// Capped sample of row failures.
    pub errors: Vec<RowError>,

    /// Source→unified pairs observed on the first row.
    pub fields_mapped: Vec<(String, String)>,

    /// First-row source fields that travel to extras.
    pub fields_unmapped: Vec<String>,

    /// Analyst-facing hints derived from the error/unmapped profile.
    pub suggestions: Vec<String>,
}

impl IngestReport {
    #[must_use]
    pub fn new(run_id: &str, source_system: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            source_system: source_system.to_string(),
            state: RunState::Registered,
            events_ingested: 0,
            events_skipped: 0,
            rows_failed: 0,
            errors: Vec::new(),
            fields_mapped: Vec::new(),
            fields_unmapped: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn record_row_error(
        &mut self,
        line: usize,
        error: String,
        raw_ref: String,
        fields: &[(String, String)],
    ) {
        self.rows_failed += 1;
        if self.errors.len() >= MAX_ROW_ERRORS {
            return;
        }
        let sample = fields
            .iter()
            .take(SAMPLE_FIELD_CAP)
            .map(|(name, value)| (name.clone(), truncate(value, SAMPLE_VALUE_CAP)))
            .collect();
        self.errors.push(RowError {
            line,
            error,
            raw_ref,
            sample,
        });
    }

    /// Derive hints the way an analyst would read the run: what to map,
    /// what leaked to extras, whether the preset fits.
    pub fn generate_suggestions(&mut self) {
        if let Some(first) = self.errors.first() {
            if first.error.contains("event_ts") || first.error.contains("timestamp") {
                self.suggestions.push(format!(
                    "map the {} timestamp column to event_ts (override the suggestion before re-ingesting)",
                    self.source_system
                ));
            }
        }
        if self.fields_unmapped.len() > 5 {
            self.suggestions.push(format!(
                "{} source fields went to extras; consider overrides for the ones you pivot on",
                self.fields_unmapped.len()
            ));
        }
    }
}

fn truncate(value: &str, cap: usize) -> String {
    if value.len() <= cap {
        return value.to_string();
    }
    let mut end = cap;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &value[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_list_is_capped_but_count_is_not() {
        let mut report = IngestReport::new("run-1", "splunk");
        for line in 1..=(MAX_ROW_ERRORS + 10) {
            report.record_row_error(line, "bad".to_string(), format!("f#L{line}"), &[]);
        }
        assert_eq!(report.errors.len(), MAX_ROW_ERRORS);
        assert_eq!(report.rows_failed, MAX_ROW_ERRORS + 10);
    }

    #[test]
    fn samples_are_redacted() {
        let mut report = IngestReport::new("run-1", "splunk");
        let fields: Vec<(String, String)> = (0..10)
            .map(|i| (format!("f{i}"), "x".repeat(200)))
            .collect();
        report.record_row_error(3, "bad".to_string(), "f#L3".to_string(), &fields);
        let sample = &report.errors[0].sample;
        assert_eq!(sample.len(), 5);
        assert!(sample.values().all(|v| v.len() < 200));
    }
}
