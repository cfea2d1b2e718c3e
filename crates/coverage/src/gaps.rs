use crate::error::{CoverageError, Result};
use casetrail_store::CaseStore;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Hours of activity inspected before a gap to name its affected
/// sources.
const AFFECTED_SOURCE_LOOKBACK_HOURS: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSeverity {
    Low,
    Medium,
    High,
}

impl GapSeverity {
    /// Severity from gap duration: over a day is high, over four hours
    /// medium, anything shorter low.
    #[must_use]
    fn for_duration(duration: Duration) -> GapSeverity {
        if duration > Duration::hours(24) {
            GapSeverity::High
        } else if duration > Duration::hours(4) {
            GapSeverity::Medium
        } else {
            GapSeverity::Low
        }
    }
}

/// A maximal run of empty buckets long enough to matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageGap {
    /// Gap bounds in the wire format (RFC3339-Z).
    pub start: String,
    pub end: String,

    pub duration_minutes: i64,
    pub bucket_count: usize,

    /// Events the gap would have held at the case's typical density.
    pub expected_events: i64,

    pub severity: GapSeverity,

    /// Sources active in the lookback window before the gap started.
    pub affected_sources: Vec<String>,
}

/// Event counts per fixed-size bucket across the observed range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityBuckets {
    pub bucket_minutes: i64,
    /// Bucket start times, wire format, ascending.
    pub starts: Vec<String>,
    pub counts: Vec<u64>,
}

/// Detect coverage gaps over the case's observed time range.
///
/// The range is partitioned into `bucket_minutes` buckets; a gap is a
/// maximal run of at least `min_gap_buckets` consecutive empty buckets
/// (a trailing run counts). `source` narrows the counted events without
/// narrowing the range, so a silent source inside an active case shows
/// up. A case with zero events has no gaps.
pub fn find_gaps(
    store: &CaseStore,
    bucket_minutes: i64,
    min_gap_buckets: usize,
    source: Option<&str>,
) -> Result<Vec<CoverageGap>> {
    let Some(buckets) = bucket_counts(store, bucket_minutes, source)? else {
        return Ok(Vec::new());
    };

    let min_gap_buckets = min_gap_buckets.max(1);
    let bucket_span = Duration::minutes(bucket_minutes);

    // Typical density: mean events per non-empty bucket.
    let non_empty: Vec<u64> = buckets.counts.iter().copied().filter(|c| *c > 0).collect();
    let avg_events = if non_empty.is_empty() {
        0.0
    } else {
        non_empty.iter().sum::<u64>() as f64 / non_empty.len() as f64
    };

    let starts: Vec<DateTime<Utc>> = buckets
        .starts
        .iter()
        .map(|ts| parse_wire(ts))
        .collect::<Result<_>>()?;

    let mut gaps = Vec::new();
    let mut run_start: Option<usize> = None;
    for (idx, count) in buckets.counts.iter().enumerate() {
        if *count == 0 {
            run_start.get_or_insert(idx);
            continue;
        }
        if let Some(start_idx) = run_start.take() {
            let length = idx - start_idx;
            if length >= min_gap_buckets {
                gaps.push(build_gap(
                    store,
                    starts[start_idx],
                    starts[start_idx] + bucket_span * length as i32,
                    length,
                    avg_events,
                )?);
            }
        }
    }
    // A run that reaches the end of the range still counts.
    if let Some(start_idx) = run_start {
        let length = buckets.counts.len() - start_idx;
        if length >= min_gap_buckets {
            gaps.push(build_gap(
                store,
                starts[start_idx],
                starts[start_idx] + bucket_span * length as i32,
                length,
                avg_events,
            )?);
        }
    }

    log::debug!(
        "coverage scan: {} buckets, {} gaps{}",
        buckets.counts.len(),
        gaps.len(),
        source.map(|s| format!(" (source {s})")).unwrap_or_default()
    );
    Ok(gaps)
}

/// Bucketed activity counts over the case range, `None` when the case
/// holds no events.
pub fn bucket_counts(
    store: &CaseStore,
    bucket_minutes: i64,
    source: Option<&str>,
) -> Result<Option<ActivityBuckets>> {
    if bucket_minutes <= 0 {
        return Err(CoverageError::InvalidBucketSize);
    }
    let Some((min_ts, max_ts)) = store.time_bounds()? else {
        return Ok(None);
    };
    let range_start = parse_wire(&min_ts)?;
    let range_end = parse_wire(&max_ts)?;

    let span_minutes = (range_end - range_start).num_minutes();
    let bucket_count = (span_minutes / bucket_minutes) as usize + 1;

    let mut counts = vec![0u64; bucket_count];
    for ts in store.event_timestamps(source)? {
        let instant = parse_wire(&ts)?;
        let offset = (instant - range_start).num_minutes();
        let idx = (offset / bucket_minutes) as usize;
        if let Some(slot) = counts.get_mut(idx) {
            *slot += 1;
        }
    }

    let starts = (0..bucket_count)
        .map(|i| {
            format_wire(range_start + Duration::minutes(bucket_minutes * i as i64))
        })
        .collect();

    Ok(Some(ActivityBuckets {
        bucket_minutes,
        starts,
        counts,
    }))
}

fn build_gap(
    store: &CaseStore,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bucket_count: usize,
    avg_events: f64,
) -> Result<CoverageGap> {
    let duration = end - start;
    let lookback = start - Duration::hours(AFFECTED_SOURCE_LOOKBACK_HOURS);
    let affected_sources =
        store.sources_active_between(&format_wire(lookback), &format_wire(start))?;

    Ok(CoverageGap {
        start: format_wire(start),
        end: format_wire(end),
        duration_minutes: duration.num_minutes(),
        bucket_count,
        expected_events: (avg_events * bucket_count as f64) as i64,
        severity: GapSeverity::for_duration(duration),
        affected_sources,
    })
}

pub(crate) fn parse_wire(ts: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CoverageError::InvalidTimestamp(ts.to_string()))
}

fn format_wire(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
