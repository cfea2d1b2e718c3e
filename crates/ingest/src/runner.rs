use crate::error::{IngestError, Result};
use crate::fingerprint;
use crate::linker::{link_event, DEFAULT_ENTITY_FIELDS};
use crate::normalizer::{normalize_row, RowContext};
use crate::reader::{RawRow, RowReader};
use crate::report::{IngestReport, RunState};
use crate::timestamp;
use casetrail_mapper::{FieldMapping, SourcePreset, UnifiedField};
use casetrail_store::{
    insert_event_fields, insert_or_get_event, mark_run_ingested, now_utc_z, CaseStore, QueryRun,
    RunRegistration,
};
use std::path::Path;

/// Row failure policy. Strict aborts the run on the first bad row with
/// nothing committed; lenient records the failure and continues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IngestMode {
    #[default]
    Strict,
    Lenient,
}

/// Per-run ingestion options.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub mode: IngestMode,

    /// Committed mapping. `None` infers one from the first parseable
    /// row via the run's source preset.
    pub mapping: Option<FieldMapping>,

    /// Entity-bearing unified columns to link. Empty selects the
    /// default set.
    pub entity_fields: Vec<UnifiedField>,
}

impl IngestOptions {
    #[must_use]
    pub fn strict() -> Self {
        Self {
            mode: IngestMode::Strict,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn lenient() -> Self {
        Self {
            mode: IngestMode::Lenient,
            ..Self::default()
        }
    }
}

/// Register a source file for later ingestion: normalize the declared
/// coverage window, then record the run and copy the raw file into the
/// case's append-only raw area.
pub fn register_source_file(
    store: &CaseStore,
    mut registration: RunRegistration,
    file_path: &Path,
) -> Result<QueryRun> {
    registration.time_start = normalize_declared(registration.time_start, "time_start")?;
    registration.time_end = normalize_declared(registration.time_end, "time_end")?;
    registration.executed_at = normalize_declared(registration.executed_at, "executed_at")?;
    Ok(store.register_run(&registration, file_path)?)
}

fn normalize_declared(value: Option<String>, field: &str) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(raw) => match timestamp::parse_timestamp(&raw) {
            Some(dt) => Ok(Some(timestamp::format_utc_z(dt))),
            None => Err(IngestError::MalformedRow {
                line: 0,
                message: format!("unparseable {field} {raw:?} in run registration"),
            }),
        },
    }
}

/// Ingest one registered run end-to-end inside a single transaction.
///
/// `Registered → Reading → Normalizing → Writing → Committed`;
/// any fatal error (or the first row error in strict mode) drops the
/// transaction instead, leaving the run pending and retryable.
pub fn ingest_run(
    store: &mut CaseStore,
    run_id: &str,
    opts: &IngestOptions,
) -> Result<IngestReport> {
    let run = store.run(run_id)?;
    let case_id = store.case_id().to_string();
    let raw_file = store.layout().case_dir().join(&run.raw_path);

    let mut report = IngestReport::new(run_id, &run.source_system);
    let entity_fields: &[UnifiedField] = if opts.entity_fields.is_empty() {
        DEFAULT_ENTITY_FIELDS
    } else {
        &opts.entity_fields
    };

    // Writers serialize per case; readers are never blocked.
    let _write_lock = store.acquire_write_lock()?;

    report.state = RunState::Reading;
    let mut reader = RowReader::open(&raw_file)?;
    let first = reader.next();

    // The required-field gate runs before any row is normalized.
    let mut mapping = opts.mapping.clone();
    if let Some(mapping) = &mapping {
        mapping.validate()?;
    }

    let preset = SourcePreset::for_source(&run.source_system);
    let source_default = preset
        .default_source_system()
        .unwrap_or(&run.source_system)
        .to_string();
    let ctx = RowContext {
        case_id: &case_id,
        run_id,
        raw_path: &run.raw_path,
        source_system: &source_default,
    };

    report.state = RunState::Normalizing;
    let tx = store.begin_write()?;
    let mut first_row_seen = false;

    for row_result in first.into_iter().chain(&mut reader) {
        let row = match row_result {
            Ok(row) => row,
            Err(err) if err.is_row_error() && opts.mode == IngestMode::Lenient => {
                let line = err.line().unwrap_or(0);
                report.record_row_error(
                    line,
                    err.to_string(),
                    format!("{}#L{line}", run.raw_path),
                    &[],
                );
                continue;
            }
            Err(err) => {
                report.state = RunState::Aborted;
                log::warn!("run {run_id} aborted at read: {err}");
                return Err(err);
            }
        };

        let mapping = match &mut mapping {
            Some(mapping) => mapping,
            slot => {
                let suggested =
                    FieldMapping::suggest_for_preset(preset, row.field_names());
                suggested.validate()?;
                slot.insert(suggested)
            }
        };

        if !first_row_seen {
            first_row_seen = true;
            record_mapping_feedback(&mut report, mapping, &row);
        }

        report.state = RunState::Writing;
        let mut event = match normalize_row(&ctx, &row, mapping) {
            Ok(event) => event,
            Err(err) if err.is_row_error() && opts.mode == IngestMode::Lenient => {
                let line = err.line().unwrap_or(row.line);
                report.record_row_error(
                    line,
                    err.to_string(),
                    format!("{}#L{line}", run.raw_path),
                    &row_sample(&row),
                );
                continue;
            }
            Err(err) => {
                report.state = RunState::Aborted;
                log::warn!("run {run_id} aborted at normalize: {err}");
                return Err(err);
            }
        };

        fingerprint::assign_identity(&mut event);

        let (event_pk, was_duplicate) = insert_or_get_event(&tx, &event)?;
        if was_duplicate {
            report.events_skipped += 1;
            continue;
        }
        report.events_ingested += 1;
        insert_event_fields(&tx, event_pk, &event.extras)?;
        link_event(&tx, &event, event_pk, entity_fields)?;
    }

    let row_count = (report.events_ingested + report.events_skipped) as i64;
    mark_run_ingested(&tx, run_id, row_count, &now_utc_z())?;
    tx.commit().map_err(casetrail_store::StoreError::from)?;
    report.state = RunState::Committed;

    log::info!(
        "run {run_id} committed: {} ingested, {} skipped, {} failed",
        report.events_ingested,
        report.events_skipped,
        report.rows_failed
    );
    report.generate_suggestions();
    Ok(report)
}

/// Ingest every pending run for the case, in registration order.
pub fn ingest_pending(
    store: &mut CaseStore,
    opts: &IngestOptions,
) -> Result<Vec<IngestReport>> {
    let pending = store.pending_runs()?;
    let mut reports = Vec::with_capacity(pending.len());
    for run in pending {
        reports.push(ingest_run(store, &run.run_id, opts)?);
    }
    Ok(reports)
}

fn record_mapping_feedback(report: &mut IngestReport, mapping: &FieldMapping, row: &RawRow) {
    let names = row.field_names();
    for (source, target) in mapping.mapped_fields() {
        if names.contains(&source) {
            report
                .fields_mapped
                .push((source.to_string(), target.name().to_string()));
        }
    }
    for source in mapping.unmapped_fields() {
        if names.contains(&source) {
            report.fields_unmapped.push(source.to_string());
        }
    }
}

fn row_sample(row: &RawRow) -> Vec<(String, String)> {
    row.fields
        .iter()
        .map(|(name, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), text)
        })
        .collect()
}
