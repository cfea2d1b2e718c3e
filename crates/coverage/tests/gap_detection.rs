use casetrail_coverage::{bucket_counts, find_gaps, source_coverage, GapSeverity};
use casetrail_store::{insert_or_get_event, CaseStore, EventRecord, RunRegistration};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn new_store(root: &std::path::Path) -> (CaseStore, String) {
    let store = CaseStore::create(root.join("cases"), "case-1", None).unwrap();
    let file = root.join("seed.ndjson");
    std::fs::write(&file, b"{}\n").unwrap();
    let run = store
        .register_run(
            &RunRegistration {
                source_system: "mixed".to_string(),
                query_name: "seed".to_string(),
                query_text: None,
                time_start: None,
                time_end: None,
                executed_at: None,
                allow_duplicate_file: true,
            },
            &file,
        )
        .unwrap();
    let run_id = run.run_id;
    (store, run_id)
}

fn insert_event(case_id: &str, conn: &rusqlite::Connection, run_id: &str, ts: &str, source: &str) {
    let event = EventRecord {
        case_id: case_id.to_string(),
        run_id: run_id.to_string(),
        event_ts: ts.to_string(),
        source_system: source.to_string(),
        event_type: "beat".to_string(),
        raw_ref: format!("raw/{source}/seed.ndjson#L1"),
        raw_json: "{}".to_string(),
        fingerprint: Some(format!("fp-{source}-{ts}")),
        ..EventRecord::default()
    };
    let (_, was_duplicate) = insert_or_get_event(conn, &event).unwrap();
    assert!(!was_duplicate);
}

#[test]
fn empty_case_has_no_gaps() {
    let temp = tempdir().unwrap();
    let (store, _run_id) = new_store(temp.path());

    let gaps = find_gaps(&store, 60, 2, None).unwrap();
    assert!(gaps.is_empty());
    assert!(bucket_counts(&store, 60, None).unwrap().is_none());
    assert!(source_coverage(&store).unwrap().is_empty());
}

#[test]
fn detects_a_silent_window() {
    let temp = tempdir().unwrap();
    let (mut store, run_id) = new_store(temp.path());

    // Hourly heartbeat from 00:00 through 23:00, silent 08:00..14:00.
    let case_id = store.case_id().to_string();
    let tx = store.begin_write().unwrap();
    for hour in 0..24 {
        if (8..14).contains(&hour) {
            continue;
        }
        insert_event(
            &case_id,
            &tx,
            &run_id,
            &format!("2024-05-01T{hour:02}:00:00Z"),
            "edr",
        );
    }
    tx.commit().unwrap();

    let gaps = find_gaps(&store, 60, 2, None).unwrap();
    assert_eq!(gaps.len(), 1);
    let gap = &gaps[0];
    assert_eq!(gap.start, "2024-05-01T08:00:00Z");
    assert_eq!(gap.end, "2024-05-01T14:00:00Z");
    assert_eq!(gap.bucket_count, 6);
    assert_eq!(gap.duration_minutes, 360);
    assert_eq!(gap.severity, GapSeverity::Medium);
    // One event per active bucket, six silent buckets.
    assert_eq!(gap.expected_events, 6);
    assert_eq!(gap.affected_sources, ["edr"]);
}

#[test]
fn short_silences_below_the_threshold_are_ignored() {
    let temp = tempdir().unwrap();
    let (mut store, run_id) = new_store(temp.path());

    let case_id = store.case_id().to_string();
    let tx = store.begin_write().unwrap();
    for hour in [0, 1, 3, 4, 5] {
        insert_event(
            &case_id,
            &tx,
            &run_id,
            &format!("2024-05-01T{hour:02}:00:00Z"),
            "edr",
        );
    }
    tx.commit().unwrap();

    // The single empty bucket at 02:00 is under min_gap_buckets=2.
    let gaps = find_gaps(&store, 60, 2, None).unwrap();
    assert!(gaps.is_empty());

    let gaps = find_gaps(&store, 60, 1, None).unwrap();
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].bucket_count, 1);
    assert_eq!(gaps[0].severity, GapSeverity::Low);
}

#[test]
fn source_filter_finds_one_feed_going_dark() {
    let temp = tempdir().unwrap();
    let (mut store, run_id) = new_store(temp.path());

    let case_id = store.case_id().to_string();
    let tx = store.begin_write().unwrap();
    for hour in 0..12 {
        insert_event(
            &case_id,
            &tx,
            &run_id,
            &format!("2024-05-01T{hour:02}:00:00Z"),
            "firewall",
        );
        // Okta stops reporting after 05:00.
        if hour <= 5 {
            insert_event(
                &case_id,
                &tx,
                &run_id,
                &format!("2024-05-01T{hour:02}:30:00Z"),
                "okta",
            );
        }
    }
    tx.commit().unwrap();

    // Unfiltered, the case looks healthy.
    assert!(find_gaps(&store, 60, 2, None).unwrap().is_empty());

    // Filtered to okta, the trailing silence shows up; the range still
    // spans the whole case.
    let gaps = find_gaps(&store, 60, 2, Some("okta")).unwrap();
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].start, "2024-05-01T06:00:00Z");
    assert!(gaps[0].affected_sources.contains(&"okta".to_string()));
    assert!(gaps[0].bucket_count >= 5);
}

#[test]
fn source_coverage_reports_active_hours() {
    let temp = tempdir().unwrap();
    let (mut store, run_id) = new_store(temp.path());

    let case_id = store.case_id().to_string();
    let tx = store.begin_write().unwrap();
    for hour in 0..10 {
        insert_event(
            &case_id,
            &tx,
            &run_id,
            &format!("2024-05-01T{hour:02}:00:00Z"),
            "firewall",
        );
    }
    insert_event(&case_id, &tx, &run_id, "2024-05-01T00:15:00Z", "okta");
    insert_event(&case_id, &tx, &run_id, "2024-05-01T09:15:00Z", "okta");
    tx.commit().unwrap();

    let coverage = source_coverage(&store).unwrap();
    assert_eq!(coverage.len(), 2);

    let firewall = coverage
        .iter()
        .find(|c| c.source_system == "firewall")
        .unwrap();
    assert_eq!(firewall.event_count, 10);
    assert_eq!(firewall.active_hours, 10);

    let okta = coverage.iter().find(|c| c.source_system == "okta").unwrap();
    assert_eq!(okta.event_count, 2);
    assert_eq!(okta.active_hours, 2);
    assert!(okta.coverage_pct < firewall.coverage_pct);
}
