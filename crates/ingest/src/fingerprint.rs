use casetrail_store::EventRecord;
use sha2::{Digest, Sha256};

/// Content fingerprint: SHA-256 over the identity subset of normalized
/// columns, `|`-joined in fixed order. Computed after normalization, so
/// benign field reordering in the source cannot change it; the subset
/// and order are stable across runs by construction.
#[must_use]
pub fn content_fingerprint(event: &EventRecord) -> String {
    let parts: [&str; 13] = [
        &event.event_ts,
        &event.source_system,
        &event.event_type,
        event.host.as_deref().unwrap_or(""),
        event.user.as_deref().unwrap_or(""),
        event.src_ip.as_deref().unwrap_or(""),
        event.dest_ip.as_deref().unwrap_or(""),
        event.process_name.as_deref().unwrap_or(""),
        event.process_cmdline.as_deref().unwrap_or(""),
        event.file_hash.as_deref().unwrap_or(""),
        event.outcome.as_deref().unwrap_or(""),
        event.severity.as_deref().unwrap_or(""),
        event.message.as_deref().unwrap_or(""),
    ];
    let mut hasher = Sha256::new();
    hasher.update(parts.join("|").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Assign the dedup identity: a native `source_event_id` is
/// authoritative and suppresses the content hash; otherwise the
/// fingerprint carries the identity.
pub fn assign_identity(event: &mut EventRecord) {
    event.fingerprint = if event.source_event_id.is_some() {
        None
    } else {
        Some(content_fingerprint(event))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(ts: &str, host: &str) -> EventRecord {
        EventRecord {
            case_id: "case-1".to_string(),
            run_id: "run-1".to_string(),
            event_ts: ts.to_string(),
            source_system: "splunk".to_string(),
            event_type: "logon".to_string(),
            host: Some(host.to_string()),
            raw_ref: "raw/splunk/r.ndjson#L1".to_string(),
            raw_json: "{}".to_string(),
            ..EventRecord::default()
        }
    }

    #[test]
    fn identical_canonical_events_share_a_fingerprint() {
        let a = event("2024-05-01T10:00:00Z", "ws01");
        let mut b = event("2024-05-01T10:00:00Z", "ws01");
        // Fields outside the identity subset do not contribute.
        b.raw_ref = "raw/splunk/r.ndjson#L99".to_string();
        b.extras.insert("shuffled".to_string(), "yes".to_string());
        assert_eq!(content_fingerprint(&a), content_fingerprint(&b));
    }

    #[test]
    fn identity_subset_changes_change_the_fingerprint() {
        let a = event("2024-05-01T10:00:00Z", "ws01");
        let b = event("2024-05-01T10:00:00Z", "ws02");
        let c = event("2024-05-01T10:00:01Z", "ws01");
        assert_ne!(content_fingerprint(&a), content_fingerprint(&b));
        assert_ne!(content_fingerprint(&a), content_fingerprint(&c));
    }

    #[test]
    fn native_id_suppresses_the_hash() {
        let mut with_id = event("2024-05-01T10:00:00Z", "ws01");
        with_id.source_event_id = Some("evt-1".to_string());
        assign_identity(&mut with_id);
        assert_eq!(with_id.fingerprint, None);

        let mut without_id = event("2024-05-01T10:00:00Z", "ws01");
        assign_identity(&mut without_id);
        assert!(without_id.fingerprint.is_some());
    }
}
