use crate::unified::UnifiedField;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Version of the static alias table. Bump when entries change so that
/// persisted mapping suggestions can be traced to the table that
/// produced them.
pub const ALIAS_TABLE_VERSION: u32 = 1;

/// Known alias patterns per unified field, in priority order.
///
/// Aliases are pre-normalized (see [`normalize_field_name`]). The first
/// entry whose pattern matches wins, so more specific fields must come
/// before fields with catch-all patterns.
static GENERIC_ALIASES: &[(UnifiedField, &[&str])] = &[
    (
        UnifiedField::EventTs,
        &[
            "event_ts",
            "timestamp",
            "event_time",
            "datetime",
            "date_time",
            "created_at",
            "occurred_at",
            "time",
        ],
    ),
    (
        UnifiedField::EventType,
        &[
            "event_type",
            "type",
            "category",
            "event_name",
            "eventname",
            "activity",
            "action",
        ],
    ),
    (
        UnifiedField::Host,
        &[
            "host",
            "hostname",
            "host_name",
            "computer",
            "machine",
            "device",
            "device_name",
            "server",
        ],
    ),
    (
        UnifiedField::User,
        &[
            "user",
            "username",
            "user_name",
            "account",
            "account_name",
            "principal",
            "actor",
        ],
    ),
    (
        UnifiedField::SrcIp,
        &[
            "src_ip",
            "source_ip",
            "sourceip",
            "client_ip",
            "clientip",
            "remote_ip",
            "remoteip",
            "ip_address",
            "ipaddress",
        ],
    ),
    (
        UnifiedField::DestIp,
        &[
            "dest_ip",
            "destination_ip",
            "destinationip",
            "target_ip",
            "targetip",
        ],
    ),
    (UnifiedField::SrcPort, &["src_port", "source_port"]),
    (
        UnifiedField::DestPort,
        &["dest_port", "destination_port", "port"],
    ),
    (UnifiedField::Protocol, &["protocol", "proto"]),
    (
        UnifiedField::ProcessName,
        &[
            "process_name",
            "process",
            "program",
            "application",
            "app",
            "executable",
            "image",
        ],
    ),
    (
        UnifiedField::ProcessCmdline,
        &[
            "process_cmdline",
            "commandline",
            "command_line",
            "command",
            "cmdline",
            "cmd",
        ],
    ),
    (UnifiedField::ProcessId, &["process_id", "pid"]),
    (UnifiedField::ParentPid, &["parent_pid", "ppid"]),
    (
        UnifiedField::ParentProcessName,
        &["parent_process_name", "parent_process"],
    ),
    (
        UnifiedField::FileHash,
        &["file_hash", "hash", "sha256", "sha1", "md5"],
    ),
    (UnifiedField::FilePath, &["file_path", "filepath", "path"]),
    (UnifiedField::FileName, &["file_name", "filename", "file"]),
    (UnifiedField::Url, &["url", "uri", "request_url"]),
    (
        UnifiedField::DnsQuery,
        &["dns_query", "domain", "query"],
    ),
    (UnifiedField::HttpMethod, &["http_method", "method"]),
    (UnifiedField::HttpStatus, &["http_status", "status_code"]),
    (UnifiedField::BytesIn, &["bytes_in"]),
    (UnifiedField::BytesOut, &["bytes_out"]),
    (
        UnifiedField::Outcome,
        &["outcome", "result", "status", "disposition", "success"],
    ),
    (
        UnifiedField::Severity,
        &["severity", "level", "priority", "risk", "threat_level"],
    ),
    (
        UnifiedField::Message,
        &[
            "message",
            "msg",
            "description",
            "details",
            "summary",
            "raw",
            "log",
        ],
    ),
    (UnifiedField::LogonType, &["logon_type", "logontype"]),
    (UnifiedField::SessionId, &["session_id", "sessionid"]),
    (UnifiedField::Tactic, &["tactic", "tactics"]),
    (UnifiedField::Technique, &["technique", "techniques"]),
    (
        UnifiedField::EventId,
        &["event_id", "eventid", "event_code", "eventcode"],
    ),
    (UnifiedField::SourceName, &["source_name", "source", "index"]),
    // Only the literal column claims the native dedup identity; vendor
    // event codes repeat across rows and must not land here.
    (UnifiedField::SourceEventId, &["source_event_id"]),
];

/// Exact-match index over the generic table, built once.
static EXACT_INDEX: Lazy<HashMap<&'static str, UnifiedField>> = Lazy::new(|| {
    let mut index = HashMap::new();
    for (field, aliases) in GENERIC_ALIASES {
        for alias in *aliases {
            // First entry in table order wins on alias collisions.
            index.entry(*alias).or_insert(*field);
        }
    }
    index
});

/// Normalize a source field name for alias comparison: lowercase,
/// collapse separator runs (`-`, `.`, whitespace) to `_`, strip any
/// remaining non-alphanumeric characters.
#[must_use]
pub fn normalize_field_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        let ch = ch.to_ascii_lowercase();
        if ch == '-' || ch == '.' || ch == '_' || ch.is_whitespace() {
            if !out.is_empty() {
                pending_sep = true;
            }
            continue;
        }
        if !ch.is_ascii_alphanumeric() {
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.push(ch);
    }
    out
}

/// Suggest a unified field for a normalized source name from the
/// generic alias table: exact match over the whole table first, then
/// substring containment in either direction. Returns `None` when no
/// pattern matches (the field travels to extras).
#[must_use]
pub fn suggest_unified_field(normalized: &str) -> Option<UnifiedField> {
    if normalized.is_empty() {
        return None;
    }
    if let Some(field) = EXACT_INDEX.get(normalized) {
        return Some(*field);
    }
    for (field, aliases) in GENERIC_ALIASES {
        for alias in *aliases {
            // Substring containment needs length guards so one-char
            // fragments do not claim unrelated columns.
            if alias.len() >= 3 && normalized.contains(alias) {
                return Some(*field);
            }
            if normalized.len() >= 3 && alias.contains(normalized) {
                return Some(*field);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalizes_separators_and_case() {
        assert_eq!(normalize_field_name("Source-IP"), "source_ip");
        assert_eq!(normalize_field_name("outcome.result"), "outcome_result");
        assert_eq!(normalize_field_name("@timestamp"), "timestamp");
        assert_eq!(normalize_field_name("  Account Name "), "account_name");
        assert_eq!(normalize_field_name("_time"), "time");
    }

    #[test]
    fn exact_match_beats_substring() {
        // "status" is an exact Outcome alias even though "http_status"
        // contains it.
        assert_eq!(
            suggest_unified_field("status"),
            Some(UnifiedField::Outcome)
        );
        assert_eq!(
            suggest_unified_field("http_status"),
            Some(UnifiedField::HttpStatus)
        );
    }

    #[test]
    fn substring_containment_both_directions() {
        // Source name contains an alias.
        assert_eq!(
            suggest_unified_field("src_ip_v4"),
            Some(UnifiedField::SrcIp)
        );
        // Alias contains the source name.
        assert_eq!(
            suggest_unified_field("sev"),
            Some(UnifiedField::Severity)
        );
    }

    #[test]
    fn unknown_fields_map_to_none() {
        assert_eq!(suggest_unified_field("zzz_custom_thing"), None);
        assert_eq!(suggest_unified_field(""), None);
    }

    #[test]
    fn table_order_is_deterministic() {
        // "time" appears only under EventTs; repeated lookups agree.
        for _ in 0..3 {
            assert_eq!(
                suggest_unified_field("time"),
                Some(UnifiedField::EventTs)
            );
        }
    }
}
