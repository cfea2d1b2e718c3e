use serde::{Deserialize, Serialize};

/// Expected value type of a unified column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Timestamp,
}

/// The fixed set of normalized event columns all sources are mapped into.
///
/// The variant order is canonical: it is the fingerprint field order and
/// the priority order for mapping suggestions, so reordering variants is
/// a breaking change to stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifiedField {
    EventTs,
    EventType,
    Host,
    User,
    SrcIp,
    DestIp,
    SrcPort,
    DestPort,
    Protocol,
    ProcessName,
    ProcessCmdline,
    ProcessId,
    ParentPid,
    ParentProcessName,
    FileHash,
    FilePath,
    FileName,
    Url,
    DnsQuery,
    HttpMethod,
    HttpStatus,
    BytesIn,
    BytesOut,
    Outcome,
    Severity,
    Message,
    LogonType,
    SessionId,
    Tactic,
    Technique,
    EventId,
    SourceName,
    SourceEventId,
}

impl UnifiedField {
    /// All unified fields in canonical order.
    pub const ALL: &'static [UnifiedField] = &[
        UnifiedField::EventTs,
        UnifiedField::EventType,
        UnifiedField::Host,
        UnifiedField::User,
        UnifiedField::SrcIp,
        UnifiedField::DestIp,
        UnifiedField::SrcPort,
        UnifiedField::DestPort,
        UnifiedField::Protocol,
        UnifiedField::ProcessName,
        UnifiedField::ProcessCmdline,
        UnifiedField::ProcessId,
        UnifiedField::ParentPid,
        UnifiedField::ParentProcessName,
        UnifiedField::FileHash,
        UnifiedField::FilePath,
        UnifiedField::FileName,
        UnifiedField::Url,
        UnifiedField::DnsQuery,
        UnifiedField::HttpMethod,
        UnifiedField::HttpStatus,
        UnifiedField::BytesIn,
        UnifiedField::BytesOut,
        UnifiedField::Outcome,
        UnifiedField::Severity,
        UnifiedField::Message,
        UnifiedField::LogonType,
        UnifiedField::SessionId,
        UnifiedField::Tactic,
        UnifiedField::Technique,
        UnifiedField::EventId,
        UnifiedField::SourceName,
        UnifiedField::SourceEventId,
    ];

    /// Column name as stored in the schema store.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            UnifiedField::EventTs => "event_ts",
            UnifiedField::EventType => "event_type",
            UnifiedField::Host => "host",
            UnifiedField::User => "user",
            UnifiedField::SrcIp => "src_ip",
            UnifiedField::DestIp => "dest_ip",
            UnifiedField::SrcPort => "src_port",
            UnifiedField::DestPort => "dest_port",
            UnifiedField::Protocol => "protocol",
            UnifiedField::ProcessName => "process_name",
            UnifiedField::ProcessCmdline => "process_cmdline",
            UnifiedField::ProcessId => "process_id",
            UnifiedField::ParentPid => "parent_pid",
            UnifiedField::ParentProcessName => "parent_process_name",
            UnifiedField::FileHash => "file_hash",
            UnifiedField::FilePath => "file_path",
            UnifiedField::FileName => "file_name",
            UnifiedField::Url => "url",
            UnifiedField::DnsQuery => "dns_query",
            UnifiedField::HttpMethod => "http_method",
            UnifiedField::HttpStatus => "http_status",
            UnifiedField::BytesIn => "bytes_in",
            UnifiedField::BytesOut => "bytes_out",
            UnifiedField::Outcome => "outcome",
            UnifiedField::Severity => "severity",
            UnifiedField::Message => "message",
            UnifiedField::LogonType => "logon_type",
            UnifiedField::SessionId => "session_id",
            UnifiedField::Tactic => "tactic",
            UnifiedField::Technique => "technique",
            UnifiedField::EventId => "event_id",
            UnifiedField::SourceName => "source_name",
            UnifiedField::SourceEventId => "source_event_id",
        }
    }

    #[must_use]
    pub const fn kind(self) -> FieldKind {
        match self {
            UnifiedField::EventTs => FieldKind::Timestamp,
            UnifiedField::SrcPort
            | UnifiedField::DestPort
            | UnifiedField::ProcessId
            | UnifiedField::ParentPid
            | UnifiedField::HttpStatus
            | UnifiedField::BytesIn
            | UnifiedField::BytesOut => FieldKind::Integer,
            _ => FieldKind::Text,
        }
    }

    /// Required fields gate ingestion: a mapping that leaves them
    /// unresolved is rejected before any row is processed.
    #[must_use]
    pub const fn is_required(self) -> bool {
        matches!(self, UnifiedField::EventTs | UnifiedField::EventType)
    }

    /// Look up a unified field by its stored column name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<UnifiedField> {
        UnifiedField::ALL.iter().copied().find(|f| f.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn canonical_order_is_stable() {
        assert_eq!(UnifiedField::ALL[0], UnifiedField::EventTs);
        assert_eq!(UnifiedField::ALL[1], UnifiedField::EventType);
        assert_eq!(UnifiedField::ALL.len(), 33);
    }

    #[test]
    fn name_round_trip() {
        for field in UnifiedField::ALL {
            assert_eq!(UnifiedField::from_name(field.name()), Some(*field));
        }
    }

    #[test]
    fn only_ts_and_type_are_required() {
        let required: Vec<_> = UnifiedField::ALL
            .iter()
            .filter(|f| f.is_required())
            .collect();
        assert_eq!(required, [&UnifiedField::EventTs, &UnifiedField::EventType]);
    }
}
