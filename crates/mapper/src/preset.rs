use crate::unified::UnifiedField;
use serde::{Deserialize, Serialize};

/// Source-specific alias layer consulted before the generic table.
///
/// Presets carry the vendor-native column names of the supported export
/// formats. Aliases are stored pre-normalized; nested source columns
/// (e.g. Okta `outcome.result`) appear with `.` collapsed to `_` the
/// way the reader flattens them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePreset {
    Splunk,
    Kusto,
    CloudTrail,
    Okta,
    #[default]
    Generic,
}

impl SourcePreset {
    /// Pick the preset for a declared source system name.
    #[must_use]
    pub fn for_source(source_system: &str) -> SourcePreset {
        match source_system.trim().to_ascii_lowercase().as_str() {
            "splunk" => SourcePreset::Splunk,
            "kusto" | "sentinel" | "azure" | "defender" => SourcePreset::Kusto,
            "cloudtrail" | "aws" => SourcePreset::CloudTrail,
            "okta" => SourcePreset::Okta,
            _ => SourcePreset::Generic,
        }
    }

    /// Default `source_system` value stamped on events when the rows
    /// themselves carry none.
    #[must_use]
    pub const fn default_source_system(self) -> Option<&'static str> {
        match self {
            SourcePreset::Splunk => Some("splunk"),
            SourcePreset::Kusto => Some("kusto"),
            SourcePreset::CloudTrail => Some("aws"),
            SourcePreset::Okta => Some("okta"),
            SourcePreset::Generic => None,
        }
    }

    /// Vendor-native aliases, exact-match only, in priority order.
    #[must_use]
    pub(crate) fn aliases(self) -> &'static [(UnifiedField, &'static [&'static str])] {
        match self {
            SourcePreset::Splunk => SPLUNK_ALIASES,
            SourcePreset::Kusto => KUSTO_ALIASES,
            SourcePreset::CloudTrail => CLOUDTRAIL_ALIASES,
            SourcePreset::Okta => OKTA_ALIASES,
            SourcePreset::Generic => &[],
        }
    }

    /// Exact lookup in this preset's alias layer.
    #[must_use]
    pub(crate) fn suggest(self, normalized: &str) -> Option<UnifiedField> {
        for (field, aliases) in self.aliases() {
            if aliases.contains(&normalized) {
                return Some(*field);
            }
        }
        None
    }
}

static SPLUNK_ALIASES: &[(UnifiedField, &[&str])] = &[
    (UnifiedField::EventTs, &["time"]),
    (UnifiedField::EventType, &["sourcetype", "signature"]),
    (UnifiedField::SourceName, &["source", "index"]),
    (UnifiedField::SrcIp, &["src"]),
    (UnifiedField::DestIp, &["dest"]),
    (UnifiedField::User, &["src_user", "account_name"]),
    (UnifiedField::ProcessName, &["process"]),
    (UnifiedField::ProcessCmdline, &["cmdline", "commandline"]),
    (UnifiedField::ParentProcessName, &["parent_process"]),
    (UnifiedField::ParentPid, &["parent_process_id"]),
    (UnifiedField::DnsQuery, &["query"]),
    (UnifiedField::Outcome, &["action", "result"]),
    (UnifiedField::EventId, &["eventcode"]),
    (UnifiedField::LogonType, &["logontype"]),
    (UnifiedField::Message, &["raw"]),
];

static KUSTO_ALIASES: &[(UnifiedField, &[&str])] = &[
    (
        UnifiedField::EventTs,
        &["timegenerated", "createddatetime"],
    ),
    (UnifiedField::EventType, &["operationname"]),
    (UnifiedField::SourceName, &["sourcesystem"]),
    (
        UnifiedField::Host,
        &["computer", "devicename", "resourceid"],
    ),
    (
        UnifiedField::SrcIp,
        &["sourceip", "srcipaddr", "clientip", "calleripaddress"],
    ),
    (UnifiedField::DestIp, &["destinationip", "dstipaddr"]),
    (
        UnifiedField::User,
        &[
            "userprincipalname",
            "targetusername",
            "initiatinguser",
            "accountname",
            "account",
        ],
    ),
    (UnifiedField::ProcessName, &["processname"]),
    (UnifiedField::ProcessCmdline, &["processcommandline"]),
    (
        UnifiedField::ParentProcessName,
        &["parentprocessname", "initiatingprocessfilename"],
    ),
    (UnifiedField::ParentPid, &["parentprocessid"]),
    (UnifiedField::FilePath, &["folderpath"]),
    (UnifiedField::FileHash, &["filehash"]),
    (UnifiedField::Url, &["requesturi", "remoteurl"]),
    (UnifiedField::DnsQuery, &["dnsquery", "queryname"]),
    (UnifiedField::Outcome, &["resulttype"]),
    (UnifiedField::Message, &["resultdescription"]),
    (
        UnifiedField::LogonType,
        &["logontype", "authenticationmethod"],
    ),
    (UnifiedField::Severity, &["alertseverity"]),
    (UnifiedField::SessionId, &["correlationid"]),
    (UnifiedField::EventId, &["activityid"]),
];

static CLOUDTRAIL_ALIASES: &[(UnifiedField, &[&str])] = &[
    (UnifiedField::EventTs, &["eventtime"]),
    (UnifiedField::EventType, &["eventname", "eventtype"]),
    (UnifiedField::SourceName, &["eventsource"]),
    (UnifiedField::SrcIp, &["sourceipaddress"]),
    (
        UnifiedField::User,
        &[
            "username",
            "useridentity_username",
            "useridentity_principalid",
            "useridentity_arn",
        ],
    ),
    (
        UnifiedField::Host,
        &["awsregion", "requestparameters_instanceid"],
    ),
    (UnifiedField::SessionId, &["requestid"]),
    (UnifiedField::Outcome, &["errorcode"]),
    (UnifiedField::Message, &["errormessage", "useragent"]),
    (UnifiedField::EventId, &["eventid"]),
];

static OKTA_ALIASES: &[(UnifiedField, &[&str])] = &[
    (UnifiedField::EventTs, &["published"]),
    (UnifiedField::EventType, &["eventtype"]),
    (
        UnifiedField::Message,
        &["displaymessage", "outcome_reason"],
    ),
    (UnifiedField::Outcome, &["outcome_result"]),
    (
        UnifiedField::User,
        &["actor_alternateid", "actor_displayname"],
    ),
    (UnifiedField::SrcIp, &["client_ipaddress"]),
    (
        UnifiedField::SessionId,
        &["authenticationcontext_externalsessionid", "transaction_id"],
    ),
    (UnifiedField::EventId, &["uuid"]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn source_names_resolve_to_presets() {
        assert_eq!(SourcePreset::for_source("Splunk"), SourcePreset::Splunk);
        assert_eq!(SourcePreset::for_source("sentinel"), SourcePreset::Kusto);
        assert_eq!(
            SourcePreset::for_source("cloudtrail"),
            SourcePreset::CloudTrail
        );
        assert_eq!(SourcePreset::for_source("okta"), SourcePreset::Okta);
        assert_eq!(
            SourcePreset::for_source("palo_alto"),
            SourcePreset::Generic
        );
    }

    #[test]
    fn preset_aliases_are_exact_only() {
        assert_eq!(
            SourcePreset::Kusto.suggest("timegenerated"),
            Some(UnifiedField::EventTs)
        );
        // No substring matching at the preset layer.
        assert_eq!(SourcePreset::Kusto.suggest("timegenerated_utc"), None);
    }

    #[test]
    fn okta_nested_columns_map_after_flattening() {
        assert_eq!(
            SourcePreset::Okta.suggest("outcome_result"),
            Some(UnifiedField::Outcome)
        );
        assert_eq!(
            SourcePreset::Okta.suggest("actor_alternateid"),
            Some(UnifiedField::User)
        );
    }
}
