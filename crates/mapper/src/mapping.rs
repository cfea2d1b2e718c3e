use crate::alias::{normalize_field_name, suggest_unified_field};
use crate::error::{MapperError, Result};
use crate::preset::SourcePreset;
use crate::unified::UnifiedField;
use serde::{Deserialize, Serialize};

/// One source column and the unified field it feeds, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Source field name exactly as it appears in the export.
    pub source_field: String,

    /// Unified target, `None` when the column travels to extras.
    pub target: Option<UnifiedField>,

    /// True when an analyst pinned this entry; overrides are never
    /// re-derived by later suggestion passes.
    pub overridden: bool,
}

/// A committed mapping from source columns to the unified schema.
///
/// Entries keep insertion order; that order is the tie-break when two
/// source columns name the same unified target, so it must stay stable
/// from suggestion through ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldMapping {
    preset: SourcePreset,
    entries: Vec<MappingEntry>,
}

impl FieldMapping {
    /// Suggest a mapping for the observed source field names using the
    /// generic alias table only.
    pub fn suggest<I, S>(source_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::suggest_for_preset(SourcePreset::Generic, source_fields)
    }

    /// Suggest a mapping with a source preset layered ahead of the
    /// generic table.
    pub fn suggest_for_preset<I, S>(preset: SourcePreset, source_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mapping = FieldMapping {
            preset,
            entries: Vec::new(),
        };
        mapping.extend_with(source_fields);
        mapping
    }

    /// Add suggestions for source fields not yet present. Batch mode:
    /// call once per file to map the union of field names across files.
    pub fn extend_with<I, S>(&mut self, source_fields: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field in source_fields {
            let field = field.as_ref();
            if self.entry_index(field).is_some() {
                continue;
            }
            let normalized = normalize_field_name(field);
            let target = self
                .preset
                .suggest(&normalized)
                .or_else(|| suggest_unified_field(&normalized));
            self.entries.push(MappingEntry {
                source_field: field.to_string(),
                target,
                overridden: false,
            });
        }
    }

    /// Pin a source column to a unified target (or to extras with
    /// `None`). Overrides take precedence over suggestions and survive
    /// later [`extend_with`](Self::extend_with) passes.
    pub fn set_override(&mut self, source_field: &str, target: Option<UnifiedField>) {
        match self.entry_index(source_field) {
            Some(idx) => {
                self.entries[idx].target = target;
                self.entries[idx].overridden = true;
            }
            None => self.entries.push(MappingEntry {
                source_field: source_field.to_string(),
                target,
                overridden: true,
            }),
        }
    }

    /// Unified target for a source column, if mapped.
    #[must_use]
    pub fn target_for(&self, source_field: &str) -> Option<UnifiedField> {
        self.entry_index(source_field)
            .and_then(|idx| self.entries[idx].target)
    }

    /// Entries in mapping iteration order.
    #[must_use]
    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    #[must_use]
    pub fn preset(&self) -> SourcePreset {
        self.preset
    }

    /// Required unified fields not named by any entry.
    #[must_use]
    pub fn missing_required(&self) -> Vec<UnifiedField> {
        UnifiedField::ALL
            .iter()
            .copied()
            .filter(|f| f.is_required())
            .filter(|f| !self.entries.iter().any(|e| e.target == Some(*f)))
            .collect()
    }

    /// Gate: reject the mapping before any row is processed unless both
    /// `event_ts` and `event_type` are mapped.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_required();
        if missing.is_empty() {
            return Ok(());
        }
        Err(MapperError::MissingRequiredFields(
            missing.iter().map(|f| f.name().to_string()).collect(),
        ))
    }

    /// Source columns that feed a unified target, in iteration order.
    #[must_use]
    pub fn mapped_fields(&self) -> Vec<(&str, UnifiedField)> {
        self.entries
            .iter()
            .filter_map(|e| e.target.map(|t| (e.source_field.as_str(), t)))
            .collect()
    }

    /// Source columns with no unified target (extras-bound).
    #[must_use]
    pub fn unmapped_fields(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.target.is_none())
            .map(|e| e.source_field.as_str())
            .collect()
    }

    fn entry_index(&self, source_field: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.source_field == source_field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn suggests_and_validates() {
        let mapping =
            FieldMapping::suggest(["timestamp", "action", "hostname", "weird_col"]);
        assert_eq!(
            mapping.target_for("timestamp"),
            Some(UnifiedField::EventTs)
        );
        assert_eq!(
            mapping.target_for("action"),
            Some(UnifiedField::EventType)
        );
        assert_eq!(mapping.target_for("hostname"), Some(UnifiedField::Host));
        assert_eq!(mapping.target_for("weird_col"), None);
        assert!(mapping.validate().is_ok());
    }

    #[test]
    fn missing_required_fields_fail_validation() {
        let mapping = FieldMapping::suggest(["hostname", "username"]);
        let err = mapping.validate().unwrap_err();
        match err {
            MapperError::MissingRequiredFields(missing) => {
                assert_eq!(missing, ["event_ts", "event_type"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn override_wins_and_survives_extension() {
        let mut mapping = FieldMapping::suggest(["timestamp"]);
        mapping.set_override("timestamp", Some(UnifiedField::Message));
        mapping.extend_with(["timestamp", "type"]);
        assert_eq!(
            mapping.target_for("timestamp"),
            Some(UnifiedField::Message)
        );
        assert!(mapping.entries()[0].overridden);
    }

    #[test]
    fn override_to_extras_is_respected() {
        let mut mapping = FieldMapping::suggest(["status"]);
        assert_eq!(mapping.target_for("status"), Some(UnifiedField::Outcome));
        mapping.set_override("status", None);
        assert_eq!(mapping.target_for("status"), None);
    }

    #[test]
    fn duplicate_targets_keep_iteration_order() {
        let mapping = FieldMapping::suggest(["timestamp", "created_at", "type"]);
        let mapped = mapping.mapped_fields();
        // Both sources map to event_ts; the first entry stays first so
        // the normalizer's first-entry-wins resolution is stable.
        assert_eq!(mapped[0], ("timestamp", UnifiedField::EventTs));
        assert_eq!(mapped[1], ("created_at", UnifiedField::EventTs));
    }

    #[test]
    fn preset_layer_beats_generic_table() {
        let mapping =
            FieldMapping::suggest_for_preset(SourcePreset::Kusto, ["Computer", "TimeGenerated", "Type"]);
        assert_eq!(mapping.target_for("Computer"), Some(UnifiedField::Host));
        assert_eq!(
            mapping.target_for("TimeGenerated"),
            Some(UnifiedField::EventTs)
        );
        // Falls through to the generic table.
        assert_eq!(mapping.target_for("Type"), Some(UnifiedField::EventType));
    }

    #[test]
    fn batch_union_across_files() {
        let mut mapping = FieldMapping::suggest(["timestamp", "type"]);
        let before = mapping.entries().len();
        mapping.extend_with(["timestamp", "dest_ip"]);
        assert_eq!(mapping.entries().len(), before + 1);
        assert_eq!(mapping.target_for("dest_ip"), Some(UnifiedField::DestIp));
    }
}
