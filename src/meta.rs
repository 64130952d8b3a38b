use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{IdKind, Lang};
use crate::invert::TableResolution;
use crate::snapshot::{PublishedDatasetMeta, RawExperimentRecord};

/// Child identifiers whose metadata the source publishes only on a specific
/// parent row. Applied after seeding, before table propagation.
const META_PARENT_OVERRIDES: &[(&str, &str)] = &[
    ("JGAD000220", "JGAD000219"),
    ("E-GEAD-206", "E-GEAD-205"),
];

/// Canonical access-criteria value. Stored canonically and rendered to the
/// language-specific display string only at output time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criteria {
    Controlled,
    Unrestricted,
}

impl Criteria {
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }
        // "非制限公開" contains "制限公開"; test the unrestricted forms first.
        if lowered.contains("unrestricted") || lowered.contains("非制限公開") {
            return Some(Criteria::Unrestricted);
        }
        if lowered.contains("controlled") || lowered.contains("制限公開") {
            return Some(Criteria::Controlled);
        }
        None
    }

    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut out = Vec::new();
        for part in raw.split(['/', ',', '、']) {
            if let Some(criteria) = Self::parse(part) {
                if !out.contains(&criteria) {
                    out.push(criteria);
                }
            }
        }
        out
    }

    pub fn display(&self, lang: Lang) -> &'static str {
        match (self, lang) {
            (Criteria::Controlled, Lang::Ja) => "制限公開",
            (Criteria::Controlled, Lang::En) => "Controlled-access",
            (Criteria::Unrestricted, Lang::Ja) => "非制限公開",
            (Criteria::Unrestricted, Lang::En) => "Unrestricted-access",
        }
    }
}

/// Descriptive metadata attached to one dataset identifier within a revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetMeta {
    pub type_of_data: Option<String>,
    pub criteria: Vec<Criteria>,
    pub release_dates: Vec<String>,
}

impl DatasetMeta {
    fn from_published(row: &PublishedDatasetMeta) -> Self {
        Self {
            type_of_data: row.type_of_data.clone(),
            criteria: row
                .criteria
                .as_deref()
                .map(Criteria::parse_list)
                .unwrap_or_default(),
            release_dates: row.release_dates.clone(),
        }
    }
}

/// A metadata gap found during resolution. Never interrupts processing;
/// collected for the end-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub hum_id: String,
    pub revision: u32,
    pub lang: Lang,
    pub dataset_id: String,
    pub field: String,
}

/// Explicit warning sink passed into the pipeline, so tests and sibling
/// document tasks each get their own view of one shared collector.
#[derive(Debug, Default)]
pub struct WarningCollector {
    warnings: Mutex<Vec<ValidationWarning>>,
}

impl WarningCollector {
    pub fn push(&self, warning: ValidationWarning) {
        self.warnings
            .lock()
            .expect("warning mutex poisoned")
            .push(warning);
    }

    pub fn snapshot(&self) -> Vec<ValidationWarning> {
        self.warnings
            .lock()
            .expect("warning mutex poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().expect("warning mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Owner cells mix archive accessions with NBDC dotted ids such as
// "hum0197.v12.MAG.v1", which match none of the seven archive patterns.
static OWNER_ID: LazyLock<Regex> = LazyLock::new(|| {
    let archive = IdKind::ALL
        .iter()
        .map(|kind| kind.pattern_body().to_string())
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"\b(?:hum\d{{4,}}(?:\.[A-Za-z0-9-]+)*|{archive})\b");
    Regex::new(&pattern).expect("static pattern")
});

pub fn owner_identifier(header: &str) -> Option<String> {
    OWNER_ID.find(header).map(|m| m.as_str().to_string())
}

/// Resolved metadata for one (revision, language), keyed by identifier string
/// as printed (archive accessions and NBDC dotted ids alike).
#[derive(Debug, Clone, Default)]
pub struct MetadataMap {
    entries: HashMap<String, DatasetMeta>,
}

impl MetadataMap {
    /// Three passes: seed from the published table, copy through the explicit
    /// parent override table, then propagate each table owner's metadata to
    /// the dataset identifiers extracted from that table.
    pub fn resolve(
        published: &[PublishedDatasetMeta],
        tables: &[RawExperimentRecord],
        resolutions: &[TableResolution],
    ) -> Self {
        let mut entries: HashMap<String, DatasetMeta> = HashMap::new();

        for row in published {
            let meta = DatasetMeta::from_published(row);
            entries
                .entry(row.id.trim().to_string())
                .and_modify(|existing| merge_into(existing, &meta))
                .or_insert(meta);
        }

        for (child, parent) in META_PARENT_OVERRIDES {
            if !entries.contains_key(*child) {
                if let Some(parent_meta) = entries.get(*parent).cloned() {
                    entries.insert((*child).to_string(), parent_meta);
                }
            }
        }

        for (table, resolution) in tables.iter().zip(resolutions) {
            let Some(owner) = owner_identifier(&table.header) else {
                continue;
            };
            let Some(owner_meta) = resolve_prefix(&mut entries, &owner) else {
                continue;
            };
            for target in &resolution.targets {
                entries
                    .entry(target.as_str().to_string())
                    .or_insert_with(|| owner_meta.clone());
            }
        }

        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&DatasetMeta> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Direct lookup, then strictly shortening dot-delimited prefixes. A prefix
/// hit is cached back under the full identifier. Terminates in at most the
/// number of dot segments.
fn resolve_prefix(entries: &mut HashMap<String, DatasetMeta>, id: &str) -> Option<DatasetMeta> {
    if let Some(meta) = entries.get(id) {
        return Some(meta.clone());
    }
    let mut prefix = id;
    while let Some(pos) = prefix.rfind('.') {
        prefix = &prefix[..pos];
        if let Some(meta) = entries.get(prefix) {
            let found = meta.clone();
            entries.insert(id.to_string(), found.clone());
            return Some(found);
        }
    }
    None
}

fn merge_into(existing: &mut DatasetMeta, incoming: &DatasetMeta) {
    if existing.type_of_data.is_none() {
        existing.type_of_data = incoming.type_of_data.clone();
    }
    for criteria in &incoming.criteria {
        if !existing.criteria.contains(criteria) {
            existing.criteria.push(*criteria);
        }
    }
    for date in &incoming.release_dates {
        if !existing.release_dates.contains(date) {
            existing.release_dates.push(date.clone());
        }
    }
}

/// Records one warning per missing field for a dataset that ended the three
/// passes (and any cross-language fallback) without metadata.
pub fn report_missing(
    meta: Option<&DatasetMeta>,
    dataset_id: &str,
    hum_id: &str,
    revision: u32,
    lang: Lang,
    collector: &WarningCollector,
) {
    let missing: Vec<&str> = match meta {
        None => vec!["type_of_data", "criteria", "release_dates"],
        Some(meta) => {
            let mut fields = Vec::new();
            if meta.type_of_data.is_none() {
                fields.push("type_of_data");
            }
            if meta.criteria.is_empty() {
                fields.push("criteria");
            }
            if meta.release_dates.is_empty() {
                fields.push("release_dates");
            }
            fields
        }
    };
    for field in missing {
        collector.push(ValidationWarning {
            hum_id: hum_id.to_string(),
            revision,
            lang,
            dataset_id: dataset_id.to_string(),
            field: field.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DatasetId;
    use crate::snapshot::{FieldValue, RecordField};
    use std::collections::{BTreeMap, BTreeSet};

    fn published(id: &str, type_of_data: &str) -> PublishedDatasetMeta {
        PublishedDatasetMeta {
            id: id.to_string(),
            type_of_data: Some(type_of_data.to_string()),
            criteria: Some("Controlled-access".to_string()),
            release_dates: vec!["2024-02-01".to_string()],
        }
    }

    fn table_with(header: &str, ids: &[&str]) -> (RawExperimentRecord, TableResolution) {
        let record = RawExperimentRecord {
            header: header.to_string(),
            fields: vec![RecordField {
                name: "IDs".to_string(),
                values: ids
                    .iter()
                    .map(|id| FieldValue {
                        text: (*id).to_string(),
                        html: String::new(),
                    })
                    .collect(),
            }],
            footers: Vec::new(),
        };
        let mut extracted: BTreeMap<IdKind, BTreeSet<String>> = BTreeMap::new();
        let mut targets = Vec::new();
        for id in ids {
            let parsed = DatasetId::parse(id).unwrap();
            extracted
                .entry(parsed.kind())
                .or_default()
                .insert(parsed.as_str().to_string());
            targets.push(parsed);
        }
        (record, TableResolution { extracted, targets })
    }

    #[test]
    fn criteria_parse_prefers_unrestricted_over_substring() {
        assert_eq!(Criteria::parse("非制限公開"), Some(Criteria::Unrestricted));
        assert_eq!(Criteria::parse("制限公開"), Some(Criteria::Controlled));
        assert_eq!(
            Criteria::parse_list("Controlled-access / Unrestricted-access"),
            vec![Criteria::Controlled, Criteria::Unrestricted]
        );
    }

    #[test]
    fn dot_prefix_inheritance_terminates_and_caches() {
        let mut entries = HashMap::new();
        entries.insert(
            "hum0197.v12".to_string(),
            DatasetMeta {
                type_of_data: Some("Metagenome".to_string()),
                criteria: vec![Criteria::Controlled],
                release_dates: vec!["2021-03-01".to_string()],
            },
        );
        let meta = resolve_prefix(&mut entries, "hum0197.v12.MAG.v1").unwrap();
        assert_eq!(meta.type_of_data.as_deref(), Some("Metagenome"));
        // Cached back under the full id.
        assert!(entries.contains_key("hum0197.v12.MAG.v1"));
        assert!(resolve_prefix(&mut entries, "hum0300.v1").is_none());
    }

    #[test]
    fn table_owner_metadata_propagates_to_extracted_ids() {
        let (record, resolution) = table_with("hum0197.v12.MAG.v1", &["JGAD000456", "PRJDB10452"]);
        let map = MetadataMap::resolve(
            &[published("hum0197.v12", "Metagenome")],
            &[record],
            &[resolution],
        );
        assert_eq!(
            map.get("JGAD000456").unwrap().type_of_data.as_deref(),
            Some("Metagenome")
        );
        assert_eq!(
            map.get("PRJDB10452").unwrap().criteria,
            vec![Criteria::Controlled]
        );
    }

    #[test]
    fn direct_entry_wins_over_propagation() {
        let (record, resolution) = table_with("hum0197.v12", &["JGAD000456"]);
        let map = MetadataMap::resolve(
            &[
                published("hum0197.v12", "Metagenome"),
                published("JGAD000456", "WGS"),
            ],
            &[record],
            &[resolution],
        );
        assert_eq!(
            map.get("JGAD000456").unwrap().type_of_data.as_deref(),
            Some("WGS")
        );
    }

    #[test]
    fn parent_override_copies_metadata() {
        let map = MetadataMap::resolve(&[published("JGAD000219", "SNP array")], &[], &[]);
        assert_eq!(
            map.get("JGAD000220").unwrap().type_of_data.as_deref(),
            Some("SNP array")
        );
    }

    #[test]
    fn missing_metadata_is_collected_not_raised() {
        let collector = WarningCollector::default();
        report_missing(None, "JGAD000456", "hum0001", 2, Lang::En, &collector);
        let warnings = collector.snapshot();
        assert_eq!(warnings.len(), 3);
        assert_eq!(warnings[0].dataset_id, "JGAD000456");
        assert_eq!(warnings[0].revision, 2);
    }
}
