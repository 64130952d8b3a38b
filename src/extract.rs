use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{DatasetId, IdKind};
use crate::snapshot::RawExperimentRecord;

/// Identifier values that match a pattern but are known scrape junk
/// (placeholder rows, template leftovers). Matches against these are
/// discarded silently, with no anomaly logged.
pub const INVALID_IDS: &[&str] = &["JGAD000000", "JGAS000000", "JGAS000999", "phs000000"];

/// Hard-coded corrections for known source-data errors. An empty replacement
/// list drops the match; multiple entries split one printed id into the ids
/// it actually denotes.
const REWRITES: &[(&str, &[&str])] = &[
    // hum0235 header prints the study id one off from the registry entry.
    ("JGAS000122", &["JGAS000123"]),
    // Split E-GEAD submission listed under a single accession.
    ("E-GEAD-205", &["E-GEAD-205", "E-GEAD-206"]),
    // Withdrawn dataset still present in an old revision's table.
    ("JGAD000110", &[]),
];

static FINDERS: LazyLock<Vec<(IdKind, Regex)>> = LazyLock::new(|| {
    IdKind::ALL
        .iter()
        .map(|kind| {
            let pattern = format!(r"\b(?:{})\b", kind.pattern_body());
            (*kind, Regex::new(&pattern).expect("static pattern"))
        })
        .collect()
});

pub fn is_invalid(value: &str) -> bool {
    INVALID_IDS.contains(&value)
}

fn rewrites_for(value: &str) -> Option<&'static [&'static str]> {
    REWRITES
        .iter()
        .find(|(from, _)| *from == value)
        .map(|(_, to)| *to)
}

/// Finds every identifier substring in one text fragment, keyed by kind.
/// Pure: no state survives a call, so repeated extraction of the same input
/// yields identical results. Absence of matches yields no entry for a kind.
pub fn extract(text: &str) -> BTreeMap<IdKind, BTreeSet<String>> {
    let mut found: BTreeMap<IdKind, BTreeSet<String>> = BTreeMap::new();
    for (_, finder) in FINDERS.iter() {
        for matched in finder.find_iter(text) {
            let value = matched.as_str();
            if is_invalid(value) {
                continue;
            }
            match rewrites_for(value) {
                Some(replacements) => {
                    for replacement in replacements {
                        if let Some(id) = DatasetId::parse(replacement) {
                            found
                                .entry(id.kind())
                                .or_default()
                                .insert(id.as_str().to_string());
                        }
                    }
                }
                None => {
                    found
                        .entry(kind_of(value))
                        .or_default()
                        .insert(value.to_string());
                }
            }
        }
    }
    found
}

/// Extraction over every text carrier of one raw record: the header cell and
/// each field value's plain text and markup.
pub fn extract_record(record: &RawExperimentRecord) -> BTreeMap<IdKind, BTreeSet<String>> {
    let mut merged: BTreeMap<IdKind, BTreeSet<String>> = BTreeMap::new();
    for carrier in record.text_carriers() {
        for (kind, values) in extract(carrier) {
            merged.entry(kind).or_default().extend(values);
        }
    }
    merged
}

fn kind_of(value: &str) -> IdKind {
    // A value that reached this point was produced by one of the finders, so
    // the full-match parse cannot fail.
    DatasetId::parse(value)
        .map(|id| id.kind())
        .expect("finder output matches a pattern")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{FieldValue, RecordField};

    #[test]
    fn finds_each_kind() {
        let text = "JGAD000456 JGAS000123 E-GEAD-420 pht004442.v1.p1 phs001554 MTBKS123 PRJDB10452";
        let found = extract(text);
        assert_eq!(found.len(), 7);
        assert!(found[&IdKind::JgaDataset].contains("JGAD000456"));
        assert!(found[&IdKind::DbGapDataset].contains("pht004442.v1.p1"));
        assert!(found[&IdKind::BioProject].contains("PRJDB10452"));
    }

    #[test]
    fn extraction_is_pure() {
        let text = "see JGAD000456 and JGAS000123 (also JGAD000456)";
        assert_eq!(extract(text), extract(text));
    }

    #[test]
    fn invalid_values_are_dropped() {
        let found = extract("JGAD000000 and JGAS000999 alongside JGAD000456");
        assert_eq!(found[&IdKind::JgaDataset].len(), 1);
        assert!(!found.contains_key(&IdKind::JgaStudy));
    }

    #[test]
    fn rewrite_replaces_and_drops() {
        let found = extract("JGAS000122 E-GEAD-205 JGAD000110");
        assert!(found[&IdKind::JgaStudy].contains("JGAS000123"));
        assert!(!found[&IdKind::JgaStudy].contains("JGAS000122"));
        let gea: Vec<&String> = found[&IdKind::GeaDataset].iter().collect();
        assert_eq!(gea, ["E-GEAD-205", "E-GEAD-206"]);
        assert!(!found.contains_key(&IdKind::JgaDataset));
    }

    #[test]
    fn no_match_yields_empty_map() {
        assert!(extract("no accessions in this sentence").is_empty());
    }

    #[test]
    fn record_extraction_reads_markup_too() {
        let record = RawExperimentRecord {
            header: "NGS data".to_string(),
            fields: vec![RecordField {
                name: "Source".to_string(),
                values: vec![FieldValue {
                    text: "deposited data".to_string(),
                    html: "<a href=\"https://ddbj.nig.ac.jp/resource/jga-dataset/JGAD000456\">deposited data</a>".to_string(),
                }],
            }],
            footers: Vec::new(),
        };
        let found = extract_record(&record);
        assert!(found[&IdKind::JgaDataset].contains("JGAD000456"));
    }
}
