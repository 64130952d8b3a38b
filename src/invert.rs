use std::collections::BTreeMap;
use std::collections::BTreeSet;

use tracing::warn;

use crate::ddbj::{CrossRefResolver, JgaSearchClient};
use crate::domain::{DatasetId, IdKind};
use crate::extract::{self, is_invalid};
use crate::snapshot::RawExperimentRecord;

/// Identifier view of one raw table: everything extracted from it plus the
/// dataset identifiers the table was resolved into.
#[derive(Debug, Clone)]
pub struct TableResolution {
    pub extracted: BTreeMap<IdKind, BTreeSet<String>>,
    pub targets: Vec<DatasetId>,
}

/// The inverted join: canonical dataset identifier -> raw experiment records,
/// in table order of first appearance. One record may appear under several
/// identifiers; the join is many-to-many.
#[derive(Debug, Clone, Default)]
pub struct InvertedData {
    entries: Vec<(DatasetId, Vec<RawExperimentRecord>)>,
}

impl InvertedData {
    pub fn ids(&self) -> impl Iterator<Item = &DatasetId> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn get(&self, id: &DatasetId) -> Option<&[RawExperimentRecord]> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, records)| records.as_slice())
    }

    pub fn records_for(&self, id: &DatasetId) -> Vec<RawExperimentRecord> {
        self.get(id).map(<[_]>::to_vec).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, id: &DatasetId, record: &RawExperimentRecord) {
        match self.entries.iter_mut().find(|(entry_id, _)| entry_id == id) {
            Some((_, records)) => records.push(record.clone()),
            None => self.entries.push((id.clone(), vec![record.clone()])),
        }
    }
}

/// Inverts the ordered raw-table list of one revision into per-dataset record
/// lists, resolving study-level identifiers along the way.
pub fn invert_tables<C: JgaSearchClient>(
    tables: &[RawExperimentRecord],
    resolver: &CrossRefResolver<'_, C>,
) -> (InvertedData, Vec<TableResolution>) {
    let mut inverted = InvertedData::default();
    let mut resolutions = Vec::with_capacity(tables.len());

    for table in tables {
        let extracted = extract::extract_record(table);
        let mut targets: Vec<DatasetId> = Vec::new();

        for (kind, values) in &extracted {
            if !kind.is_dataset_level() {
                continue;
            }
            for value in values {
                if let Some(id) = DatasetId::parse(value) {
                    push_unique(&mut targets, id);
                }
            }
        }

        if let Some(studies) = extracted.get(&IdKind::JgaStudy) {
            for study in studies {
                if is_invalid(study) {
                    continue;
                }
                let resolved = resolver.resolve(study);
                if resolved.is_empty() {
                    // No mapping known anywhere; the study id itself stands in
                    // for the dataset so the table is not lost.
                    warn!(study = study.as_str(), "unresolved study kept as dataset identifier");
                    if let Some(id) = DatasetId::parse(study) {
                        push_unique(&mut targets, id);
                    }
                } else {
                    for id in resolved {
                        push_unique(&mut targets, id);
                    }
                }
            }
        }

        for id in &targets {
            inverted.push(id, table);
        }
        resolutions.push(TableResolution { extracted, targets });
    }

    (inverted, resolutions)
}

fn push_unique(targets: &mut Vec<DatasetId>, id: DatasetId) {
    if !targets.contains(&id) {
        targets.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddbj::{CrossRefCache, StudyEntry};
    use crate::error::ConvertError;
    use crate::snapshot::{FieldValue, RecordField};

    struct MapClient {
        mappings: Vec<(&'static str, Vec<&'static str>)>,
    }

    impl JgaSearchClient for MapClient {
        fn fetch_study(&self, study_id: &str) -> Result<Option<StudyEntry>, ConvertError> {
            let Some((_, datasets)) = self
                .mappings
                .iter()
                .find(|(study, _)| *study == study_id)
            else {
                return Ok(None);
            };
            Ok(Some(StudyEntry {
                found: true,
                db_xrefs: datasets
                    .iter()
                    .map(|id| crate::ddbj::DbXref {
                        kind: "jga-dataset".to_string(),
                        identifier: (*id).to_string(),
                    })
                    .collect(),
            }))
        }
    }

    fn table(header: &str, value: &str) -> RawExperimentRecord {
        RawExperimentRecord {
            header: header.to_string(),
            fields: vec![RecordField {
                name: "IDs".to_string(),
                values: vec![FieldValue {
                    text: value.to_string(),
                    html: String::new(),
                }],
            }],
            footers: Vec::new(),
        }
    }

    #[test]
    fn direct_and_resolved_identifiers_share_the_record() {
        let client = MapClient {
            mappings: vec![("JGAS000123", vec!["JGAD000456", "JGAD000457"])],
        };
        let cache = CrossRefCache::default();
        let resolver = CrossRefResolver::new(&client, &cache);

        let tables = vec![table("PRJDB10452", "JGAS000123")];
        let (inverted, resolutions) = invert_tables(&tables, &resolver);

        let ids: Vec<&str> = inverted.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["PRJDB10452", "JGAD000456", "JGAD000457"]);
        for id in inverted.ids() {
            assert_eq!(inverted.get(id).unwrap(), &tables[..]);
        }
        assert_eq!(resolutions[0].targets.len(), 3);
    }

    #[test]
    fn known_invalid_study_contributes_nothing() {
        let client = MapClient { mappings: vec![] };
        let cache = CrossRefCache::default();
        let resolver = CrossRefResolver::new(&client, &cache);

        let tables = vec![table("JGAD000456", "JGAS000999")];
        let (inverted, _) = invert_tables(&tables, &resolver);
        let ids: Vec<&str> = inverted.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["JGAD000456"]);
    }

    #[test]
    fn unresolved_study_falls_back_to_itself() {
        let client = MapClient { mappings: vec![] };
        let cache = CrossRefCache::default();
        let resolver = CrossRefResolver::new(&client, &cache);

        let tables = vec![table("Genotype data", "JGAS000777")];
        let (inverted, _) = invert_tables(&tables, &resolver);
        let ids: Vec<&str> = inverted.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["JGAS000777"]);
    }

    #[test]
    fn first_appearance_order_is_kept_across_tables() {
        let client = MapClient { mappings: vec![] };
        let cache = CrossRefCache::default();
        let resolver = CrossRefResolver::new(&client, &cache);

        let tables = vec![
            table("E-GEAD-420", "JGAD000456"),
            table("JGAD000456", "MTBKS123"),
        ];
        let (inverted, _) = invert_tables(&tables, &resolver);
        let ids: Vec<&str> = inverted.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["JGAD000456", "E-GEAD-420", "MTBKS123"]);
        let jgad = DatasetId::parse("JGAD000456").unwrap();
        assert_eq!(inverted.get(&jgad).unwrap().len(), 2);
    }
}
