use std::collections::HashMap;

use crate::domain::{DatasetId, Lang};
use crate::snapshot::RawExperimentRecord;

/// Append-only version history for one (dataset, language) key: the
/// single-language form of [`SharedVersionAssigner`], which the pipeline
/// drives exclusively. Labels are compared by the snapshot they were
/// assigned for, never by label text.
///
/// `assign` only decides; recording is the caller's explicit `commit`,
/// performed once per revision right after the decision. The split exists
/// because bilingual synchronization must decide a label from both languages
/// before committing either.
#[derive(Debug, Default)]
pub(crate) struct VersionAssigner {
    history: HashMap<(DatasetId, Lang), Vec<HistoryEntry>>,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    label: String,
    snapshot: Vec<RawExperimentRecord>,
}

impl VersionAssigner {
    pub fn assign(&self, id: &DatasetId, lang: Lang, experiments: &[RawExperimentRecord]) -> String {
        let key = (id.clone(), lang);
        let Some(entries) = self.history.get(&key) else {
            return "v1".to_string();
        };
        for entry in entries {
            if entry.snapshot == experiments {
                return entry.label.clone();
            }
        }
        format!("v{}", entries.len() + 1)
    }

    pub fn commit(
        &mut self,
        id: &DatasetId,
        lang: Lang,
        label: &str,
        experiments: &[RawExperimentRecord],
    ) {
        let entries = self.history.entry((id.clone(), lang)).or_default();
        if entries.iter().any(|entry| entry.label == label) {
            return;
        }
        entries.push(HistoryEntry {
            label: label.to_string(),
            snapshot: experiments.to_vec(),
        });
    }
}

/// Bilingual variant: one history per dataset, each entry recording the
/// matched (ja, en) snapshot pair. An entry matches only when BOTH languages'
/// snapshots are deep-equal to the stored pair, so one shared label means
/// "no change in either language".
#[derive(Debug, Default)]
pub struct SharedVersionAssigner {
    history: HashMap<DatasetId, Vec<SharedEntry>>,
}

#[derive(Debug, Clone)]
struct SharedEntry {
    label: String,
    ja: Vec<RawExperimentRecord>,
    en: Vec<RawExperimentRecord>,
    released: Option<String>,
}

impl SharedVersionAssigner {
    pub fn assign(
        &self,
        id: &DatasetId,
        ja: &[RawExperimentRecord],
        en: &[RawExperimentRecord],
    ) -> String {
        let Some(entries) = self.history.get(id) else {
            return "v1".to_string();
        };
        for entry in entries {
            if entry.ja == ja && entry.en == en {
                return entry.label.clone();
            }
        }
        format!("v{}", entries.len() + 1)
    }

    pub fn commit(
        &mut self,
        id: &DatasetId,
        label: &str,
        ja: &[RawExperimentRecord],
        en: &[RawExperimentRecord],
        released: Option<&str>,
    ) {
        let entries = self.history.entry(id.clone()).or_default();
        if entries.iter().any(|entry| entry.label == label) {
            return;
        }
        entries.push(SharedEntry {
            label: label.to_string(),
            ja: ja.to_vec(),
            en: en.to_vec(),
            released: released.map(str::to_string),
        });
    }

    /// Release date bound to the revision that introduced a label.
    pub fn release_date_for(&self, id: &DatasetId, label: &str) -> Option<&str> {
        self.history
            .get(id)?
            .iter()
            .find(|entry| entry.label == label)?
            .released
            .as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{FieldValue, RecordField};

    fn record(marker: &str) -> RawExperimentRecord {
        RawExperimentRecord {
            header: "JGAD000456".to_string(),
            fields: vec![RecordField {
                name: "Platform".to_string(),
                values: vec![FieldValue {
                    text: marker.to_string(),
                    html: String::new(),
                }],
            }],
            footers: Vec::new(),
        }
    }

    fn id() -> DatasetId {
        DatasetId::parse("JGAD000456").unwrap()
    }

    #[test]
    fn labels_are_monotonic_over_distinct_snapshots() {
        let mut assigner = VersionAssigner::default();
        let snapshots = [
            vec![record("a")],
            vec![record("b")],
            vec![record("a")],
            vec![record("c")],
        ];
        let mut labels = Vec::new();
        for snapshot in &snapshots {
            let label = assigner.assign(&id(), Lang::Ja, snapshot);
            assigner.commit(&id(), Lang::Ja, &label, snapshot);
            labels.push(label);
        }
        assert_eq!(labels, ["v1", "v2", "v1", "v3"]);
    }

    #[test]
    fn assign_is_idempotent_without_commit() {
        let mut assigner = VersionAssigner::default();
        assigner.commit(&id(), Lang::Ja, "v1", &[record("a")]);
        let snapshot = vec![record("b")];
        let first = assigner.assign(&id(), Lang::Ja, &snapshot);
        let second = assigner.assign(&id(), Lang::Ja, &snapshot);
        assert_eq!(first, "v2");
        assert_eq!(first, second);
    }

    #[test]
    fn unchanged_content_keeps_its_label_across_revisions() {
        let mut assigner = VersionAssigner::default();
        let snapshot = vec![record("a")];
        let label = assigner.assign(&id(), Lang::Ja, &snapshot);
        assigner.commit(&id(), Lang::Ja, &label, &snapshot);
        assert_eq!(assigner.assign(&id(), Lang::Ja, &snapshot), "v1");
    }

    #[test]
    fn languages_version_independently_in_the_per_lang_assigner() {
        let mut assigner = VersionAssigner::default();
        assigner.commit(&id(), Lang::Ja, "v1", &[record("a")]);
        assert_eq!(assigner.assign(&id(), Lang::En, &[record("a")]), "v1");
    }

    #[test]
    fn shared_label_advances_when_either_language_changes() {
        let mut assigner = SharedVersionAssigner::default();
        let ja1 = vec![record("ja-a")];
        let en1 = vec![record("en-a")];
        let label = assigner.assign(&id(), &ja1, &en1);
        assert_eq!(label, "v1");
        assigner.commit(&id(), &label, &ja1, &en1, Some("2024-01-10"));

        // ja changes, en does not: shared label still advances.
        let ja2 = vec![record("ja-b")];
        let label = assigner.assign(&id(), &ja2, &en1);
        assert_eq!(label, "v2");
        assigner.commit(&id(), &label, &ja2, &en1, Some("2024-06-01"));

        // Both unchanged: the matching pair's label is reused.
        assert_eq!(assigner.assign(&id(), &ja2, &en1), "v2");
        assert_eq!(assigner.assign(&id(), &ja1, &en1), "v1");

        assert_eq!(assigner.release_date_for(&id(), "v1"), Some("2024-01-10"));
        assert_eq!(assigner.release_date_for(&id(), "v2"), Some("2024-06-01"));
    }

    #[test]
    fn commit_is_a_no_op_for_an_existing_label() {
        let mut assigner = SharedVersionAssigner::default();
        let ja = vec![record("a")];
        assigner.commit(&id(), "v1", &ja, &[], Some("2024-01-10"));
        assigner.commit(&id(), "v1", &ja, &[], Some("2025-01-10"));
        assert_eq!(assigner.release_date_for(&id(), "v1"), Some("2024-01-10"));
    }
}
