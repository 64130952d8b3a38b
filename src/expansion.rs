use std::collections::{BTreeMap, BTreeSet};

use crate::domain::DatasetId;
use crate::invert::TableResolution;

/// Per-revision lookup from any identifier string to the full set of dataset
/// identifiers it co-occurs with inside a shared raw table. Used to rewrite
/// loose identifier mentions in publication and controlled-access-user lists
/// so a reference to a study expands to every dataset the table represents.
///
/// Deliberately NOT transitively closed across tables: two identifiers that
/// never share a table stay unrelated even when a third identifier links them
/// through separate tables.
#[derive(Debug, Clone, Default)]
pub struct ExpansionMap {
    map: BTreeMap<String, BTreeSet<DatasetId>>,
}

impl ExpansionMap {
    pub fn build(resolutions: &[TableResolution]) -> Self {
        let mut map: BTreeMap<String, BTreeSet<DatasetId>> = BTreeMap::new();
        for resolution in resolutions {
            let targets: BTreeSet<DatasetId> = resolution.targets.iter().cloned().collect();
            if targets.is_empty() {
                continue;
            }
            // Keys are the printed identifiers plus the resolved targets
            // themselves, so datasets that entered the table only via study
            // resolution expand to their co-resolved siblings too.
            let mut keys: BTreeSet<String> = resolution
                .extracted
                .values()
                .flatten()
                .cloned()
                .collect();
            keys.extend(targets.iter().map(|id| id.as_str().to_string()));
            for key in keys {
                map.entry(key).or_default().extend(targets.iter().cloned());
            }
        }
        Self { map }
    }

    pub fn expand(&self, reference: &str) -> Option<&BTreeSet<DatasetId>> {
        self.map.get(reference)
    }

    /// Rewrites a loose reference list. Known identifiers are replaced by
    /// their expansion set; unknown mentions are kept as printed. Duplicates
    /// are removed preserving first appearance.
    pub fn expand_refs(&self, references: &[String]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for reference in references {
            match self.expand(reference.trim()) {
                Some(targets) => {
                    for target in targets {
                        push_unique(&mut out, target.as_str());
                    }
                }
                None => push_unique(&mut out, reference.trim()),
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn push_unique(out: &mut Vec<String>, value: &str) {
    if !out.iter().any(|existing| existing == value) {
        out.push(value.to_string());
    }
}
