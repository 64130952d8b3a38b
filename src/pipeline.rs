use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::ddbj::{CrossRefCache, CrossRefResolver, JgaSearchClient};
use crate::domain::{DatasetId, Lang};
use crate::error::ConvertError;
use crate::expansion::ExpansionMap;
use crate::invert::{InvertedData, invert_tables};
use crate::meta::{self, DatasetMeta, MetadataMap, WarningCollector};
use crate::output::{
    ControlledAccessUserOut, DatasetDoc, DatasetLang, DatasetRef, PublicationOut, ResearchDoc,
    ResearchLang, ResearchVersionDoc,
};
use crate::snapshot::NormalizedParseResult;
use crate::store::Store;
use crate::version::SharedVersionAssigner;

/// Per-document result, reported by the runner at end of run.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub hum_id: String,
    pub revisions: u32,
    pub datasets_written: usize,
    /// True when every revision was absent; distinguished from failure.
    pub skipped: bool,
}

/// Drives one document id through all its revisions: extract, invert, expand,
/// resolve metadata, assign shared version labels, and emit the Research /
/// ResearchVersion / Dataset documents.
pub struct Converter<'a, C: JgaSearchClient> {
    store: &'a Store,
    client: &'a C,
    cache: &'a CrossRefCache,
    warnings: &'a WarningCollector,
    unified: bool,
}

struct LangRevision {
    snapshot: NormalizedParseResult,
    inverted: InvertedData,
    expansion: ExpansionMap,
    metadata: MetadataMap,
}

impl<'a, C: JgaSearchClient> Converter<'a, C> {
    pub fn new(
        store: &'a Store,
        client: &'a C,
        cache: &'a CrossRefCache,
        warnings: &'a WarningCollector,
        unified: bool,
    ) -> Self {
        Self {
            store,
            client,
            cache,
            warnings,
            unified,
        }
    }

    pub fn process_document(&self, hum_id: &str) -> Result<DocumentOutcome, ConvertError> {
        let max_revision = self.store.max_revision(hum_id)?;
        let mut assigner = SharedVersionAssigner::default();
        let mut research_langs: BTreeMap<Lang, ResearchLang> = BTreeMap::new();
        let mut research_versions: Vec<ResearchVersionDoc> = Vec::new();
        // Keyed by output path so a label reused across revisions stays one file.
        let mut dataset_docs: BTreeMap<String, DatasetDoc> = BTreeMap::new();
        let mut output_revisions: Vec<u32> = Vec::new();

        // Revisions are strictly sequential: every assignment depends on the
        // history accumulated from all prior revisions of this document.
        for revision in 1..=max_revision {
            let mut per_lang: BTreeMap<Lang, LangRevision> = BTreeMap::new();
            for lang in Lang::ALL {
                let Some(snapshot) = self.store.load_snapshot(hum_id, revision, lang)? else {
                    continue;
                };
                let resolver = CrossRefResolver::new(self.client, self.cache);
                let (inverted, resolutions) =
                    invert_tables(&snapshot.molecular_data, &resolver);
                let expansion = ExpansionMap::build(&resolutions);
                let metadata = MetadataMap::resolve(
                    &snapshot.dataset_metadata,
                    &snapshot.molecular_data,
                    &resolutions,
                );
                per_lang.insert(
                    lang,
                    LangRevision {
                        snapshot,
                        inverted,
                        expansion,
                        metadata,
                    },
                );
            }
            if per_lang.is_empty() {
                debug!(hum_id, revision, "revision absent in both languages");
                continue;
            }

            let revision_date = release_date_of(&per_lang, revision);
            let ids = revision_dataset_ids(&per_lang);
            let mut refs_by_lang: BTreeMap<Lang, Vec<DatasetRef>> = BTreeMap::new();

            for id in &ids {
                let ja_records = per_lang
                    .get(&Lang::Ja)
                    .map(|rev| rev.inverted.records_for(id))
                    .unwrap_or_default();
                let en_records = per_lang
                    .get(&Lang::En)
                    .map(|rev| rev.inverted.records_for(id))
                    .unwrap_or_default();

                let label = assigner.assign(id, &ja_records, &en_records);
                assigner.commit(id, &label, &ja_records, &en_records, revision_date.as_deref());
                let released = assigner
                    .release_date_for(id, &label)
                    .map(str::to_string);

                let ja_meta = lang_meta(&per_lang, Lang::Ja, id);
                let en_meta = lang_meta(&per_lang, Lang::En, id);

                let mut parts: BTreeMap<Lang, DatasetLang> = BTreeMap::new();
                for (lang, records, own_meta, other_meta) in [
                    (Lang::Ja, &ja_records, &ja_meta, &en_meta),
                    (Lang::En, &en_records, &en_meta, &ja_meta),
                ] {
                    if records.is_empty() && own_meta.is_none() {
                        // Neither content nor metadata in this language for
                        // this revision; committed to history above, but no
                        // output document.
                        continue;
                    }
                    let effective = own_meta.as_ref().or(other_meta.as_ref());
                    meta::report_missing(
                        effective,
                        id.as_str(),
                        hum_id,
                        revision,
                        lang,
                        self.warnings,
                    );
                    parts.insert(lang, dataset_lang(lang, records, effective));
                    refs_by_lang.entry(lang).or_default().push(DatasetRef {
                        id: id.clone(),
                        version: label.clone(),
                    });
                }
                if parts.is_empty() {
                    continue;
                }

                if self.unified {
                    let path = self.store.dataset_path(id, &label, None);
                    dataset_docs.insert(
                        path.to_string(),
                        DatasetDoc {
                            dataset_id: id.clone(),
                            version: label.clone(),
                            released: released.clone(),
                            lang: None,
                            content: None,
                            ja: parts.get(&Lang::Ja).cloned(),
                            en: parts.get(&Lang::En).cloned(),
                        },
                    );
                } else {
                    for (lang, part) in parts {
                        let path = self.store.dataset_path(id, &label, Some(lang));
                        dataset_docs.insert(
                            path.to_string(),
                            DatasetDoc {
                                dataset_id: id.clone(),
                                version: label.clone(),
                                released: released.clone(),
                                lang: Some(lang),
                                content: Some(part),
                                ja: None,
                                en: None,
                            },
                        );
                    }
                }
            }

            for (lang, revision_data) in &per_lang {
                let release = revision_data.snapshot.release_for(revision);
                research_versions.push(ResearchVersionDoc {
                    hum_id: hum_id.to_string(),
                    version: revision,
                    lang: *lang,
                    datasets: refs_by_lang.remove(lang).unwrap_or_default(),
                    release_date: release.and_then(|note| note.date.clone()),
                    release_note: release.and_then(|note| note.note.clone()),
                });
                research_langs.insert(*lang, research_lang(revision_data));
            }
            output_revisions.push(revision);
        }

        if output_revisions.is_empty() {
            info!(hum_id, "no snapshots in any revision; skipping document");
            return Ok(DocumentOutcome {
                hum_id: hum_id.to_string(),
                revisions: max_revision,
                datasets_written: 0,
                skipped: true,
            });
        }

        let datasets_written = dataset_docs.len();
        for (path, doc) in &dataset_docs {
            Store::write_json_atomic(camino::Utf8Path::new(path), doc)?;
        }
        for doc in &research_versions {
            let path = self
                .store
                .research_version_path(hum_id, doc.version, doc.lang);
            Store::write_json_atomic(&path, doc)?;
        }
        self.write_research(hum_id, research_langs, &output_revisions)?;

        info!(hum_id, revisions = max_revision, datasets_written, "document converted");
        Ok(DocumentOutcome {
            hum_id: hum_id.to_string(),
            revisions: max_revision,
            datasets_written,
            skipped: false,
        })
    }

    fn write_research(
        &self,
        hum_id: &str,
        mut research_langs: BTreeMap<Lang, ResearchLang>,
        output_revisions: &[u32],
    ) -> Result<(), ConvertError> {
        if self.unified {
            let doc = ResearchDoc {
                hum_id: hum_id.to_string(),
                lang: None,
                content: None,
                ja: research_langs.remove(&Lang::Ja),
                en: research_langs.remove(&Lang::En),
                versions: output_revisions.to_vec(),
            };
            let path = self.store.research_path(hum_id, None);
            Store::write_json_atomic(&path, &doc)?;
        } else {
            for (lang, content) in research_langs {
                let doc = ResearchDoc {
                    hum_id: hum_id.to_string(),
                    lang: Some(lang),
                    content: Some(content),
                    ja: None,
                    en: None,
                    versions: output_revisions.to_vec(),
                };
                let path = self.store.research_path(hum_id, Some(lang));
                Store::write_json_atomic(&path, &doc)?;
            }
        }
        Ok(())
    }
}

/// Dataset identifiers visible in one revision across both languages:
/// inversion targets first (ja order, then en additions), then dataset-level
/// identifiers that only carry published metadata.
fn revision_dataset_ids(per_lang: &BTreeMap<Lang, LangRevision>) -> Vec<DatasetId> {
    let mut ids: Vec<DatasetId> = Vec::new();
    for lang in Lang::ALL {
        if let Some(revision) = per_lang.get(&lang) {
            for id in revision.inverted.ids() {
                if !ids.contains(id) {
                    ids.push(id.clone());
                }
            }
        }
    }
    for lang in Lang::ALL {
        if let Some(revision) = per_lang.get(&lang) {
            for row in &revision.snapshot.dataset_metadata {
                if let Some(id) = DatasetId::parse(&row.id) {
                    if id.is_dataset_level() && !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
        }
    }
    ids
}

fn release_date_of(per_lang: &BTreeMap<Lang, LangRevision>, revision: u32) -> Option<String> {
    for lang in Lang::ALL {
        if let Some(date) = per_lang
            .get(&lang)
            .and_then(|rev| rev.snapshot.release_for(revision))
            .and_then(|note| note.date.clone())
        {
            return Some(date);
        }
    }
    None
}

fn lang_meta(
    per_lang: &BTreeMap<Lang, LangRevision>,
    lang: Lang,
    id: &DatasetId,
) -> Option<DatasetMeta> {
    per_lang
        .get(&lang)
        .and_then(|revision| revision.metadata.get(id.as_str()))
        .cloned()
}

fn dataset_lang(
    lang: Lang,
    records: &[crate::snapshot::RawExperimentRecord],
    meta: Option<&DatasetMeta>,
) -> DatasetLang {
    match meta {
        Some(meta) => DatasetLang {
            type_of_data: meta.type_of_data.clone(),
            criteria: meta
                .criteria
                .iter()
                .map(|criteria| criteria.display(lang).to_string())
                .collect(),
            release_dates: meta.release_dates.clone(),
            experiments: records.to_vec(),
        },
        None => DatasetLang {
            experiments: records.to_vec(),
            ..DatasetLang::default()
        },
    }
}

fn research_lang(revision: &LangRevision) -> ResearchLang {
    let snapshot = &revision.snapshot;
    let summary = snapshot.summary.as_ref();
    ResearchLang {
        title: summary.and_then(|summary| summary.title.clone()),
        url: summary.map(|summary| summary.url.clone()).unwrap_or_default(),
        publications: snapshot
            .publications
            .iter()
            .map(|publication| PublicationOut {
                title: publication.title.clone(),
                doi: publication.doi.clone(),
                datasets: revision.expansion.expand_refs(&publication.datasets),
            })
            .collect(),
        controlled_access_users: snapshot
            .controlled_access_users
            .iter()
            .map(|user| ControlledAccessUserOut {
                name: user.name.clone(),
                affiliation: user.affiliation.clone(),
                country: user.country.clone(),
                period: user.period.clone(),
                datasets: revision.expansion.expand_refs(&user.datasets),
            })
            .collect(),
    }
}
