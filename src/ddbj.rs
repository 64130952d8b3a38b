use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;
use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::warn;

use crate::domain::{DatasetId, IdKind};
use crate::error::ConvertError;

/// Cross-reference relation type we care about in a study entry.
const WANTED_XREF_TYPE: &str = "jga-dataset";

/// Studies the registry is known to map to nothing. Lookups short-circuit and
/// the empty result is not treated as an anomaly.
const STUDIES_WITH_NO_DATASETS: &[&str] = &["JGAS000060", "JGAS000083"];

/// Datasets the registry is known to omit from a study entry; unioned into
/// every resolution result for that study.
const EXTRA_STUDY_DATASETS: &[(&str, &[&str])] = &[("JGAS000321", &["JGAD000477"])];

#[derive(Debug, Clone, Deserialize)]
pub struct StudyEntry {
    pub found: bool,
    #[serde(default, rename = "dbXrefs")]
    pub db_xrefs: Vec<DbXref>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbXref {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

pub trait JgaSearchClient: Send + Sync {
    /// Fetches the search-registry document for one study. `Ok(None)` means
    /// the registry has no entry (404); transport or server failures are
    /// errors and left to the caller to degrade.
    fn fetch_study(&self, study_id: &str) -> Result<Option<StudyEntry>, ConvertError>;
}

#[derive(Clone)]
pub struct DdbjHttpClient {
    client: Client,
    base_url: String,
}

impl DdbjHttpClient {
    pub fn new() -> Result<Self, ConvertError> {
        Self::with_base_url("https://ddbj.nig.ac.jp/search".to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self, ConvertError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("humdb-conv/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ConvertError::DdbjHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ConvertError::DdbjHttp(err.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, ConvertError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(ConvertError::DdbjHttp(err.to_string()));
                }
            }
        }
    }
}

impl JgaSearchClient for DdbjHttpClient {
    fn fetch_study(&self, study_id: &str) -> Result<Option<StudyEntry>, ConvertError> {
        let url = format!("{}/entry/jga-study/{}.json", self.base_url, study_id);
        let response = self.send_with_retries(|| self.client.get(&url))?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "DDBJ search request failed".to_string());
            return Err(ConvertError::DdbjStatus { status, message });
        }
        let entry: StudyEntry = response
            .json()
            .map_err(|err| ConvertError::DdbjHttp(err.to_string()))?;
        Ok(Some(entry))
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Study -> datasets mapping cache, shared between concurrent document tasks
/// and persisted across runs. Entries are idempotent: re-resolving a study
/// yields the same list, so a racing double-insert is harmless.
#[derive(Debug, Default)]
pub struct CrossRefCache {
    entries: Mutex<HashMap<String, Vec<String>>>,
}

impl CrossRefCache {
    pub fn load(path: &Utf8Path) -> Result<Self, ConvertError> {
        if !path.as_std_path().exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        let entries: HashMap<String, Vec<String>> = serde_json::from_str(&content)
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        Ok(Self {
            entries: Mutex::new(entries),
        })
    }

    pub fn save(&self, path: &Utf8Path) -> Result<(), ConvertError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        }
        let entries = self.entries.lock().expect("cache mutex poisoned");
        let content = serde_json::to_vec_pretty(&*entries)
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn get(&self, study_id: &str) -> Option<Vec<String>> {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .get(study_id)
            .cloned()
    }

    pub fn insert(&self, study_id: &str, datasets: Vec<String>) {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .insert(study_id.to_string(), datasets);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves study-level identifiers to the dataset identifiers they enumerate.
/// Never fails the enclosing pipeline: transport failures degrade to "no
/// mapping known".
pub struct CrossRefResolver<'a, C: JgaSearchClient> {
    client: &'a C,
    cache: &'a CrossRefCache,
}

impl<'a, C: JgaSearchClient> CrossRefResolver<'a, C> {
    pub fn new(client: &'a C, cache: &'a CrossRefCache) -> Self {
        Self { client, cache }
    }

    pub fn resolve(&self, study_id: &str) -> Vec<DatasetId> {
        if let Some(cached) = self.cache.get(study_id) {
            return parse_ids(&cached);
        }

        let mut resolved: Vec<String> = Vec::new();
        if STUDIES_WITH_NO_DATASETS.contains(&study_id) {
            // Known-empty; skip the lookup entirely.
        } else {
            let mut lookup_failed = false;
            match self.client.fetch_study(study_id) {
                Ok(Some(entry)) if entry.found => {
                    for xref in entry.db_xrefs {
                        if xref.kind == WANTED_XREF_TYPE
                            && DatasetId::parse(&xref.identifier)
                                .is_some_and(|id| id.kind() == IdKind::JgaDataset)
                            && !resolved.contains(&xref.identifier)
                        {
                            resolved.push(xref.identifier);
                        }
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(study_id, error = %err, "DDBJ lookup failed; treating as no mapping");
                    lookup_failed = true;
                }
            }
            // The anomaly is a *successful* lookup that maps to nothing; a
            // failed lookup was already logged above.
            if resolved.is_empty() && !lookup_failed {
                warn!(study_id, "study resolved to zero datasets outside the known-empty list");
            }
        }

        for (study, extras) in EXTRA_STUDY_DATASETS {
            if *study == study_id {
                for extra in *extras {
                    if !resolved.iter().any(|value| value == extra) {
                        resolved.push((*extra).to_string());
                    }
                }
            }
        }

        self.cache.insert(study_id, resolved.clone());
        parse_ids(&resolved)
    }
}

fn parse_ids(values: &[String]) -> Vec<DatasetId> {
    values
        .iter()
        .filter_map(|value| DatasetId::parse(value))
        .collect()
}
