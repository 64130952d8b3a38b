use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::Serialize;

use crate::domain::{DatasetId, Lang};
use crate::error::ConvertError;
use crate::output::{dataset_file_name, research_file_name, research_version_file_name};
use crate::snapshot::NormalizedParseResult;

/// Filesystem layout: normalized snapshots under the input root, emitted
/// entity documents under the output root, and the persisted cross-reference
/// cache under the cache root.
#[derive(Debug, Clone)]
pub struct Store {
    input_root: Utf8PathBuf,
    output_root: Utf8PathBuf,
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new(input_root: Utf8PathBuf, output_root: Utf8PathBuf) -> Result<Self, ConvertError> {
        let cache_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("humdb-converter"))
                    .ok()
            })
            .ok_or_else(|| {
                ConvertError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Ok(Self {
            input_root,
            output_root,
            cache_root,
        })
    }

    pub fn new_with_paths(
        input_root: Utf8PathBuf,
        output_root: Utf8PathBuf,
        cache_root: Utf8PathBuf,
    ) -> Self {
        Self {
            input_root,
            output_root,
            cache_root,
        }
    }

    pub fn input_root(&self) -> &Utf8Path {
        &self.input_root
    }

    pub fn output_root(&self) -> &Utf8Path {
        &self.output_root
    }

    pub fn xref_cache_path(&self) -> Utf8PathBuf {
        self.cache_root.join("jga-study-xrefs.json")
    }

    pub fn snapshot_path(&self, hum_id: &str, revision: u32, lang: Lang) -> Utf8PathBuf {
        self.input_root
            .join(hum_id)
            .join(format!("v{revision}"))
            .join(format!("{lang}.json"))
    }

    /// Loads one normalized snapshot. A missing file is absence, not an
    /// error; a present-but-unparseable file is an error.
    pub fn load_snapshot(
        &self,
        hum_id: &str,
        revision: u32,
        lang: Lang,
    ) -> Result<Option<NormalizedParseResult>, ConvertError> {
        let path = self.snapshot_path(hum_id, revision, lang);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        let parsed = serde_json::from_str(&content).map_err(|err| ConvertError::SnapshotParse {
            path: path.to_string(),
            message: err.to_string(),
        })?;
        Ok(Some(parsed))
    }

    /// Highest revision directory present for a document id; 0 when the
    /// document has no snapshots at all.
    pub fn max_revision(&self, hum_id: &str) -> Result<u32, ConvertError> {
        let dir = self.input_root.join(hum_id);
        if !dir.as_std_path().exists() {
            return Ok(0);
        }
        let mut max = 0u32;
        let entries = fs::read_dir(dir.as_std_path())
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| ConvertError::Filesystem(err.to_string()))?;
            let name = entry.file_name();
            let Some(revision) = name
                .to_str()
                .and_then(|value| value.strip_prefix('v'))
                .and_then(|value| value.parse::<u32>().ok())
            else {
                continue;
            };
            max = max.max(revision);
        }
        Ok(max)
    }

    /// Document ids that have at least one snapshot directory.
    pub fn list_hum_ids(&self) -> Result<Vec<String>, ConvertError> {
        if !self.input_root.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        let entries = fs::read_dir(self.input_root.as_std_path())
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| ConvertError::Filesystem(err.to_string()))?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn research_path(&self, hum_id: &str, lang: Option<Lang>) -> Utf8PathBuf {
        self.output_root
            .join("research")
            .join(research_file_name(hum_id, lang))
    }

    pub fn research_version_path(&self, hum_id: &str, revision: u32, lang: Lang) -> Utf8PathBuf {
        self.output_root
            .join("research-version")
            .join(research_version_file_name(hum_id, revision, lang))
    }

    pub fn dataset_path(&self, id: &DatasetId, version: &str, lang: Option<Lang>) -> Utf8PathBuf {
        self.output_root
            .join("dataset")
            .join(dataset_file_name(id, version, lang))
    }

    pub fn report_path(&self) -> Utf8PathBuf {
        self.output_root.join("validation-report.json")
    }

    pub fn write_json_atomic<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), ConvertError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        }
        let content = serde_json::to_vec_pretty(value)
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| ConvertError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(temp: &tempfile::TempDir) -> Store {
        let input = Utf8PathBuf::from_path_buf(temp.path().join("input")).unwrap();
        let output = Utf8PathBuf::from_path_buf(temp.path().join("output")).unwrap();
        let cache = Utf8PathBuf::from_path_buf(temp.path().join("cache")).unwrap();
        Store::new_with_paths(input, output, cache)
    }

    #[test]
    fn layout_paths() {
        let temp = tempfile::tempdir().unwrap();
        let store = store_in(&temp);
        let id = DatasetId::parse("JGAD000456").unwrap();
        assert!(
            store
                .snapshot_path("hum0197", 2, Lang::Ja)
                .ends_with("input/hum0197/v2/ja.json")
        );
        assert!(
            store
                .dataset_path(&id, "v1", Some(Lang::En))
                .ends_with("dataset/JGAD000456-v1-en.json")
        );
    }

    #[test]
    fn missing_snapshot_is_absence() {
        let temp = tempfile::tempdir().unwrap();
        let store = store_in(&temp);
        assert!(store.load_snapshot("hum0001", 1, Lang::Ja).unwrap().is_none());
        assert_eq!(store.max_revision("hum0001").unwrap(), 0);
    }

    #[test]
    fn max_revision_scans_version_directories() {
        let temp = tempfile::tempdir().unwrap();
        let store = store_in(&temp);
        for rev in [1, 2, 5] {
            let path = store.snapshot_path("hum0001", rev, Lang::Ja);
            fs::create_dir_all(path.parent().unwrap().as_std_path()).unwrap();
            fs::write(path.as_std_path(), "{}").unwrap();
        }
        assert_eq!(store.max_revision("hum0001").unwrap(), 5);
        assert_eq!(store.list_hum_ids().unwrap(), vec!["hum0001".to_string()]);
    }
}
