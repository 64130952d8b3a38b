use serde::{Deserialize, Serialize};

use crate::domain::{DatasetId, Lang};
use crate::meta::ValidationWarning;
use crate::snapshot::RawExperimentRecord;

/// One research submission. Per-language mode writes one document per
/// language; unified mode folds both languages into a single document.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchDoc {
    pub hum_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<Lang>,
    #[serde(skip_serializing_if = "Option::is_none", flatten)]
    pub content: Option<ResearchLang>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ja: Option<ResearchLang>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<ResearchLang>,
    /// Revisions that produced output, in processing order.
    pub versions: Vec<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResearchLang {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub url: Vec<String>,
    pub publications: Vec<PublicationOut>,
    pub controlled_access_users: Vec<ControlledAccessUserOut>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicationOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    /// Dataset references rewritten through the expansion map.
    pub datasets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlledAccessUserOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    pub datasets: Vec<String>,
}

/// One document revision in one language: which datasets were visible and
/// under which version label, plus the revision's own release info.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchVersionDoc {
    pub hum_id: String,
    pub version: u32,
    pub lang: Lang,
    pub datasets: Vec<DatasetRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRef {
    pub id: DatasetId,
    pub version: String,
}

/// One dataset content snapshot. Identity of the file is the
/// (dataset id, version label, language) triple. Unified mode drops the
/// language part and carries both languages in one file.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetDoc {
    pub dataset_id: DatasetId,
    pub version: String,
    /// Release date bound to the revision that introduced this snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<Lang>,
    #[serde(skip_serializing_if = "Option::is_none", flatten)]
    pub content: Option<DatasetLang>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ja: Option<DatasetLang>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en: Option<DatasetLang>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetLang {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_of_data: Option<String>,
    /// Criteria rendered to this language's display strings.
    pub criteria: Vec<String>,
    pub release_dates: Vec<String>,
    pub experiments: Vec<RawExperimentRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub generated_at: String,
    pub warnings: Vec<ValidationWarning>,
}

pub fn research_file_name(hum_id: &str, lang: Option<Lang>) -> String {
    match lang {
        Some(lang) => format!("{hum_id}-{lang}.json"),
        None => format!("{hum_id}.json"),
    }
}

pub fn research_version_file_name(hum_id: &str, revision: u32, lang: Lang) -> String {
    format!("{hum_id}-v{revision}-{lang}.json")
}

pub fn dataset_file_name(id: &DatasetId, version: &str, lang: Option<Lang>) -> String {
    match lang {
        Some(lang) => format!("{id}-{version}-{lang}.json"),
        None => format!("{id}-{version}.json"),
    }
}
