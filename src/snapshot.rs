use serde::{Deserialize, Serialize};

/// One normalized per-(hum id, revision, language) snapshot as produced by the
/// external HTML parser. Read-only input to this crate; nothing here is ever
/// mutated after loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedParseResult {
    #[serde(default)]
    pub summary: Option<Summary>,
    #[serde(default)]
    pub molecular_data: Vec<RawExperimentRecord>,
    #[serde(default)]
    pub dataset_metadata: Vec<PublishedDatasetMeta>,
    #[serde(default)]
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub controlled_access_users: Vec<ControlledAccessUser>,
    #[serde(default)]
    pub releases: Vec<ReleaseNote>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub aims: Option<String>,
    #[serde(default)]
    pub methods: Option<String>,
    #[serde(default)]
    pub targets: Option<String>,
    #[serde(default)]
    pub url: Vec<String>,
}

/// One molecular-data block scraped from a document revision. The `header`
/// cell carries the block's own declared identifier text; field values keep
/// both the plain text and the raw markup because either may contain an
/// identifier the other lacks (links especially).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExperimentRecord {
    pub header: String,
    #[serde(default)]
    pub fields: Vec<RecordField>,
    #[serde(default)]
    pub footers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    #[serde(default)]
    pub values: Vec<FieldValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub html: String,
}

impl RawExperimentRecord {
    /// Every text fragment of this record that may carry an identifier:
    /// the header cell plus each field value's text and markup.
    pub fn text_carriers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.header.as_str()).chain(self.fields.iter().flat_map(|field| {
            field
                .values
                .iter()
                .flat_map(|value| [value.text.as_str(), value.html.as_str()])
        }))
    }
}

/// Row of the published dataset-metadata table. Keys are identifier strings
/// as printed, which includes NBDC-style dotted ids (`hum0197.v12.MAG.v1`)
/// alongside archive accessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishedDatasetMeta {
    pub id: String,
    #[serde(default)]
    pub type_of_data: Option<String>,
    #[serde(default)]
    pub criteria: Option<String>,
    #[serde(default)]
    pub release_dates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    /// Loose identifier mentions as printed in the publication list; rewritten
    /// through the expansion map at output time.
    #[serde(default)]
    pub datasets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlledAccessUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub datasets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseNote {
    pub version: u32,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl NormalizedParseResult {
    /// Release entry for one revision, when the scraped release-note table
    /// carries it.
    pub fn release_for(&self, revision: u32) -> Option<&ReleaseNote> {
        self.releases.iter().find(|note| note.version == revision)
    }
}
