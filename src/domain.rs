use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConvertError;

/// Language edition of a scraped document. The ja and en pages are crawled
/// independently and may disagree on content for any given revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Ja,
    En,
}

impl Lang {
    pub const ALL: [Lang; 2] = [Lang::Ja, Lang::En];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::Ja => "ja",
            Lang::En => "en",
        }
    }

    pub fn other(&self) -> Lang {
        match self {
            Lang::Ja => Lang::En,
            Lang::En => Lang::Ja,
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Lang {
    type Err = ConvertError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "ja" => Ok(Lang::Ja),
            "en" => Ok(Lang::En),
            other => Err(ConvertError::InvalidLang(other.to_string())),
        }
    }
}

/// Stable identifier of one research submission (`hum0001`, `hum0197`, ...),
/// independent of revision and language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HumId(String);

impl HumId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HumId {
    type Err = ConvertError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let digits = normalized.strip_prefix("hum").unwrap_or("");
        let is_valid = digits.len() >= 4 && digits.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(ConvertError::InvalidHumId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Archive an identifier belongs to. The tag is derived purely from the
/// pattern an identifier matches; it is never stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdKind {
    /// JGA dataset (JGAD...). Primary archive identifier; directly denotes a dataset.
    JgaDataset,
    /// JGA study (JGAS...). Study-level; enumerates datasets via the DDBJ search registry.
    JgaStudy,
    /// Genomic Expression Archive dataset (E-GEAD-...).
    GeaDataset,
    /// dbGaP phenotype table (pht...).
    DbGapDataset,
    /// dbGaP study accession (phs...).
    DbGapStudy,
    /// MetaboBank study (MTBKS...).
    MetaboBank,
    /// DDBJ BioProject (PRJDB...).
    BioProject,
}

impl IdKind {
    pub const ALL: [IdKind; 7] = [
        IdKind::JgaDataset,
        IdKind::JgaStudy,
        IdKind::GeaDataset,
        IdKind::DbGapDataset,
        IdKind::DbGapStudy,
        IdKind::MetaboBank,
        IdKind::BioProject,
    ];

    /// Unanchored pattern body shared by the validator here and the
    /// free-text scanner in `extract`.
    pub fn pattern_body(&self) -> &'static str {
        match self {
            IdKind::JgaDataset => r"JGAD\d{6,}",
            IdKind::JgaStudy => r"JGAS\d{6,}",
            IdKind::GeaDataset => r"E-GEAD-\d+",
            IdKind::DbGapDataset => r"pht\d{6}(?:\.v\d+)?(?:\.p\d+)?",
            IdKind::DbGapStudy => r"phs\d{6}(?:\.v\d+)?(?:\.p\d+)?",
            IdKind::MetaboBank => r"MTBKS\d+",
            IdKind::BioProject => r"PRJDB\d+",
        }
    }

    /// Kinds that directly denote a dataset and may become inversion targets.
    /// Study-level kinds resolve (JgaStudy) or only feed the expansion map
    /// (DbGapStudy).
    pub fn is_dataset_level(&self) -> bool {
        matches!(
            self,
            IdKind::JgaDataset
                | IdKind::GeaDataset
                | IdKind::DbGapDataset
                | IdKind::MetaboBank
                | IdKind::BioProject
        )
    }
}

static FULL_MATCHERS: LazyLock<Vec<(IdKind, Regex)>> = LazyLock::new(|| {
    IdKind::ALL
        .iter()
        .map(|kind| {
            let pattern = format!("^(?:{})$", kind.pattern_body());
            (*kind, Regex::new(&pattern).expect("static pattern"))
        })
        .collect()
});

/// A typed archive identifier. Identity for versioning purposes is the pair
/// (DatasetId, Lang); the kind tag is implied by the string itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetId {
    kind: IdKind,
    value: String,
}

impl DatasetId {
    /// Returns `None` when the string matches none of the seven patterns.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        for (kind, matcher) in FULL_MATCHERS.iter() {
            if matcher.is_match(trimmed) {
                return Some(Self {
                    kind: *kind,
                    value: trimmed.to_string(),
                });
            }
        }
        None
    }

    pub fn kind(&self) -> IdKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_dataset_level(&self) -> bool {
        self.kind.is_dataset_level()
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for DatasetId {
    type Err = ConvertError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| ConvertError::InvalidDatasetId(value.to_string()))
    }
}

impl Serialize for DatasetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de> Deserialize<'de> for DatasetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        DatasetId::parse(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid dataset identifier: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_hum_id_valid() {
        let id: HumId = "HUM0197".parse().unwrap();
        assert_eq!(id.as_str(), "hum0197");
    }

    #[test]
    fn parse_hum_id_invalid() {
        let err = "hum19".parse::<HumId>().unwrap_err();
        assert_matches!(err, ConvertError::InvalidHumId(_));
    }

    #[test]
    fn dataset_id_kind_from_pattern() {
        let cases = [
            ("JGAD000456", IdKind::JgaDataset),
            ("JGAS000123", IdKind::JgaStudy),
            ("E-GEAD-420", IdKind::GeaDataset),
            ("pht004442.v1.p1", IdKind::DbGapDataset),
            ("phs001554", IdKind::DbGapStudy),
            ("MTBKS123", IdKind::MetaboBank),
            ("PRJDB10452", IdKind::BioProject),
        ];
        for (value, kind) in cases {
            let id = DatasetId::parse(value).unwrap();
            assert_eq!(id.kind(), kind, "{value}");
            assert_eq!(id.as_str(), value);
        }
    }

    #[test]
    fn dataset_id_rejects_unknown_shapes() {
        for value in ["JGAD12", "GSE1234", "E-GEAD", "prjdb123", ""] {
            assert!(DatasetId::parse(value).is_none(), "{value}");
        }
        let err = "GSE1234".parse::<DatasetId>().unwrap_err();
        assert_matches!(err, ConvertError::InvalidDatasetId(_));
    }

    #[test]
    fn dataset_level_split() {
        assert!(DatasetId::parse("JGAD000456").unwrap().is_dataset_level());
        assert!(DatasetId::parse("PRJDB10452").unwrap().is_dataset_level());
        assert!(!DatasetId::parse("JGAS000123").unwrap().is_dataset_level());
        assert!(!DatasetId::parse("phs001554").unwrap().is_dataset_level());
    }

    #[test]
    fn dataset_id_serde_round_trip() {
        let id = DatasetId::parse("E-GEAD-420").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"E-GEAD-420\"");
        let back: DatasetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
