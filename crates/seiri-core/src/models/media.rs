use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Catalog identifier of a media record.
pub type MediaId = u64;

/// Release format of a media record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaFormat {
    Tv,
    TvShort,
    Movie,
    Special,
    Ova,
    Ona,
    Music,
    #[default]
    Unknown,
}

impl MediaFormat {
    /// Formats released as numbered episodes.
    pub fn is_episodic(self) -> bool {
        matches!(self, Self::Tv | Self::TvShort | Self::Ova | Self::Ona)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tv => "TV",
            Self::TvShort => "TV_SHORT",
            Self::Movie => "MOVIE",
            Self::Special => "SPECIAL",
            Self::Ova => "OVA",
            Self::Ona => "ONA",
            Self::Music => "MUSIC",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a catalog format string (`"TV"`, `"TV_SHORT"`, ...). Unknown values map to `Unknown`.
    pub fn from_catalog_str(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "TV" => Self::Tv,
            "TV_SHORT" => Self::TvShort,
            "MOVIE" => Self::Movie,
            "SPECIAL" => Self::Special,
            "OVA" => Self::Ova,
            "ONA" => Self::Ona,
            "MUSIC" => Self::Music,
            _ => Self::Unknown,
        }
    }
}

/// A single title with language variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

impl MediaTitle {
    /// Returns the best available display title.
    pub fn preferred(&self) -> &str {
        self.romaji
            .as_deref()
            .or(self.english.as_deref())
            .or(self.native.as_deref())
            .unwrap_or("Unknown")
    }
}

/// A remote catalog record eligible to be matched against local files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: MediaId,
    pub title: MediaTitle,
    pub synonyms: Vec<String>,
    pub format: MediaFormat,
    /// Total episode count, when the catalog knows it.
    pub episodes: Option<u32>,
    pub start_date: Option<NaiveDate>,
}

impl MediaRecord {
    /// Canonical title variants (romaji, english, native), without synonyms.
    pub fn canonical_titles(&self) -> Vec<&str> {
        [&self.title.romaji, &self.title.english, &self.title.native]
            .into_iter()
            .filter_map(|t| t.as_deref())
            .collect()
    }

    /// Movies and one-episode releases resolve to episode 1 without a mapping.
    pub fn is_single_episode(&self) -> bool {
        self.format == MediaFormat::Movie || self.episodes == Some(1)
    }
}
