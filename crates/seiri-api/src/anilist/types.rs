use chrono::NaiveDate;
use serde::Deserialize;

use seiri_core::models::{
    Collection, ListEntry, ListStatus, MediaFormat, MediaRecord, MediaTitle, StatusList,
};

use super::error::AniListError;

// ── GraphQL response wrappers ────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQLError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    pub status: Option<u16>,
}

impl<T> GraphQLResponse<T> {
    /// AniList answers some failures with HTTP 200 and an `errors` array.
    pub fn into_data(self) -> Result<T, AniListError> {
        match (self.data, self.errors.first()) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(AniListError::Api {
                status: error.status.unwrap_or(200),
                message: error.message.clone(),
            }),
            (None, None) => Err(AniListError::Parse("response has no data".into())),
        }
    }
}

// ── Search queries ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PageResponse {
    #[serde(rename = "Page")]
    pub page: PageData,
}

#[derive(Debug, Deserialize)]
pub struct PageData {
    pub media: Vec<AniListMedia>,
}

#[derive(Debug, Deserialize)]
pub struct AniListMedia {
    pub id: u64,
    pub title: Option<AniListTitle>,
    pub episodes: Option<u32>,
    pub format: Option<String>,
    pub synonyms: Option<Vec<String>>,
    #[serde(rename = "startDate")]
    pub start_date: Option<FuzzyDate>,
}

#[derive(Debug, Deserialize)]
pub struct AniListTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FuzzyDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

// ── User list queries ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MediaListCollectionResponse {
    #[serde(rename = "MediaListCollection")]
    pub media_list_collection: MediaListCollection,
}

#[derive(Debug, Deserialize)]
pub struct MediaListCollection {
    pub lists: Vec<MediaListGroup>,
}

#[derive(Debug, Deserialize)]
pub struct MediaListGroup {
    pub status: Option<String>,
    #[serde(rename = "isCustomList", default)]
    pub is_custom_list: bool,
    pub entries: Vec<MediaListEntry>,
}

#[derive(Debug, Deserialize)]
pub struct MediaListEntry {
    pub progress: Option<u32>,
    pub score: Option<f32>,
    pub media: AniListMedia,
}

// ── Viewer query ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ViewerResponse {
    #[serde(rename = "Viewer")]
    pub viewer: Viewer,
}

#[derive(Debug, Deserialize)]
pub struct Viewer {
    pub id: u64,
    pub name: String,
}

// ── Conversions ──────────────────────────────────────────────────

impl FuzzyDate {
    /// Missing month or day fall back to the first; a missing year means no date.
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        let year = self.year?;
        NaiveDate::from_ymd_opt(year, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }
}

impl AniListMedia {
    pub fn into_media_record(self) -> MediaRecord {
        let title = self
            .title
            .map(|t| MediaTitle {
                romaji: t.romaji,
                english: t.english,
                native: t.native,
            })
            .unwrap_or_default();

        MediaRecord {
            id: self.id,
            title,
            synonyms: self.synonyms.unwrap_or_default(),
            format: self
                .format
                .as_deref()
                .map(MediaFormat::from_catalog_str)
                .unwrap_or_default(),
            episodes: self.episodes,
            start_date: self.start_date.as_ref().and_then(FuzzyDate::to_naive_date),
        }
    }
}

impl MediaListCollection {
    /// Group entries by list status, in `ListStatus::ALL` order.
    ///
    /// Custom lists repeat entries already present in a status list and
    /// are skipped, as are groups with an unknown status.
    pub fn into_collection(self) -> Collection {
        let mut lists: Vec<StatusList> = Vec::new();
        for group in self.lists.into_iter().filter(|g| !g.is_custom_list) {
            let Some(status) = group.status.as_deref().and_then(ListStatus::from_catalog_str)
            else {
                tracing::debug!(status = ?group.status, "Skipping list group");
                continue;
            };
            let entries = group.entries.into_iter().map(|entry| ListEntry {
                media: entry.media.into_media_record(),
                progress: entry.progress.unwrap_or(0),
                score: entry.score.unwrap_or(0.0),
            });
            match lists.iter_mut().find(|l| l.status == status) {
                Some(list) => list.entries.extend(entries),
                None => lists.push(StatusList {
                    status,
                    entries: entries.collect(),
                }),
            }
        }
        lists.sort_by_key(|l| ListStatus::ALL.iter().position(|s| *s == l.status));
        Collection { lists }
    }
}
