use serde::{Deserialize, Serialize};

use super::{LocalFile, MediaRecord};

/// Status of an entry in the user's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListStatus {
    Current,
    Completed,
    Paused,
    Dropped,
    Planning,
    /// Rewatching. Folded into `Current` before library entries are returned.
    Repeating,
}

impl ListStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "Watching",
            Self::Completed => "Completed",
            Self::Paused => "Paused",
            Self::Dropped => "Dropped",
            Self::Planning => "Planning",
            Self::Repeating => "Rewatching",
        }
    }

    /// Catalog string representation (`CURRENT`, `PAUSED`, ...).
    pub fn as_catalog_str(&self) -> &'static str {
        match self {
            Self::Current => "CURRENT",
            Self::Completed => "COMPLETED",
            Self::Paused => "PAUSED",
            Self::Dropped => "DROPPED",
            Self::Planning => "PLANNING",
            Self::Repeating => "REPEATING",
        }
    }

    pub fn from_catalog_str(s: &str) -> Option<Self> {
        match s {
            "CURRENT" => Some(Self::Current),
            "COMPLETED" => Some(Self::Completed),
            "PAUSED" => Some(Self::Paused),
            "DROPPED" => Some(Self::Dropped),
            "PLANNING" => Some(Self::Planning),
            "REPEATING" => Some(Self::Repeating),
            _ => None,
        }
    }

    pub const ALL: &[ListStatus] = &[
        Self::Current,
        Self::Completed,
        Self::Paused,
        Self::Dropped,
        Self::Planning,
        Self::Repeating,
    ];
}

impl std::fmt::Display for ListStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One media in the user's list, with the user's progress and score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    pub media: MediaRecord,
    pub progress: u32,
    pub score: f32,
}

/// All list entries sharing one status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusList {
    pub status: ListStatus,
    pub entries: Vec<ListEntry>,
}

/// The user's list, grouped by status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub lists: Vec<StatusList>,
}

impl Collection {
    /// Every media in the list, in list order, first occurrence only.
    pub fn media(&self) -> Vec<MediaRecord> {
        let mut seen = std::collections::HashSet::new();
        self.lists
            .iter()
            .flat_map(|list| &list.entries)
            .filter(|entry| seen.insert(entry.media.id))
            .map(|entry| entry.media.clone())
            .collect()
    }
}

/// A media with local files, as shown in one status group of the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub media: MediaRecord,
    pub progress: u32,
    pub score: f32,
    pub local_files: Vec<LocalFile>,
    pub all_files_locked: bool,
}

/// One status group of the library view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    #[serde(rename = "type")]
    pub status: ListStatus,
    pub entries: Vec<Entry>,
}

impl LibraryEntry {
    /// Number of local files across all entries of the group.
    pub fn file_count(&self) -> usize {
        self.entries.iter().map(|e| e.local_files.len()).sum()
    }
}
