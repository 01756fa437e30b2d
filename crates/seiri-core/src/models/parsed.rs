use serde::{Deserialize, Serialize};

/// Structured fields extracted from a raw file or release title.
///
/// Produced by a [`TitleParser`](crate::sources::TitleParser); the pipeline
/// only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<u32>,
    /// First episode covered. Single-episode files set only this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_start: Option<u32>,
    /// Last episode covered, for ranges like `01-23`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_end: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_group: Option<String>,
    /// Release version (the `2` in `20v2`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default)]
    pub is_batch: bool,
}

impl ParsedMetadata {
    /// Inclusive episode range when the title spans more than one episode.
    pub fn episode_range(&self) -> Option<(u32, u32)> {
        match (self.episode_start, self.episode_end) {
            (Some(start), Some(end)) if end > start => Some((start, end)),
            _ => None,
        }
    }

    /// Batch releases span an episode range or are flagged by the parser.
    /// Flagged members may still carry their own episode number.
    pub fn is_batch_release(&self) -> bool {
        self.episode_range().is_some() || self.is_batch
    }

    /// Season or part number used to pick an entry in a title family.
    pub fn sequel_marker(&self) -> Option<u32> {
        self.part.or(self.season)
    }
}
