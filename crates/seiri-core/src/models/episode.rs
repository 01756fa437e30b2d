use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::MediaId;

/// Canonical metadata for one episode of one media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeMetadata {
    pub media_id: MediaId,
    /// Episode number relative to the media.
    pub episode: u32,
    /// Episode number counted across the whole title family.
    pub absolute_episode: Option<u32>,
    pub air_date: Option<NaiveDate>,
    pub title: Option<String>,
}

/// Every known episode of a media, keyed by relative episode number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeMapping {
    pub media_id: MediaId,
    pub episodes: BTreeMap<u32, EpisodeMetadata>,
}

impl EpisodeMapping {
    pub fn new(media_id: MediaId, episodes: impl IntoIterator<Item = EpisodeMetadata>) -> Self {
        Self {
            media_id,
            episodes: episodes.into_iter().map(|e| (e.episode, e)).collect(),
        }
    }

    pub fn get(&self, episode: u32) -> Option<&EpisodeMetadata> {
        self.episodes.get(&episode)
    }

    /// Find the episode whose absolute number equals `absolute`.
    pub fn find_absolute(&self, absolute: u32) -> Option<&EpisodeMetadata> {
        self.episodes
            .values()
            .find(|e| e.absolute_episode == Some(absolute))
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(episode: u32, absolute: u32) -> EpisodeMetadata {
        EpisodeMetadata {
            media_id: 7,
            episode,
            absolute_episode: Some(absolute),
            air_date: None,
            title: None,
        }
    }

    #[test]
    fn test_lookup_by_relative_and_absolute() {
        let mapping = EpisodeMapping::new(7, vec![ep(1, 20), ep(2, 21), ep(3, 22)]);
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.get(2).map(|e| e.absolute_episode), Some(Some(21)));
        assert_eq!(mapping.find_absolute(22).map(|e| e.episode), Some(3));
        assert!(mapping.find_absolute(5).is_none());
    }
}
