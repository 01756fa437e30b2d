use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;

use seiri_core::models::{EpisodeMapping, EpisodeMetadata, MediaId};

/// Response of the `/mappings` endpoint. Only the episode table is read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingsResponse {
    #[serde(default)]
    pub episodes: HashMap<String, AniZipEpisode>,
    pub episode_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AniZipEpisode {
    pub episode_number: Option<u32>,
    pub absolute_episode_number: Option<u32>,
    pub airdate: Option<String>,
    pub title: Option<HashMap<String, Option<String>>>,
}

impl AniZipEpisode {
    fn english_title(&self) -> Option<String> {
        self.title
            .as_ref()
            .and_then(|t| t.get("en").cloned().flatten())
            .filter(|t| !t.is_empty())
    }
}

impl MappingsResponse {
    /// Regular episodes only. Keys that are not plain numbers (`S1`, `C2`)
    /// are specials and credits and have no place in the relative numbering.
    pub fn into_mapping(self, media_id: MediaId) -> EpisodeMapping {
        let episodes = self.episodes.into_iter().filter_map(|(key, episode)| {
            let number = key.parse::<u32>().ok()?;
            Some(EpisodeMetadata {
                media_id,
                episode: number,
                absolute_episode: episode.absolute_episode_number.or(episode.episode_number),
                air_date: episode
                    .airdate
                    .as_deref()
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
                title: episode.english_title(),
            })
        });
        EpisodeMapping::new(media_id, episodes)
    }
}
