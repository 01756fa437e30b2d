use reqwest::Client;

use seiri_core::models::{EpisodeMapping, MediaId};
use seiri_core::sources::EpisodeSource;

use super::error::AniZipError;
use super::types::MappingsResponse;

const API_URL: &str = "https://api.ani.zip/mappings";

/// ani.zip mappings client, keyed by AniList media ID.
pub struct AniZipClient {
    base_url: String,
    http: Client,
}

impl AniZipClient {
    pub fn new() -> Self {
        Self {
            base_url: API_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for AniZipClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EpisodeSource for AniZipClient {
    type Error = AniZipError;

    async fn get_episode_mapping(&self, media_id: MediaId) -> Result<EpisodeMapping, AniZipError> {
        tracing::debug!(media_id, "ani.zip mappings request");

        let resp = self
            .http
            .get(&self.base_url)
            .query(&[("anilist_id", media_id)])
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(media_id, status = status_code, "ani.zip API error");
            return Err(AniZipError::Api {
                status: status_code,
                message: body,
            });
        }

        let mapping = resp
            .json::<MappingsResponse>()
            .await
            .map_err(|e| AniZipError::Parse(e.to_string()))?
            .into_mapping(media_id);
        tracing::debug!(media_id, episodes = mapping.len(), "ani.zip mappings received");
        Ok(mapping)
    }
}
