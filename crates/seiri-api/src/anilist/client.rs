use reqwest::Client;

use seiri_core::models::{Collection, MediaRecord};
use seiri_core::sources::CatalogSource;

use super::error::AniListError;
use super::types::{GraphQLResponse, MediaListCollectionResponse, PageResponse, ViewerResponse};

const API_URL: &str = "https://graphql.anilist.co";

const SEARCH_QUERY: &str = r#"
query ($search: String) {
    Page(perPage: 10) {
        media(search: $search, type: ANIME) {
            id
            title { romaji english native }
            episodes
            format
            synonyms
            startDate { year month day }
        }
    }
}
"#;

const COLLECTION_QUERY: &str = r#"
query ($userId: Int, $userName: String) {
    MediaListCollection(userId: $userId, userName: $userName, type: ANIME) {
        lists {
            status
            isCustomList
            entries {
                progress
                score(format: POINT_10_DECIMAL)
                media {
                    id
                    title { romaji english native }
                    episodes
                    format
                    synonyms
                    startDate { year month day }
                }
            }
        }
    }
}
"#;

const VIEWER_QUERY: &str = r#"
query {
    Viewer {
        id
        name
    }
}
"#;

/// AniList GraphQL API client.
///
/// The collection is looked up by `username` when one is set, which works
/// without a token for public lists. Otherwise the token's viewer is used.
pub struct AniListClient {
    access_token: Option<String>,
    username: Option<String>,
    http: Client,
}

impl AniListClient {
    pub fn new(access_token: Option<String>, username: Option<String>) -> Self {
        Self {
            access_token: access_token.filter(|t| !t.is_empty()),
            username: username.filter(|u| !u.is_empty()),
            http: Client::new(),
        }
    }

    async fn graphql_request<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, AniListError> {
        tracing::debug!(operation, "AniList GraphQL request");

        let mut request = self
            .http
            .post(API_URL)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let resp = request
            .json(&serde_json::json!({
                "query": query,
                "variables": variables,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(operation, status = status_code, "AniList API error");
            return Err(AniListError::Api {
                status: status_code,
                message: body,
            });
        }

        tracing::debug!(operation, status = %status, "AniList response received");
        resp.json::<GraphQLResponse<T>>()
            .await
            .map_err(|e| AniListError::Parse(e.to_string()))?
            .into_data()
    }

    /// Get the authenticated user's ID.
    pub async fn get_viewer_id(&self) -> Result<u64, AniListError> {
        let resp: ViewerResponse = self
            .graphql_request("Viewer", VIEWER_QUERY, serde_json::json!({}))
            .await?;
        Ok(resp.viewer.id)
    }

    async fn collection_variables(&self) -> Result<serde_json::Value, AniListError> {
        match &self.username {
            Some(name) => Ok(serde_json::json!({ "userName": name })),
            None if self.access_token.is_some() => {
                let user_id = self.get_viewer_id().await?;
                Ok(serde_json::json!({ "userId": user_id }))
            }
            None => Err(AniListError::Api {
                status: 401,
                message: "no AniList username or access token configured".into(),
            }),
        }
    }
}

impl CatalogSource for AniListClient {
    type Error = AniListError;

    async fn get_collection(&self) -> Result<Collection, AniListError> {
        let variables = self.collection_variables().await?;
        let resp: MediaListCollectionResponse = self
            .graphql_request("MediaListCollection", COLLECTION_QUERY, variables)
            .await?;
        let collection = resp.media_list_collection.into_collection();
        tracing::info!(
            lists = collection.lists.len(),
            entries = collection.lists.iter().map(|l| l.entries.len()).sum::<usize>(),
            "AniList collection loaded"
        );
        Ok(collection)
    }

    async fn search_media(&self, query: &str) -> Result<Vec<MediaRecord>, AniListError> {
        let resp: PageResponse = self
            .graphql_request(
                "Search",
                SEARCH_QUERY,
                serde_json::json!({ "search": query }),
            )
            .await?;
        Ok(resp
            .page
            .media
            .into_iter()
            .map(|m| m.into_media_record())
            .collect())
    }
}
