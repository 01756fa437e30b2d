//! Interfaces to the collaborators the pipeline consumes.
//!
//! The pipeline never talks to a network or parser directly; the catalog,
//! episode and title services are injected through these traits so the
//! runtime can plug in real clients and tests can plug in counting fakes.

use std::future::Future;

use crate::models::{Collection, EpisodeMapping, MediaId, MediaRecord, ParsedMetadata};

/// Turns a raw file or release title into structured fields.
///
/// Implementations must be pure: no I/O, same input gives the same output.
/// `None` means the title could not be parsed at all.
pub trait TitleParser: Send + Sync {
    fn parse(&self, raw_title: &str) -> Option<ParsedMetadata>;
}

impl<F> TitleParser for F
where
    F: Fn(&str) -> Option<ParsedMetadata> + Send + Sync,
{
    fn parse(&self, raw_title: &str) -> Option<ParsedMetadata> {
        self(raw_title)
    }
}

/// A remote catalog holding the user's list and searchable media records.
pub trait CatalogSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The user's list, grouped by status.
    fn get_collection(&self) -> impl Future<Output = Result<Collection, Self::Error>> + Send;

    /// Search media records by free-text title.
    fn search_media(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<MediaRecord>, Self::Error>> + Send;
}

/// A remote source of per-episode metadata.
pub trait EpisodeSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every known episode of `media_id`, keyed by relative episode number.
    fn get_episode_mapping(
        &self,
        media_id: MediaId,
    ) -> impl Future<Output = Result<EpisodeMapping, Self::Error>> + Send;
}
