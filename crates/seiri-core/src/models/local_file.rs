use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{EpisodeMetadata, MediaId, ParsedMetadata};

/// A video file discovered on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFile {
    /// Case-folded path with forward-slash separators.
    pub path: String,
    /// File name as found on disk.
    pub name: String,
    pub parsed: Option<ParsedMetadata>,
    /// `None` while unmatched.
    pub media_id: Option<MediaId>,
    /// Episode relative to the matched media; `None` while unresolved.
    pub episode: Option<u32>,
    pub metadata: Option<EpisodeMetadata>,
    /// Pinned by the user; never re-matched.
    pub locked: bool,
    pub ignored: bool,
}

impl LocalFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy();
        let name = raw
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            path: normalize_path(&raw),
            name,
            parsed: None,
            media_id: None,
            episode: None,
            metadata: None,
            locked: false,
            ignored: false,
        }
    }

    pub fn parsed_title(&self) -> Option<&str> {
        self.parsed
            .as_ref()
            .and_then(|p| p.title.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn parsed_episode(&self) -> Option<u32> {
        self.parsed.as_ref().and_then(|p| p.episode_start)
    }

    /// Clear everything a matching pass resolves.
    pub fn reset_match(&mut self) {
        self.media_id = None;
        self.episode = None;
        self.metadata = None;
    }
}

/// Case-fold a path and use forward slashes.
pub fn normalize_path(raw: &str) -> String {
    raw.replace('\\', "/").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_path_is_normalized() {
        let lf = LocalFile::new(r"E:\Anime\Show\[Group] Show - 01.mkv");
        assert_eq!(lf.path, "e:/anime/show/[group] show - 01.mkv");
        assert_eq!(lf.name, "[Group] Show - 01.mkv");
        assert!(lf.media_id.is_none());
        assert!(lf.episode.is_none());
    }

    #[test]
    fn test_blank_parsed_title_is_absent() {
        let mut lf = LocalFile::new("/anime/x.mkv");
        lf.parsed = Some(ParsedMetadata {
            title: Some("  ".into()),
            ..Default::default()
        });
        assert!(lf.parsed_title().is_none());
    }
}
