use std::collections::HashMap;

use crate::models::{MediaId, MediaRecord};
use crate::normalize;

/// Read-only index over the candidate media of one matching pass.
///
/// Titles are indexed by [`normalize::family_key`], so every entry of a
/// sequel family ("Show", "Show Part 2", "Show 2nd Season") lands under one
/// key. Candidate lists are kept in chronological order so the N-th part of
/// a family is the N-th element.
#[derive(Debug, Default)]
pub struct MediaContainer {
    by_id: HashMap<MediaId, MediaRecord>,
    order: Vec<MediaId>,
    titles: HashMap<String, Vec<MediaId>>,
    synonyms: HashMap<String, Vec<MediaId>>,
}

impl MediaContainer {
    /// Index `candidates`. A repeated ID keeps its first record.
    pub fn build(candidates: Vec<MediaRecord>) -> Self {
        let mut container = Self::default();

        for record in candidates {
            if container.by_id.contains_key(&record.id) {
                continue;
            }
            for title in record.canonical_titles() {
                index_title(&mut container.titles, title, record.id);
            }
            for synonym in &record.synonyms {
                index_title(&mut container.synonyms, synonym, record.id);
            }
            container.order.push(record.id);
            container.by_id.insert(record.id, record);
        }

        let by_id = &container.by_id;
        for ids in container
            .titles
            .values_mut()
            .chain(container.synonyms.values_mut())
        {
            ids.sort_by_key(|id| {
                let start = by_id.get(id).and_then(|r| r.start_date);
                (start.is_none(), start, *id)
            });
        }

        tracing::debug!(
            media = container.order.len(),
            title_keys = container.titles.len(),
            synonym_keys = container.synonyms.len(),
            "Media container built"
        );
        container
    }

    pub fn get(&self, id: MediaId) -> Option<&MediaRecord> {
        self.by_id.get(&id)
    }

    /// Records whose canonical titles share the family of `title`, oldest first.
    pub fn candidates_by_title(&self, title: &str) -> Vec<&MediaRecord> {
        self.resolve(&self.titles, title)
    }

    /// Records whose synonyms share the family of `title`, oldest first.
    pub fn candidates_by_synonym(&self, title: &str) -> Vec<&MediaRecord> {
        self.resolve(&self.synonyms, title)
    }

    /// Every indexed record, in input order.
    pub fn media(&self) -> impl Iterator<Item = &MediaRecord> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn resolve(&self, index: &HashMap<String, Vec<MediaId>>, title: &str) -> Vec<&MediaRecord> {
        let key = normalize::family_key(title);
        index
            .get(&key)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }
}

fn index_title(index: &mut HashMap<String, Vec<MediaId>>, title: &str, id: MediaId) {
    let key = normalize::family_key(title);
    if key.is_empty() {
        return;
    }
    let ids = index.entry(key).or_default();
    if !ids.contains(&id) {
        ids.push(id);
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{MediaFormat, MediaTitle};

    fn record(id: MediaId, romaji: &str, start: Option<(i32, u32)>) -> MediaRecord {
        MediaRecord {
            id,
            title: MediaTitle {
                romaji: Some(romaji.into()),
                english: None,
                native: None,
            },
            synonyms: vec![],
            format: MediaFormat::Tv,
            episodes: Some(12),
            start_date: start.and_then(|(y, m)| NaiveDate::from_ymd_opt(y, m, 1)),
        }
    }

    #[test]
    fn test_empty_container() {
        let container = MediaContainer::build(vec![]);
        assert!(container.is_empty());
        assert!(container.candidates_by_title("Anything").is_empty());
        assert!(container.get(1).is_none());
    }

    #[test]
    fn test_lookup_ignores_case_punctuation_and_tags() {
        let container = MediaContainer::build(vec![record(1, "Sousou no Frieren", None)]);
        let hits = container.candidates_by_title("[SubsPlease] SOUSOU NO FRIEREN! (1080p)");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
    }

    #[test]
    fn test_family_is_ordered_by_start_date() {
        let container = MediaContainer::build(vec![
            record(30, "Show Part 2", Some((2021, 1))),
            record(10, "Show", Some((2019, 4))),
            record(20, "Show 2nd Season", Some((2020, 7))),
            record(5, "Show: Special", None),
        ]);

        let ids: Vec<_> = container
            .candidates_by_title("Show")
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![10, 20, 30]);
        // Same family from any member's title.
        assert_eq!(container.candidates_by_title("Show Season 3").len(), 3);
    }

    #[test]
    fn test_undated_records_sort_last() {
        let container = MediaContainer::build(vec![
            record(2, "Title", None),
            record(9, "Title Part 2", Some((2020, 1))),
            record(1, "Title Season 3", None),
        ]);
        let ids: Vec<_> = container
            .candidates_by_title("Title")
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![9, 1, 2]);
    }

    #[test]
    fn test_synonyms_are_a_separate_index() {
        let mut frieren = record(1, "Sousou no Frieren", None);
        frieren.synonyms = vec!["Frieren: Beyond Journey's End".into()];
        let container = MediaContainer::build(vec![frieren]);

        assert!(container
            .candidates_by_title("Frieren Beyond Journeys End")
            .is_empty());
        assert_eq!(
            container
                .candidates_by_synonym("Frieren Beyond Journeys End")
                .len(),
            1
        );
    }

    #[test]
    fn test_duplicate_id_keeps_first_record() {
        let container = MediaContainer::build(vec![
            record(1, "First", None),
            record(1, "Second", None),
        ]);
        assert_eq!(container.len(), 1);
        assert_eq!(container.get(1).map(|r| r.title.preferred()), Some("First"));
        assert!(container.candidates_by_title("Second").is_empty());
    }

    #[test]
    fn test_record_indexed_once_per_key() {
        let mut show = record(1, "Show", None);
        show.title.english = Some("SHOW".into());
        let container = MediaContainer::build(vec![show]);
        assert_eq!(container.candidates_by_title("show").len(), 1);
        assert_eq!(container.media().count(), 1);
    }
}
