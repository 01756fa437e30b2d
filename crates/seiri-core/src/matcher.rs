//! Matching local files against the candidate media of one pass.
//!
//! Every file is looked up by the family key of its parsed title. One
//! candidate is a match; several candidates are narrowed by the parsed
//! season or part number against the family's chronological order, and
//! anything still unclear is reported as ambiguous rather than guessed.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::container::MediaContainer;
use crate::models::{LocalFile, MediaId, MediaRecord, ParsedMetadata};
use crate::normalize;

/// Three-way result of matching one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "mediaId", rename_all = "camelCase")]
pub enum MatchOutcome {
    /// No candidate at all.
    Unmatched,
    /// Several candidates and nothing to tell them apart.
    Ambiguous,
    Matched(MediaId),
}

impl MatchOutcome {
    pub fn media_id(self) -> Option<MediaId> {
        match self {
            Self::Matched(id) => Some(id),
            Self::Unmatched | Self::Ambiguous => None,
        }
    }
}

/// Which rule decided a [`MatchOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Locked,
    Ignored,
    MissingTitle,
    NoCandidates,
    SingleCandidate,
    Synonym,
    ExactTitle,
    SequelMarker,
    NoSequelMarker,
    MarkerOutOfRange,
    StartDateTie,
    DuplicateTitle,
    AbsoluteEpisode,
    SeasonAndPart,
    Batch,
    BatchInconsistent,
    BatchIncomplete,
}

impl MatchRule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Ignored => "ignored",
            Self::MissingTitle => "missing_title",
            Self::NoCandidates => "no_candidates",
            Self::SingleCandidate => "single_candidate",
            Self::Synonym => "synonym",
            Self::ExactTitle => "exact_title",
            Self::SequelMarker => "sequel_marker",
            Self::NoSequelMarker => "no_sequel_marker",
            Self::MarkerOutOfRange => "marker_out_of_range",
            Self::StartDateTie => "start_date_tie",
            Self::DuplicateTitle => "duplicate_title",
            Self::AbsoluteEpisode => "absolute_episode",
            Self::SeasonAndPart => "season_and_part",
            Self::Batch => "batch",
            Self::BatchInconsistent => "batch_inconsistent",
            Self::BatchIncomplete => "batch_incomplete",
        }
    }
}

impl std::fmt::Display for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match result for the file at `index` of the matched slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub index: usize,
    pub path: String,
    pub outcome: MatchOutcome,
    pub rule: MatchRule,
    /// Candidates considered, oldest first. Empty when no lookup happened.
    pub candidates: Vec<MediaId>,
    /// Episode range covered by the batch this file belongs to.
    pub episodes: Option<(u32, u32)>,
    /// Episode assigned from the batch range.
    pub episode: Option<u32>,
}

/// Match every file against `container`. Results are ordered by index.
#[tracing::instrument(name = "match_files", skip_all, fields(files = files.len(), media = container.len()))]
pub fn match_files(files: &[LocalFile], container: &MediaContainer) -> Vec<MatchResult> {
    let mut batches: HashMap<BatchKey, Vec<usize>> = HashMap::new();
    let mut singles = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        match batch_key(file) {
            Some(key) => batches.entry(key).or_default().push(index),
            None => singles.push(index),
        }
    }

    let mut results: Vec<MatchResult> = singles
        .par_iter()
        .map(|&index| match_single(index, &files[index], container))
        .collect();
    let batch_results: Vec<MatchResult> = batches
        .into_par_iter()
        .flat_map_iter(|(_, members)| match_batch(&members, files, container))
        .collect();
    results.extend(batch_results);
    results.sort_by_key(|r| r.index);

    tracing::debug!(
        matched = results.iter().filter(|r| r.outcome.media_id().is_some()).count(),
        ambiguous = results
            .iter()
            .filter(|r| r.outcome == MatchOutcome::Ambiguous)
            .count(),
        "Matching pass complete"
    );
    results
}

/// Write match results back into `files`.
///
/// Matched files get the media ID; batch members also get their episode.
/// Unmatched and ambiguous files lose any previous match. Locked and
/// ignored files are left untouched.
pub fn apply_matches(files: &mut [LocalFile], results: &[MatchResult]) {
    for result in results {
        if matches!(result.rule, MatchRule::Locked | MatchRule::Ignored) {
            continue;
        }
        let Some(file) = files.get_mut(result.index) else {
            continue;
        };
        file.reset_match();
        if let MatchOutcome::Matched(id) = result.outcome {
            file.media_id = Some(id);
            file.episode = result.episode;
        }
    }
}

// ── Single files ────────────────────────────────────────────────

fn match_single(index: usize, file: &LocalFile, container: &MediaContainer) -> MatchResult {
    let mut result = MatchResult {
        index,
        path: file.path.clone(),
        outcome: MatchOutcome::Unmatched,
        rule: MatchRule::MissingTitle,
        candidates: Vec::new(),
        episodes: None,
        episode: None,
    };

    if file.locked {
        result.rule = MatchRule::Locked;
        result.outcome = file
            .media_id
            .map_or(MatchOutcome::Unmatched, MatchOutcome::Matched);
        return result;
    }
    if file.ignored {
        result.rule = MatchRule::Ignored;
        return result;
    }
    let (Some(title), Some(parsed)) = (file.parsed_title(), file.parsed.as_ref()) else {
        return result;
    };

    let selection = select(title, parsed, container);
    if selection.outcome == MatchOutcome::Ambiguous {
        tracing::debug!(
            path = %file.path,
            rule = %selection.rule,
            candidates = ?selection.candidates,
            "Ambiguous match"
        );
    }
    result.outcome = selection.outcome;
    result.rule = selection.rule;
    result.candidates = selection.candidates;
    result
}

struct Selection {
    outcome: MatchOutcome,
    rule: MatchRule,
    candidates: Vec<MediaId>,
}

impl Selection {
    fn new(outcome: MatchOutcome, rule: MatchRule, candidates: &[&MediaRecord]) -> Self {
        Self {
            outcome,
            rule,
            candidates: candidates.iter().map(|c| c.id).collect(),
        }
    }
}

fn select(title: &str, parsed: &ParsedMetadata, container: &MediaContainer) -> Selection {
    let mut rule = MatchRule::SingleCandidate;
    let mut candidates = container.candidates_by_title(title);
    if candidates.is_empty() {
        rule = MatchRule::Synonym;
        candidates = container.candidates_by_synonym(title);
    }

    match candidates.as_slice() {
        [] => Selection::new(MatchOutcome::Unmatched, MatchRule::NoCandidates, &[]),
        [only] => Selection::new(MatchOutcome::Matched(only.id), rule, &candidates),
        _ => disambiguate(title, parsed, &candidates),
    }
}

/// Pick one entry of a title family, or report the family as ambiguous.
fn disambiguate(title: &str, parsed: &ParsedMetadata, family: &[&MediaRecord]) -> Selection {
    let ambiguous = |rule| Selection::new(MatchOutcome::Ambiguous, rule, family);
    let matched = |id, rule| Selection::new(MatchOutcome::Matched(id), rule, family);

    // "Season 2 Part 2" is neither the 2nd nor the 4th entry in general.
    if parsed.season.is_some_and(|s| s > 1) && parsed.part.is_some() {
        return match exact_title(title, family) {
            Some(hit) => matched(hit.id, MatchRule::ExactTitle),
            None => ambiguous(MatchRule::SeasonAndPart),
        };
    }

    let Some(marker) = parsed.sequel_marker() else {
        if let Some(hit) = exact_title(title, family) {
            return matched(hit.id, MatchRule::ExactTitle);
        }
        if let Some(hit) = parsed.episode_start.and_then(|e| by_absolute_episode(e, family)) {
            return matched(hit.id, MatchRule::AbsoluteEpisode);
        }
        return ambiguous(MatchRule::NoSequelMarker);
    };

    let Some(picked) = (marker as usize)
        .checked_sub(1)
        .and_then(|i| family.get(i))
    else {
        return ambiguous(MatchRule::MarkerOutOfRange);
    };

    let picked_id = picked.id;
    let others = move || family.iter().filter(move |c| c.id != picked_id);
    if others().any(|c| c.start_date == picked.start_date) {
        return ambiguous(MatchRule::StartDateTie);
    }
    let picked_titles = normalized_titles(picked);
    if others().any(|c| {
        normalized_titles(c)
            .iter()
            .any(|t| picked_titles.contains(t))
    }) {
        return ambiguous(MatchRule::DuplicateTitle);
    }

    matched(picked.id, MatchRule::SequelMarker)
}

/// The only family entry whose own title is the parsed title, when the
/// parsed title spells out a sequel ("Show 2nd Season").
fn exact_title<'a>(title: &str, family: &[&'a MediaRecord]) -> Option<&'a MediaRecord> {
    let normalized = normalize::normalize(title);
    if normalized == normalize::family_key(title) {
        return None;
    }
    let mut exact = family.iter().filter(|c| {
        c.canonical_titles()
            .iter()
            .any(|t| normalize::normalize(t) == normalized)
    });
    match (exact.next(), exact.next()) {
        (Some(hit), None) => Some(*hit),
        _ => None,
    }
}

/// Later entry of a family holding an episode numbered past the earlier
/// entries, counted across their episode totals in release order.
///
/// Episodes within the first entry's total stay unresolved: they fit every
/// entry. So does anything past an entry with an unknown total or an
/// unknown or shared start date.
fn by_absolute_episode<'a>(episode: u32, family: &[&'a MediaRecord]) -> Option<&'a MediaRecord> {
    let mut parts = family.iter().filter(|c| c.format.is_episodic());
    let first = parts.next()?;
    let mut previous = first.start_date?;
    let mut before = first.episodes?;
    if episode <= before {
        return None;
    }
    for part in parts {
        let start = part.start_date.filter(|&d| d > previous)?;
        let total = part.episodes?;
        let through = before.checked_add(total)?;
        if episode <= through {
            return Some(*part);
        }
        previous = start;
        before = through;
    }
    None
}

fn normalized_titles(record: &MediaRecord) -> Vec<String> {
    record
        .canonical_titles()
        .into_iter()
        .map(normalize::normalize)
        .filter(|t| !t.is_empty())
        .collect()
}

// ── Batches ─────────────────────────────────────────────────────

/// Batch members share a title family and an episode range. Complete-series
/// packs carry no range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BatchKey {
    family: String,
    range: Option<(u32, u32)>,
}

fn batch_key(file: &LocalFile) -> Option<BatchKey> {
    if file.locked || file.ignored {
        return None;
    }
    let parsed = file.parsed.as_ref()?;
    let title = file.parsed_title()?;
    parsed.is_batch_release().then(|| BatchKey {
        family: normalize::family_key(title),
        range: parsed.episode_range(),
    })
}

/// Match a batch once, from its first member, and apply the outcome to
/// every member or to none.
fn match_batch(members: &[usize], files: &[LocalFile], container: &MediaContainer) -> Vec<MatchResult> {
    let Some(&first) = members.first() else {
        return Vec::new();
    };
    let head = match_single(first, &files[first], container);

    let mut ordered = members.to_vec();
    ordered.sort_by(|&a, &b| {
        natord::compare(&files[a].name, &files[b].name)
            .then_with(|| files[a].path.cmp(&files[b].path))
    });

    let media = head.outcome.media_id().and_then(|id| container.get(id));
    let range = files[first]
        .parsed
        .as_ref()
        .and_then(|p| p.episode_range())
        .or_else(|| media.and_then(|m| m.episodes).map(|total| (1, total)));

    let (outcome, rule, range, episodes) = match (media, range) {
        (Some(media), Some(range)) if is_consistent(media, range) => {
            match assign_episodes(&ordered, files, range) {
                Ok(episodes) => (head.outcome, MatchRule::Batch, Some(range), episodes),
                Err(rule) => {
                    tracing::debug!(
                        path = %head.path,
                        media_id = media.id,
                        members = ordered.len(),
                        range = ?range,
                        %rule,
                        "Batch members do not line up with its range"
                    );
                    (MatchOutcome::Ambiguous, rule, Some(range), Vec::new())
                }
            }
        }
        (Some(media), range) => {
            tracing::debug!(
                path = %head.path,
                media_id = media.id,
                total = ?media.episodes,
                range = ?range,
                "Batch range inconsistent with episode count"
            );
            (MatchOutcome::Ambiguous, MatchRule::BatchInconsistent, range, Vec::new())
        }
        (None, range) => (head.outcome, head.rule, range, Vec::new()),
    };

    ordered
        .iter()
        .enumerate()
        .map(|(position, &index)| MatchResult {
            index,
            path: files[index].path.clone(),
            outcome,
            rule,
            candidates: head.candidates.clone(),
            episodes: range,
            episode: episodes.get(position).copied(),
        })
        .collect()
}

fn is_consistent(media: &MediaRecord, (start, end): (u32, u32)) -> bool {
    start >= 1 && media.episodes.is_some_and(|total| total >= end)
}

/// Episode of every member of a consistent batch, in `ordered` order.
///
/// Members carrying their own episode number keep it. Members without one
/// are numbered by position, which only holds when the batch is complete.
fn assign_episodes(
    ordered: &[usize],
    files: &[LocalFile],
    (start, end): (u32, u32),
) -> Result<Vec<u32>, MatchRule> {
    let own: Vec<Option<u32>> = ordered.iter().map(|&i| own_episode(&files[i])).collect();

    if own.iter().all(Option::is_some) {
        let own: Vec<u32> = own.into_iter().flatten().collect();
        return if own.iter().all(|e| (start..=end).contains(e)) {
            Ok(own)
        } else {
            Err(MatchRule::BatchInconsistent)
        };
    }
    if own.iter().any(Option::is_some) {
        return Err(MatchRule::BatchIncomplete);
    }

    let span = (end + 1).saturating_sub(start) as usize;
    match ordered.len() {
        n if n == span => Ok((start..=end).collect()),
        1 if span > 0 => Ok(vec![start]),
        _ => Err(MatchRule::BatchIncomplete),
    }
}

/// Episode number of a batch member on its own, as opposed to the range of
/// the release it came from.
fn own_episode(file: &LocalFile) -> Option<u32> {
    let parsed = file.parsed.as_ref()?;
    match parsed.episode_range() {
        Some(_) => None,
        None => parsed.episode_start,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{MediaFormat, MediaTitle};

    fn record(id: MediaId, romaji: &str, episodes: u32, start: (i32, u32)) -> MediaRecord {
        MediaRecord {
            id,
            title: MediaTitle {
                romaji: Some(romaji.into()),
                english: None,
                native: None,
            },
            synonyms: vec![],
            format: MediaFormat::Tv,
            episodes: Some(episodes),
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, 1),
        }
    }

    fn file(name: &str, parsed: ParsedMetadata) -> LocalFile {
        let mut f = LocalFile::new(format!("/anime/{name}"));
        f.parsed = Some(parsed);
        f
    }

    fn titled(title: &str, episode: u32) -> ParsedMetadata {
        ParsedMetadata {
            title: Some(title.into()),
            episode_start: Some(episode),
            ..Default::default()
        }
    }

    fn show_family() -> MediaContainer {
        MediaContainer::build(vec![
            record(10, "Show", 12, (2019, 4)),
            record(20, "Show 2nd Season", 12, (2020, 7)),
            record(30, "Show Part 3", 12, (2021, 1)),
        ])
    }

    #[test]
    fn test_single_candidate_is_stable() {
        let container = MediaContainer::build(vec![record(1, "Sousou no Frieren", 28, (2023, 9))]);
        let files: Vec<_> = (1..=3)
            .map(|ep| file(&format!("frieren {ep}.mkv"), titled("Sousou no Frieren", ep)))
            .collect();

        let first = match_files(&files, &container);
        let second = match_files(&files, &container);
        assert_eq!(first, second);
        assert!(first
            .iter()
            .all(|r| r.outcome == MatchOutcome::Matched(1) && r.rule == MatchRule::SingleCandidate));
        assert_eq!(first.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_synonym_fallback() {
        let mut rec = record(1, "Sousou no Frieren", 28, (2023, 9));
        rec.synonyms = vec!["Frieren".into()];
        let container = MediaContainer::build(vec![rec]);

        let results = match_files(&[file("a.mkv", titled("Frieren", 1))], &container);
        assert_eq!(results[0].outcome, MatchOutcome::Matched(1));
        assert_eq!(results[0].rule, MatchRule::Synonym);
    }

    #[test]
    fn test_no_candidates_is_unmatched() {
        let results = match_files(&[file("a.mkv", titled("Nothing Here", 1))], &show_family());
        assert_eq!(results[0].outcome, MatchOutcome::Unmatched);
        assert_eq!(results[0].rule, MatchRule::NoCandidates);
    }

    #[test]
    fn test_part_number_picks_chronological_entry() {
        let mut parsed = titled("Show", 3);
        parsed.season = Some(2);
        let results = match_files(&[file("a.mkv", parsed)], &show_family());
        assert_eq!(results[0].outcome, MatchOutcome::Matched(20));
        assert_eq!(results[0].rule, MatchRule::SequelMarker);
        assert_eq!(results[0].candidates, vec![10, 20, 30]);

        // Part wins over season.
        let mut parsed = titled("Show", 1);
        parsed.season = Some(1);
        parsed.part = Some(3);
        let results = match_files(&[file("b.mkv", parsed)], &show_family());
        assert_eq!(results[0].outcome, MatchOutcome::Matched(30));
    }

    #[test]
    fn test_family_without_marker_is_ambiguous() {
        let results = match_files(&[file("a.mkv", titled("Show", 5))], &show_family());
        assert_eq!(results[0].outcome, MatchOutcome::Ambiguous);
        assert_eq!(results[0].rule, MatchRule::NoSequelMarker);
    }

    #[test]
    fn test_title_spelling_out_sequel() {
        let results = match_files(
            &[file("a.mkv", titled("Show Season 2", 5))],
            &show_family(),
        );
        assert_eq!(results[0].outcome, MatchOutcome::Matched(20));
        assert_eq!(results[0].rule, MatchRule::ExactTitle);
    }

    fn eighty_six() -> MediaContainer {
        MediaContainer::build(vec![
            record(116589, "86 - Eighty Six", 11, (2021, 4)),
            record(131586, "86 - Eighty Six Part 2", 12, (2021, 10)),
        ])
    }

    #[test]
    fn test_absolute_episode_picks_later_part() {
        let files: Vec<_> = (20..=23)
            .map(|ep| {
                let mut parsed = titled("86 - Eighty Six", ep);
                parsed.release_version = Some(2);
                file(&format!("86 - Eighty Six - {ep}v2.mkv"), parsed)
            })
            .collect();

        let results = match_files(&files, &eighty_six());
        assert!(results.iter().all(|r| r.outcome == MatchOutcome::Matched(131586)
            && r.rule == MatchRule::AbsoluteEpisode
            && r.candidates == vec![116589, 131586]));
    }

    #[test]
    fn test_episode_within_first_part_stays_ambiguous() {
        let results = match_files(&[file("a.mkv", titled("86 - Eighty Six", 11))], &eighty_six());
        assert_eq!(results[0].outcome, MatchOutcome::Ambiguous);
        assert_eq!(results[0].rule, MatchRule::NoSequelMarker);

        // Past every part.
        let results = match_files(&[file("b.mkv", titled("86 - Eighty Six", 24))], &eighty_six());
        assert_eq!(results[0].outcome, MatchOutcome::Ambiguous);
    }

    #[test]
    fn test_absolute_episode_needs_known_totals() {
        let mut first = record(1, "Show", 12, (2019, 4));
        first.episodes = None;
        let container = MediaContainer::build(vec![first, record(2, "Show Part 2", 12, (2020, 4))]);
        let results = match_files(&[file("a.mkv", titled("Show", 15))], &container);
        assert_eq!(results[0].outcome, MatchOutcome::Ambiguous);

        let container = MediaContainer::build(vec![
            record(1, "Show", 12, (2020, 4)),
            record(2, "Show Part 2", 12, (2020, 4)),
        ]);
        let results = match_files(&[file("b.mkv", titled("Show", 15))], &container);
        assert_eq!(results[0].outcome, MatchOutcome::Ambiguous);
    }

    #[test]
    fn test_season_with_part_is_not_read_as_part_alone() {
        let container = MediaContainer::build(vec![
            record(1, "Show", 12, (2019, 4)),
            record(2, "Show Season 2", 12, (2020, 4)),
            record(3, "Show Season 2 Part 2", 12, (2021, 1)),
        ]);

        let mut parsed = titled("Show", 1);
        parsed.season = Some(2);
        parsed.part = Some(2);
        let results = match_files(&[file("a.mkv", parsed)], &container);
        assert_eq!(results[0].outcome, MatchOutcome::Ambiguous);
        assert_eq!(results[0].rule, MatchRule::SeasonAndPart);

        let mut parsed = titled("Show Season 2 Part 2", 1);
        parsed.season = Some(2);
        parsed.part = Some(2);
        let results = match_files(&[file("b.mkv", parsed)], &container);
        assert_eq!(results[0].outcome, MatchOutcome::Matched(3));
        assert_eq!(results[0].rule, MatchRule::ExactTitle);
    }

    #[test]
    fn test_marker_out_of_range_is_ambiguous() {
        let mut parsed = titled("Show", 1);
        parsed.season = Some(4);
        let results = match_files(&[file("a.mkv", parsed)], &show_family());
        assert_eq!(results[0].outcome, MatchOutcome::Ambiguous);
        assert_eq!(results[0].rule, MatchRule::MarkerOutOfRange);
    }

    #[test]
    fn test_start_date_tie_is_ambiguous() {
        let container = MediaContainer::build(vec![
            record(1, "Show", 12, (2020, 1)),
            record(2, "Show Part 2", 12, (2020, 1)),
        ]);
        let mut parsed = titled("Show", 1);
        parsed.part = Some(2);
        let results = match_files(&[file("a.mkv", parsed)], &container);
        assert_eq!(results[0].outcome, MatchOutcome::Ambiguous);
        assert_eq!(results[0].rule, MatchRule::StartDateTie);
    }

    #[test]
    fn test_duplicate_titles_are_ambiguous() {
        let container = MediaContainer::build(vec![
            record(1, "Remake", 12, (1998, 1)),
            record(2, "Remake", 24, (2019, 1)),
        ]);
        let mut parsed = titled("Remake", 1);
        parsed.season = Some(1);
        let results = match_files(&[file("a.mkv", parsed)], &container);
        assert_eq!(results[0].outcome, MatchOutcome::Ambiguous);
        assert_eq!(results[0].rule, MatchRule::DuplicateTitle);
    }

    #[test]
    fn test_locked_ignored_and_untitled_are_skipped() {
        let container = MediaContainer::build(vec![record(1, "Show", 12, (2020, 1))]);
        let mut locked = file("locked.mkv", titled("Show", 1));
        locked.locked = true;
        locked.media_id = Some(99);
        let mut ignored = file("ignored.mkv", titled("Show", 1));
        ignored.ignored = true;
        let untitled = file("untitled.mkv", ParsedMetadata::default());
        let unparsed = LocalFile::new("/anime/unparsed.mkv");

        let results = match_files(&[locked, ignored, untitled, unparsed], &container);
        assert_eq!(results[0].outcome, MatchOutcome::Matched(99));
        assert_eq!(results[0].rule, MatchRule::Locked);
        assert_eq!(results[1].rule, MatchRule::Ignored);
        assert_eq!(results[2].rule, MatchRule::MissingTitle);
        assert_eq!(results[3].rule, MatchRule::MissingTitle);
        assert!(results[1..].iter().all(|r| r.outcome == MatchOutcome::Unmatched));
    }

    fn batch(title: &str, start: u32, end: u32) -> ParsedMetadata {
        ParsedMetadata {
            title: Some(title.into()),
            episode_start: Some(start),
            episode_end: Some(end),
            is_batch: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_consistent_batch_assigns_every_episode() {
        let container = MediaContainer::build(vec![record(5, "Show", 23, (2020, 1))]);
        // Reverse order so assignment has to sort by name.
        let files: Vec<_> = (1..=23)
            .rev()
            .map(|ep| file(&format!("Show - {ep:02}.mkv"), batch("Show", 1, 23)))
            .collect();

        let results = match_files(&files, &container);
        assert_eq!(results.len(), 23);
        assert!(results.iter().all(|r| r.outcome == MatchOutcome::Matched(5)
            && r.rule == MatchRule::Batch
            && r.episodes == Some((1, 23))));

        let mut files = files;
        apply_matches(&mut files, &results);
        for f in &files {
            let expected: u32 = f.name[7..9].parse().unwrap();
            assert_eq!(f.media_id, Some(5));
            assert_eq!(f.episode, Some(expected), "{}", f.name);
        }
    }

    #[test]
    fn test_inconsistent_batch_is_ambiguous_for_all() {
        let container = MediaContainer::build(vec![record(5, "Show", 12, (2020, 1))]);
        let files: Vec<_> = (1..=3)
            .map(|ep| file(&format!("Show - {ep:02}.mkv"), batch("Show", 1, 23)))
            .collect();

        let results = match_files(&files, &container);
        assert!(results.iter().all(|r| r.outcome == MatchOutcome::Ambiguous
            && r.rule == MatchRule::BatchInconsistent
            && r.episode.is_none()));
    }

    #[test]
    fn test_batch_with_unknown_total_is_ambiguous() {
        let mut rec = record(5, "Show", 12, (2020, 1));
        rec.episodes = None;
        let container = MediaContainer::build(vec![rec]);
        let results = match_files(&[file("Show 01-12.mkv", batch("Show", 1, 12))], &container);
        assert_eq!(results[0].outcome, MatchOutcome::Ambiguous);
    }

    #[test]
    fn test_single_file_batch_gets_range_start() {
        let container = MediaContainer::build(vec![record(5, "Show", 24, (2020, 1))]);
        let results = match_files(&[file("Show 13-24.mkv", batch("Show", 13, 24))], &container);
        assert_eq!(results[0].outcome, MatchOutcome::Matched(5));
        assert_eq!(results[0].episode, Some(13));
    }

    fn pack(title: &str, episode: Option<u32>) -> ParsedMetadata {
        ParsedMetadata {
            title: Some(title.into()),
            episode_start: episode,
            is_batch: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_pack_uses_total_count() {
        let container = MediaContainer::build(vec![record(5, "Show", 2, (2020, 1))]);
        let files = vec![file("b.mkv", pack("Show", None)), file("a.mkv", pack("Show", None))];
        let results = match_files(&files, &container);
        assert!(results.iter().all(|r| r.episodes == Some((1, 2))));
        assert_eq!(results[1].episode, Some(1));
        assert_eq!(results[0].episode, Some(2));
    }

    #[test]
    fn test_pack_with_extra_files_is_ambiguous() {
        let container = MediaContainer::build(vec![record(5, "Show", 2, (2020, 1))]);
        let files: Vec<_> = ["a.mkv", "b.mkv", "c.mkv"]
            .iter()
            .map(|n| file(n, pack("Show", None)))
            .collect();
        let results = match_files(&files, &container);
        assert!(results.iter().all(|r| r.outcome == MatchOutcome::Ambiguous
            && r.rule == MatchRule::BatchIncomplete
            && r.episode.is_none()));
    }

    #[test]
    fn test_unpadded_batch_names_sort_numerically() {
        let container = MediaContainer::build(vec![record(5, "Show", 12, (2020, 1))]);
        let files: Vec<_> = (1..=12)
            .rev()
            .map(|ep| file(&format!("Show - {ep}.mkv"), batch("Show", 1, 12)))
            .collect();

        let mut files = files;
        let results = match_files(&files, &container);
        apply_matches(&mut files, &results);
        for f in &files {
            let expected: u32 = f.name["Show - ".len()..f.name.len() - ".mkv".len()]
                .parse()
                .unwrap();
            assert_eq!(f.episode, Some(expected), "{}", f.name);
        }
    }

    #[test]
    fn test_partial_batch_is_not_numbered_by_position() {
        let container = MediaContainer::build(vec![record(5, "Show", 23, (2020, 1))]);
        let files: Vec<_> = [3, 8, 15, 20]
            .iter()
            .map(|ep| file(&format!("Show - {ep:02}.mkv"), batch("Show", 1, 23)))
            .collect();

        let results = match_files(&files, &container);
        assert!(results.iter().all(|r| r.outcome == MatchOutcome::Ambiguous
            && r.rule == MatchRule::BatchIncomplete
            && r.episodes == Some((1, 23))
            && r.episode.is_none()));
    }

    #[test]
    fn test_pack_members_keep_their_own_episodes() {
        let container = MediaContainer::build(vec![record(5, "Show", 23, (2020, 1))]);
        let files = vec![
            file("Show - 14.mkv", pack("Show", Some(14))),
            file("Show - 5.mkv", pack("Show", Some(5))),
            file("Show - 9.mkv", pack("Show", Some(9))),
        ];

        let results = match_files(&files, &container);
        let assigned: Vec<_> = results.iter().map(|r| (r.outcome, r.episode)).collect();
        assert_eq!(
            assigned,
            vec![
                (MatchOutcome::Matched(5), Some(14)),
                (MatchOutcome::Matched(5), Some(5)),
                (MatchOutcome::Matched(5), Some(9)),
            ]
        );
        assert!(results.iter().all(|r| r.rule == MatchRule::Batch));
    }

    #[test]
    fn test_own_episode_outside_range_is_ambiguous() {
        let container = MediaContainer::build(vec![record(5, "Show", 12, (2020, 1))]);
        let files = vec![
            file("Show - 3.mkv", pack("Show", Some(3))),
            file("Show - 30.mkv", pack("Show", Some(30))),
        ];
        let results = match_files(&files, &container);
        assert!(results.iter().all(|r| r.outcome == MatchOutcome::Ambiguous
            && r.rule == MatchRule::BatchInconsistent));
    }

    #[test]
    fn test_unmatched_batch_stays_unmatched() {
        let results = match_files(&[file("x.mkv", batch("Nope", 1, 3))], &show_family());
        assert_eq!(results[0].outcome, MatchOutcome::Unmatched);
        assert_eq!(results[0].rule, MatchRule::NoCandidates);
    }

    #[test]
    fn test_apply_clears_previous_match() {
        let mut files = vec![file("a.mkv", titled("Show", 5))];
        files[0].media_id = Some(10);
        files[0].episode = Some(5);

        let results = match_files(&files, &show_family());
        apply_matches(&mut files, &results);
        assert!(files[0].media_id.is_none());
        assert!(files[0].episode.is_none());
    }

    #[test]
    fn test_apply_leaves_locked_files_alone() {
        let container = MediaContainer::build(vec![record(1, "Show", 12, (2020, 1))]);
        let mut files = vec![file("a.mkv", titled("Show", 5))];
        files[0].locked = true;
        files[0].media_id = Some(42);
        files[0].episode = Some(7);

        let results = match_files(&files, &container);
        apply_matches(&mut files, &results);
        assert_eq!(files[0].media_id, Some(42));
        assert_eq!(files[0].episode, Some(7));
    }
}
