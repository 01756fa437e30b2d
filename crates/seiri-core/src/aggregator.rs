use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::models::{Collection, Entry, LibraryEntry, ListStatus, LocalFile, MediaId, StatusList};

/// Group matched files under the user's list, one group per status.
///
/// Groups are built in parallel; the repeating group is folded into the
/// current group only after every group is complete. List entries without
/// local files are dropped. Output keeps the collection's list order.
#[tracing::instrument(name = "aggregate", skip_all, fields(lists = collection.lists.len(), files = files.len()))]
pub fn aggregate(collection: &Collection, files: &[LocalFile]) -> Vec<LibraryEntry> {
    let mut by_media: HashMap<MediaId, Vec<&LocalFile>> = HashMap::new();
    for file in files.iter().filter(|f| !f.ignored) {
        if let Some(media_id) = file.media_id {
            by_media.entry(media_id).or_default().push(file);
        }
    }

    let groups: Vec<LibraryEntry> = collection
        .lists
        .par_iter()
        .map(|list| build_group(list, &by_media))
        .collect();

    merge_repeating(groups)
}

fn build_group(list: &StatusList, by_media: &HashMap<MediaId, Vec<&LocalFile>>) -> LibraryEntry {
    let entries = list
        .entries
        .iter()
        .filter_map(|entry| {
            let local = by_media.get(&entry.media.id)?;
            let local_files: Vec<LocalFile> = local.iter().map(|f| (*f).clone()).collect();
            Some(Entry {
                media: entry.media.clone(),
                progress: entry.progress,
                score: entry.score,
                all_files_locked: all_locked(&local_files),
                local_files,
            })
        })
        .collect();

    LibraryEntry {
        status: list.status,
        entries,
    }
}

/// True iff `files` is non-empty and every file is locked.
pub fn all_locked(files: &[LocalFile]) -> bool {
    !files.is_empty() && files.iter().all(|f| f.locked)
}

/// Fold the repeating group into the current group.
///
/// Repeating entries whose media is already in current are dropped. When
/// there is no current group, a new one is put first.
pub fn merge_repeating(groups: Vec<LibraryEntry>) -> Vec<LibraryEntry> {
    let (repeating, mut rest): (Vec<_>, Vec<_>) = groups
        .into_iter()
        .partition(|g| g.status == ListStatus::Repeating);

    if repeating.is_empty() {
        return rest;
    }

    let repeating_entries: Vec<Entry> = repeating.into_iter().flat_map(|g| g.entries).collect();
    match rest.iter_mut().find(|g| g.status == ListStatus::Current) {
        Some(current) => {
            let mut seen: HashSet<MediaId> = current.entries.iter().map(|e| e.media.id).collect();
            current.entries.extend(
                repeating_entries
                    .into_iter()
                    .filter(|e| seen.insert(e.media.id)),
            );
        }
        None => {
            let mut seen = HashSet::new();
            let entries = repeating_entries
                .into_iter()
                .filter(|e| seen.insert(e.media.id))
                .collect();
            rest.insert(
                0,
                LibraryEntry {
                    status: ListStatus::Current,
                    entries,
                },
            );
        }
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListEntry, MediaRecord, MediaTitle};

    fn media(id: MediaId) -> MediaRecord {
        MediaRecord {
            id,
            title: MediaTitle {
                romaji: Some(format!("Media {id}")),
                ..Default::default()
            },
            synonyms: vec![],
            format: Default::default(),
            episodes: Some(12),
            start_date: None,
        }
    }

    fn list(status: ListStatus, ids: &[MediaId]) -> StatusList {
        StatusList {
            status,
            entries: ids
                .iter()
                .map(|&id| ListEntry {
                    media: media(id),
                    progress: 3,
                    score: 8.5,
                })
                .collect(),
        }
    }

    fn file(name: &str, media_id: MediaId, locked: bool) -> LocalFile {
        let mut f = LocalFile::new(format!("/anime/{name}"));
        f.media_id = Some(media_id);
        f.locked = locked;
        f
    }

    fn statuses(groups: &[LibraryEntry]) -> Vec<ListStatus> {
        groups.iter().map(|g| g.status).collect()
    }

    #[test]
    fn test_entries_without_files_are_dropped() {
        let collection = Collection {
            lists: vec![
                list(ListStatus::Current, &[1, 2]),
                list(ListStatus::Completed, &[3]),
            ],
        };
        let files = vec![file("a.mkv", 1, false), file("b.mkv", 1, false)];

        let groups = aggregate(&collection, &files);

        assert_eq!(statuses(&groups), vec![ListStatus::Current, ListStatus::Completed]);
        assert_eq!(groups[0].entries.len(), 1);
        assert_eq!(groups[0].entries[0].media.id, 1);
        assert_eq!(groups[0].entries[0].progress, 3);
        assert_eq!(groups[0].entries[0].local_files.len(), 2);
        assert!(groups[1].entries.is_empty());
    }

    #[test]
    fn test_all_files_locked() {
        let collection = Collection {
            lists: vec![list(ListStatus::Current, &[1, 2])],
        };
        let files = vec![
            file("a.mkv", 1, true),
            file("b.mkv", 1, true),
            file("c.mkv", 2, true),
            file("d.mkv", 2, false),
        ];

        let groups = aggregate(&collection, &files);

        assert!(groups[0].entries[0].all_files_locked);
        assert!(!groups[0].entries[1].all_files_locked);
        assert!(!all_locked(&[]));
    }

    #[test]
    fn test_ignored_and_unmatched_files_are_left_out() {
        let collection = Collection {
            lists: vec![list(ListStatus::Current, &[1])],
        };
        let mut ignored = file("ignored.mkv", 1, false);
        ignored.ignored = true;
        let unmatched = LocalFile::new("/anime/unmatched.mkv");
        let files = vec![file("a.mkv", 1, true), ignored, unmatched];

        let groups = aggregate(&collection, &files);

        assert_eq!(groups[0].entries[0].local_files.len(), 1);
        assert!(groups[0].entries[0].all_files_locked);
    }

    #[test]
    fn test_repeating_folds_into_current() {
        let collection = Collection {
            lists: vec![
                list(ListStatus::Current, &[1, 2]),
                list(ListStatus::Repeating, &[2, 3]),
                list(ListStatus::Planning, &[4]),
            ],
        };
        let files = vec![
            file("1.mkv", 1, false),
            file("2.mkv", 2, false),
            file("3a.mkv", 3, false),
            file("3b.mkv", 3, false),
            file("4.mkv", 4, false),
        ];

        let groups = aggregate(&collection, &files);

        assert_eq!(statuses(&groups), vec![ListStatus::Current, ListStatus::Planning]);
        let current = &groups[0];
        let ids: Vec<_> = current.entries.iter().map(|e| e.media.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        // 2 (current) + 3 (repeating) - 1 (media 2 counted twice).
        assert_eq!(current.file_count(), 4);
    }

    #[test]
    fn test_repeating_without_current_becomes_current() {
        let groups = merge_repeating(vec![
            LibraryEntry {
                status: ListStatus::Completed,
                entries: vec![],
            },
            LibraryEntry {
                status: ListStatus::Repeating,
                entries: vec![],
            },
        ]);
        assert_eq!(statuses(&groups), vec![ListStatus::Current, ListStatus::Completed]);
    }

    #[test]
    fn test_merge_without_repeating_is_identity() {
        let groups = vec![LibraryEntry {
            status: ListStatus::Paused,
            entries: vec![],
        }];
        assert_eq!(merge_repeating(groups.clone()), groups);
    }
}
