mod episode;
mod library;
mod local_file;
mod media;
mod parsed;

pub use episode::{EpisodeMapping, EpisodeMetadata};
pub use library::{Collection, Entry, LibraryEntry, ListEntry, ListStatus, StatusList};
pub use local_file::{normalize_path, LocalFile};
pub use media::{MediaFormat, MediaId, MediaRecord, MediaTitle};
pub use parsed::ParsedMetadata;
