//! Remote services feeding the reconciliation pipeline.
//!
//! Each client implements one of the source traits from `seiri-core`, so the
//! pipeline stays unaware of HTTP, GraphQL or response shapes.

pub mod anilist;
pub mod anizip;
