//! Domain types shared across the import pipeline

pub mod archive;
pub mod fingerprint;
pub mod import;
pub mod location;
pub mod media;

pub use archive::ArchivePath;
pub use location::{LocationInfo, LocationKind, SubLocationInfo};
pub use media::MediaKind;
