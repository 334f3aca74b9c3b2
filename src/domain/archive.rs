//! Deterministic archive path construction
//!
//! Layout, reproduced exactly for compatibility with existing archives:
//!
//! `{root}/locations/{region}/{locationId}/data/[sloc-{subLocationId}/]org-{kind}/{hash}{ext}`
//!
//! The path is a pure function of (location, kind, fingerprint, extension),
//! never of arrival order or wall-clock time, so re-running an import places
//! every file at the same spot.

use crate::domain::{LocationInfo, MediaKind};
use std::path::{Path, PathBuf};

/// A computed destination inside the archive tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePath {
    /// Directory the file lands in
    pub directory: PathBuf,
    /// `{fingerprint}{original_extension}`
    pub file_name: String,
}

impl ArchivePath {
    pub fn compute(
        archive_root: &Path,
        location: &LocationInfo,
        kind: MediaKind,
        fingerprint: &str,
        extension: Option<&str>,
    ) -> Self {
        let mut directory = archive_root
            .join("locations")
            .join(&location.region)
            .join(location.id.to_string())
            .join("data");

        if let Some(sub) = &location.sub_location {
            directory = directory.join(format!("sloc-{}", sub.id));
        }

        directory = directory.join(kind.archive_folder());

        Self {
            directory,
            file_name: archive_file_name(fingerprint, extension),
        }
    }

    pub fn full_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

pub fn archive_file_name(fingerprint: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) if !ext.is_empty() => format!("{fingerprint}.{}", ext.to_ascii_lowercase()),
        _ => fingerprint.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LocationKind, SubLocationInfo};
    use uuid::Uuid;

    fn location() -> LocationInfo {
        LocationInfo {
            id: Uuid::nil(),
            code: "BLW-017".into(),
            region: "eu-de".into(),
            kind: LocationKind::Industrial,
            sub_location: None,
        }
    }

    #[test]
    fn path_is_deterministic() {
        let root = PathBuf::from("/archive");
        let a = ArchivePath::compute(&root, &location(), MediaKind::Image, "abc123", Some("jpg"));
        let b = ArchivePath::compute(&root, &location(), MediaKind::Image, "abc123", Some("jpg"));
        assert_eq!(a, b);
        assert_eq!(
            a.full_path(),
            PathBuf::from(format!(
                "/archive/locations/eu-de/{}/data/org-image/abc123.jpg",
                Uuid::nil()
            ))
        );
    }

    #[test]
    fn sub_location_adds_sloc_segment() {
        let mut loc = location();
        let sub_id = Uuid::new_v4();
        loc.sub_location = Some(SubLocationInfo {
            id: sub_id,
            code: "B2".into(),
        });

        let path = ArchivePath::compute(
            &PathBuf::from("/archive"),
            &loc,
            MediaKind::Video,
            "ffff",
            Some("mp4"),
        );
        assert!(path
            .directory
            .to_string_lossy()
            .contains(&format!("sloc-{sub_id}")));
        assert!(path.directory.ends_with("org-video"));
    }

    #[test]
    fn extension_is_lowercased_and_optional() {
        assert_eq!(archive_file_name("abc", Some("JPG")), "abc.jpg");
        assert_eq!(archive_file_name("abc", None), "abc");
        assert_eq!(archive_file_name("abc", Some("")), "abc");
    }
}
