//! Media kind classification by file extension

use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::{Display, EnumString};

/// Kind of media a source file holds, inferred from its extension
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Document,
    Map,
    Unknown,
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "heic", "heif", "arw", "cr2",
    "cr3", "nef", "orf", "rw2", "dng", "raf",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "webm", "m4v", "mpg", "mpeg", "wmv", "mts", "m2ts", "3gp",
];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "md", "rtf", "odt", "xls", "xlsx", "csv", "ppt", "pptx",
];

const MAP_EXTENSIONS: &[&str] = &["gpx", "kml", "kmz", "geojson", "shp", "dwg", "dxf", "osm"];

/// Camera RAW formats, used for capture-group detection
const RAW_EXTENSIONS: &[&str] = &["arw", "cr2", "cr3", "nef", "orf", "rw2", "dng", "raf"];

/// Rendered still formats that can pair with a RAW of the same capture
const RENDERED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "webp", "tif", "tiff"];

impl MediaKind {
    /// Classify a file by its extension. Extensions are matched
    /// case-insensitively; files without a known extension are `Unknown`.
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = normalized_extension(path) else {
            return Self::Unknown;
        };
        Self::from_extension(&ext)
    }

    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        let ext = ext.as_str();
        if IMAGE_EXTENSIONS.contains(&ext) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            Self::Video
        } else if MAP_EXTENSIONS.contains(&ext) {
            // Checked before documents: geodata formats win over generic ones
            Self::Map
        } else if DOCUMENT_EXTENSIONS.contains(&ext) {
            Self::Document
        } else {
            Self::Unknown
        }
    }

    /// Folder segment used inside the archive tree (`org-image`, `org-video`, ...)
    pub fn archive_folder(&self) -> String {
        format!("org-{self}")
    }
}

/// Lowercased extension of a path, if it has one
pub fn normalized_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

pub fn is_raw_extension(ext: &str) -> bool {
    RAW_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

pub fn is_rendered_extension(ext: &str) -> bool {
    RENDERED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(MediaKind::from_path(&PathBuf::from("a/b/photo.JPG")), MediaKind::Image);
        assert_eq!(MediaKind::from_path(&PathBuf::from("clip.mp4")), MediaKind::Video);
        assert_eq!(MediaKind::from_path(&PathBuf::from("notes.pdf")), MediaKind::Document);
        assert_eq!(MediaKind::from_path(&PathBuf::from("site.gpx")), MediaKind::Map);
        assert_eq!(MediaKind::from_path(&PathBuf::from("blob.xyz")), MediaKind::Unknown);
        assert_eq!(MediaKind::from_path(&PathBuf::from("noext")), MediaKind::Unknown);
    }

    #[test]
    fn archive_folder_uses_snake_case_kind() {
        assert_eq!(MediaKind::Image.archive_folder(), "org-image");
        assert_eq!(MediaKind::Unknown.archive_folder(), "org-unknown");
    }

    #[test]
    fn raw_and_rendered_sets() {
        assert!(is_raw_extension("ARW"));
        assert!(is_rendered_extension("jpeg"));
        assert!(!is_raw_extension("jpg"));
    }
}
