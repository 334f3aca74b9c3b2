//! Per-file records flowing through the import pipeline
//!
//! Each stage consumes the previous stage's records and produces a new,
//! wider record; nothing is mutated in place. A file ends the session in
//! exactly one terminal disposition: duplicate, hash error, copy error,
//! validation rollback, or finalized.

use crate::domain::MediaKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::Display;
use uuid::Uuid;

/// A regular file found by the scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: Uuid,
    pub file_name: String,
    pub source_path: PathBuf,
    /// Lowercased extension, if any
    pub extension: Option<String>,
    pub size: u64,
    pub kind: MediaKind,
}

/// How a file ended up placed in the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CopyMethod {
    HardLink,
    SymLink,
    ByteCopy,
}

#[derive(Debug, Clone)]
pub struct HashedFile {
    pub descriptor: FileDescriptor,
    /// None when hashing was deferred into the copy stream (network source)
    pub fingerprint: Option<String>,
    pub is_duplicate: bool,
    pub hash_error: Option<String>,
}

impl HashedFile {
    /// Files the copier should attempt: not duplicates, not hash failures
    pub fn needs_copy(&self) -> bool {
        !self.is_duplicate && self.hash_error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct CopiedFile {
    pub hashed: HashedFile,
    /// Final archive path; None if the file was not copied
    pub archive_path: Option<PathBuf>,
    pub copy_error: Option<String>,
    pub method: Option<CopyMethod>,
    /// Bytes physically written; 0 for link-based placement
    pub bytes_written: u64,
}

impl CopiedFile {
    /// A file that never reached the copier keeps its earlier disposition
    pub fn skipped(hashed: HashedFile) -> Self {
        Self {
            hashed,
            archive_path: None,
            copy_error: None,
            method: None,
            bytes_written: 0,
        }
    }

    pub fn was_copied(&self) -> bool {
        self.archive_path.is_some() && self.copy_error.is_none()
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.hashed.fingerprint.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub copied: CopiedFile,
    pub is_valid: bool,
    pub validation_error: Option<String>,
    /// True when an invalid archive copy was deleted during rollback
    pub rolled_back: bool,
}

impl ValidatedFile {
    pub fn descriptor(&self) -> &FileDescriptor {
        &self.copied.hashed.descriptor
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.copied.fingerprint()
    }
}

#[derive(Debug, Clone)]
pub struct FinalizedFile {
    pub validated: ValidatedFile,
    /// Catalog record identifier; equals the content fingerprint
    pub catalog_id: Option<String>,
    pub finalize_error: Option<String>,
}
