//! Stage 1: walk source roots and classify files

use crate::domain::import::FileDescriptor;
use crate::domain::media::{self, MediaKind};
use crate::operations::import::context::ImportContext;
use crate::operations::import::error::ImportError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// A RAW + rendered pair sharing one capture, resolved by the finalizer
#[derive(Debug, Clone)]
pub struct CaptureGroup {
    pub stem: String,
    pub raw_path: PathBuf,
    pub rendered_path: PathBuf,
}

/// A source entry that could not be read; never fatal to the scan
#[derive(Debug, Clone)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<FileDescriptor>,
    pub capture_groups: Vec<CaptureGroup>,
    pub issues: Vec<ScanIssue>,
}

/// Recursively enumerate regular files under the given roots. Symlinks are
/// never followed (neither directories nor files), so the walk cannot be
/// redirected outside the requested roots.
pub async fn scan(roots: &[PathBuf], ctx: &ImportContext) -> Result<ScanOutcome, ImportError> {
    let mut outcome = ScanOutcome::default();
    let mut pending: Vec<PathBuf> = Vec::new();

    for root in roots {
        match tokio::fs::symlink_metadata(root).await {
            Ok(meta) if meta.is_file() => {
                outcome.files.push(describe(root, meta.len()));
            }
            Ok(meta) if meta.is_dir() => pending.push(root.clone()),
            Ok(_) => {
                debug!(path = %root.display(), "skipping symlinked root");
            }
            Err(e) => outcome.issues.push(ScanIssue {
                path: root.clone(),
                message: e.to_string(),
            }),
        }
    }

    while let Some(dir) = pending.pop() {
        ctx.check_cancelled()?;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "unreadable directory");
                outcome.issues.push(ScanIssue {
                    path: dir,
                    message: e.to_string(),
                });
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    outcome.issues.push(ScanIssue {
                        path: dir.clone(),
                        message: e.to_string(),
                    });
                    break;
                }
            };

            let path = entry.path();
            match tokio::fs::symlink_metadata(&path).await {
                Ok(meta) if meta.is_file() => outcome.files.push(describe(&path, meta.len())),
                Ok(meta) if meta.is_dir() => pending.push(path),
                Ok(_) => debug!(path = %path.display(), "skipping symlink"),
                Err(e) => outcome.issues.push(ScanIssue {
                    path,
                    message: e.to_string(),
                }),
            }
        }
    }

    outcome.capture_groups = detect_capture_groups(&outcome.files);

    debug!(
        files = outcome.files.len(),
        groups = outcome.capture_groups.len(),
        issues = outcome.issues.len(),
        "scan complete"
    );

    Ok(outcome)
}

fn describe(path: &Path, size: u64) -> FileDescriptor {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    FileDescriptor {
        id: Uuid::new_v4(),
        file_name,
        source_path: path.to_path_buf(),
        extension: media::normalized_extension(path),
        size,
        kind: MediaKind::from_path(path),
    }
}

/// Files sharing (directory, stem) where one side is a camera RAW and the
/// other a rendered still belong to the same capture.
fn detect_capture_groups(files: &[FileDescriptor]) -> Vec<CaptureGroup> {
    let mut by_stem: HashMap<(PathBuf, String), Vec<&FileDescriptor>> = HashMap::new();

    for file in files {
        let Some(parent) = file.source_path.parent() else {
            continue;
        };
        let Some(stem) = file.source_path.file_stem() else {
            continue;
        };
        by_stem
            .entry((parent.to_path_buf(), stem.to_string_lossy().to_ascii_lowercase()))
            .or_default()
            .push(file);
    }

    let mut groups = Vec::new();
    for ((_, stem), members) in by_stem {
        if members.len() < 2 {
            continue;
        }
        let raw = members.iter().find(|f| {
            f.extension
                .as_deref()
                .is_some_and(media::is_raw_extension)
        });
        let rendered = members.iter().find(|f| {
            f.extension
                .as_deref()
                .is_some_and(media::is_rendered_extension)
        });

        if let (Some(raw), Some(rendered)) = (raw, rendered) {
            groups.push(CaptureGroup {
                stem,
                raw_path: raw.source_path.clone(),
                rendered_path: rendered.source_path.clone(),
            });
        }
    }

    // HashMap iteration order is arbitrary; keep the outcome stable
    groups.sort_by(|a, b| a.raw_path.cmp(&b.raw_path));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    #[tokio::test]
    async fn walks_nested_directories_and_classifies() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested/deeper")).await.unwrap();
        fs::write(dir.path().join("a.jpg"), b"jpeg").await.unwrap();
        fs::write(dir.path().join("nested/b.mp4"), b"video").await.unwrap();
        fs::write(dir.path().join("nested/deeper/c.pdf"), b"doc").await.unwrap();

        let ctx = ImportContext::new();
        let outcome = scan(&[dir.path().to_path_buf()], &ctx).await.unwrap();

        assert_eq!(outcome.files.len(), 3);
        assert!(outcome.issues.is_empty());
        let kinds: Vec<_> = {
            let mut sorted: Vec<_> = outcome
                .files
                .iter()
                .map(|f| (f.file_name.clone(), f.kind))
                .collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            sorted.into_iter().map(|(_, k)| k).collect()
        };
        assert_eq!(kinds, vec![MediaKind::Image, MediaKind::Video, MediaKind::Document]);
    }

    #[tokio::test]
    async fn missing_root_is_an_issue_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ImportContext::new();
        let outcome = scan(&[dir.path().join("missing")], &ctx).await.unwrap();
        assert!(outcome.files.is_empty());
        assert_eq!(outcome.issues.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_directories_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.jpg"), b"x").await.unwrap();
        tokio::fs::symlink(outside.path(), dir.path().join("escape"))
            .await
            .unwrap();
        fs::write(dir.path().join("inside.jpg"), b"y").await.unwrap();

        let ctx = ImportContext::new();
        let outcome = scan(&[dir.path().to_path_buf()], &ctx).await.unwrap();
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].file_name, "inside.jpg");
    }

    #[tokio::test]
    async fn pairs_raw_with_rendered_capture() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("DSC0001.ARW"), b"raw").await.unwrap();
        fs::write(dir.path().join("DSC0001.JPG"), b"jpg").await.unwrap();
        fs::write(dir.path().join("DSC0002.JPG"), b"jpg2").await.unwrap();

        let ctx = ImportContext::new();
        let outcome = scan(&[dir.path().to_path_buf()], &ctx).await.unwrap();

        assert_eq!(outcome.capture_groups.len(), 1);
        let group = &outcome.capture_groups[0];
        assert_eq!(group.stem, "dsc0001");
        assert!(group.raw_path.ends_with("DSC0001.ARW"));
        assert!(group.rendered_path.ends_with("DSC0001.JPG"));
    }
}
