//! Stage 4: independent verification of every archived copy
//!
//! The archive must never silently retain corrupted data: each copied file
//! is re-read from its archive path, re-fingerprinted, and compared against
//! the fingerprint recorded at copy time. Invalid copies are deleted
//! (rollback) unless the deployment opts out.

use crate::domain::fingerprint::fingerprint_file;
use crate::domain::import::{CopiedFile, ValidatedFile};
use crate::operations::import::context::ImportContext;
use crate::operations::import::error::ImportError;
use crate::operations::import::progress::{ProgressReporter, Stage};
use futures::StreamExt;
use std::collections::HashMap;
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

/// Verify a single copied file. Duplicates and files that errored earlier
/// pass through unchanged: invalid, with the originating disposition still
/// on the inner record.
pub async fn validate_one(copied: CopiedFile, rollback: bool) -> ValidatedFile {
    let attempted = copied
        .archive_path
        .clone()
        .filter(|_| copied.was_copied());
    let Some(archive_path) = attempted else {
        return ValidatedFile {
            copied,
            is_valid: false,
            validation_error: None,
            rolled_back: false,
        };
    };
    let expected = copied
        .fingerprint()
        .map(str::to_string)
        .unwrap_or_default();

    let failure = match fingerprint_file(&archive_path).await {
        Ok(actual) if actual == expected => None,
        Ok(actual) => Some(format!(
            "fingerprint mismatch: expected {expected}, found {actual}"
        )),
        Err(e) => Some(format!("re-hash failed: {e}")),
    };

    match failure {
        None => ValidatedFile {
            copied,
            is_valid: true,
            validation_error: None,
            rolled_back: false,
        },
        Some(error) => {
            let mut rolled_back = false;
            if rollback {
                match fs::remove_file(&archive_path).await {
                    Ok(()) => rolled_back = true,
                    Err(e) => warn!(
                        path = %archive_path.display(),
                        error = %e,
                        "failed to roll back invalid archive copy"
                    ),
                }
            }
            warn!(path = %archive_path.display(), error = %error, rolled_back, "validation failed");
            ValidatedFile {
                copied,
                is_valid: false,
                validation_error: Some(error),
                rolled_back,
            }
        }
    }
}

/// Validate the whole batch, bounded by `width` (the destination's network
/// classification re-uses the copier's throttle).
pub async fn validate_files(
    copied: Vec<CopiedFile>,
    rollback: bool,
    width: usize,
    ctx: &ImportContext,
    reporter: &mut ProgressReporter,
) -> Result<Vec<ValidatedFile>, ImportError> {
    reporter.begin_stage();

    let order: HashMap<Uuid, usize> = copied
        .iter()
        .enumerate()
        .map(|(i, f)| (f.hashed.descriptor.id, i))
        .collect();
    let total = copied.iter().filter(|c| c.was_copied()).count() as u64;

    let mut results = Vec::with_capacity(copied.len());

    let mut completions = futures::stream::iter(copied.into_iter().map(|file| {
        let ctx = ctx.clone();
        async move {
            if ctx.is_cancelled() {
                return None;
            }
            Some(validate_one(file, rollback).await)
        }
    }))
    .buffer_unordered(width.max(1));

    while let Some(validated) = completions.next().await {
        let Some(validated) = validated else {
            continue;
        };

        if validated.copied.was_copied() {
            reporter.files_processed += 1;
            if !validated.is_valid {
                reporter.errors_found += 1;
            }
            reporter.emit(
                ctx,
                Stage::Validate,
                reporter.files_processed,
                total,
                Some(validated.descriptor().file_name.clone()),
            );
        }
        results.push(validated);
    }
    drop(completions);

    ctx.check_cancelled()?;

    results.sort_by_key(|f| {
        order
            .get(&f.descriptor().id)
            .copied()
            .unwrap_or(usize::MAX)
    });
    Ok(results)
}
