//! Stage 2: content fingerprinting and duplicate detection

use crate::domain::fingerprint::fingerprint_file;
use crate::domain::import::{FileDescriptor, HashedFile};
use crate::operations::import::context::ImportContext;
use crate::operations::import::error::ImportError;
use crate::operations::import::progress::{ProgressReporter, Stage};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Fingerprint every descriptor in parallel (bounded by `width`) and flag
/// duplicates against the known set and within the batch itself.
///
/// With `defer_to_copy` set (network-mounted source) nothing is read here:
/// fingerprints stay unset and the copier computes them while streaming,
/// so each file crosses the network once instead of twice.
pub async fn hash_files(
    descriptors: Vec<FileDescriptor>,
    known_hashes: &HashSet<String>,
    defer_to_copy: bool,
    width: usize,
    ctx: &ImportContext,
    reporter: &mut ProgressReporter,
) -> Result<Vec<HashedFile>, ImportError> {
    reporter.begin_stage();
    let total = descriptors.len() as u64;

    if defer_to_copy {
        debug!(files = total, "deferring hashing into the copy stream");
        reporter.files_processed = total;
        reporter.emit(ctx, Stage::Hash, total, total, None);
        return Ok(descriptors
            .into_iter()
            .map(|descriptor| HashedFile {
                descriptor,
                fingerprint: None,
                is_duplicate: false,
                hash_error: None,
            })
            .collect());
    }

    let order: HashMap<uuid::Uuid, usize> = descriptors
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id, i))
        .collect();

    let mut results = Vec::with_capacity(descriptors.len());
    let mut seen_in_batch: HashSet<String> = HashSet::new();

    let mut completions = futures::stream::iter(descriptors.into_iter().map(|descriptor| {
        let ctx = ctx.clone();
        async move {
            if ctx.is_cancelled() {
                return (descriptor, None);
            }
            let result = fingerprint_file(&descriptor.source_path).await;
            (descriptor, Some(result))
        }
    }))
    .buffer_unordered(width.max(1));

    while let Some((descriptor, result)) = completions.next().await {
        let Some(result) = result else {
            continue; // unit observed cancellation before starting
        };

        let file_name = descriptor.file_name.clone();
        let hashed = match result {
            Ok(fingerprint) => {
                let is_duplicate =
                    known_hashes.contains(&fingerprint) || !seen_in_batch.insert(fingerprint.clone());
                if is_duplicate {
                    reporter.duplicates_found += 1;
                }
                HashedFile {
                    descriptor,
                    fingerprint: Some(fingerprint),
                    is_duplicate,
                    hash_error: None,
                }
            }
            Err(e) => {
                reporter.errors_found += 1;
                HashedFile {
                    descriptor,
                    fingerprint: None,
                    is_duplicate: false,
                    hash_error: Some(e.to_string()),
                }
            }
        };

        reporter.files_processed += 1;
        reporter.emit(
            ctx,
            Stage::Hash,
            reporter.files_processed,
            total,
            Some(file_name),
        );
        results.push(hashed);
    }
    drop(completions);

    ctx.check_cancelled()?;

    // Completion order is arbitrary; downstream stages and the cover-image
    // choice expect scan order.
    results.sort_by_key(|f| order.get(&f.descriptor.id).copied().unwrap_or(usize::MAX));

    Ok(results)
}
