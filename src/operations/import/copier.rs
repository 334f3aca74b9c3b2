//! Stage 3: atomic placement into the archive tree
//!
//! Every variant writes (or links) to a uniquely named temporary path in
//! the destination directory, then renames into place, so a file is never
//! observable at its final archive path half-written. In link-preferring
//! mode the strategies cascade hard link → symlink → byte copy; the last
//! attempt's error is the one reported.

use crate::config::{CopyMode, ImportSettings};
use crate::domain::archive::ArchivePath;
use crate::domain::import::{CopiedFile, CopyMethod, HashedFile};
use crate::domain::LocationInfo;
use crate::operations::import::context::ImportContext;
use crate::operations::import::error::ImportError;
use crate::operations::import::network::{
    self, ConsecutiveFailureGuard, EndpointClass, WorkerProfile,
};
use crate::operations::import::progress::{ProgressReporter, Stage};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Places one pre-fingerprinted file at its destination
#[async_trait]
pub(crate) trait PlaceFile: Send + Sync {
    async fn place(&self, file: &HashedFile, dest: &ArchivePath) -> io::Result<(CopyMethod, u64)>;
}

/// The ordered strategy chain for the configured copy mode
pub(crate) struct StrategyChain {
    mode: CopyMode,
}

impl StrategyChain {
    pub(crate) fn new(mode: CopyMode) -> Self {
        Self { mode }
    }

    fn strategies(&self) -> &'static [CopyMethod] {
        match self.mode {
            CopyMode::LinkPreferred => {
                &[CopyMethod::HardLink, CopyMethod::SymLink, CopyMethod::ByteCopy]
            }
            CopyMode::CopyOnly => &[CopyMethod::ByteCopy],
        }
    }
}

#[async_trait]
impl PlaceFile for StrategyChain {
    async fn place(&self, file: &HashedFile, dest: &ArchivePath) -> io::Result<(CopyMethod, u64)> {
        let source = &file.descriptor.source_path;
        let final_path = dest.full_path();
        let mut last_error: Option<io::Error> = None;

        for method in self.strategies() {
            let temp = temp_path(&dest.directory, &dest.file_name);
            let attempt: io::Result<u64> = async {
                let bytes = match method {
                    CopyMethod::HardLink => {
                        fs::hard_link(source, &temp).await?;
                        0
                    }
                    CopyMethod::SymLink => {
                        // An absolute target keeps the link valid no matter
                        // where the archive tree itself gets mounted
                        let target = fs::canonicalize(source).await?;
                        make_symlink(&target, &temp).await?;
                        0
                    }
                    CopyMethod::ByteCopy => copy_bytes(source, &temp).await?,
                };
                fs::rename(&temp, &final_path).await?;
                Ok(bytes)
            }
            .await;

            match attempt {
                Ok(bytes) => return Ok((*method, bytes)),
                Err(e) => {
                    let _ = fs::remove_file(&temp).await;
                    debug!(
                        method = %method,
                        source = %source.display(),
                        error = %e,
                        "copy strategy failed, cascading"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no copy strategy available")))
    }
}

/// Copy every file that still needs placing. Returns the distinguished
/// `NetworkFailure` once the consecutive network-error threshold is hit;
/// remaining queued files are then never attempted.
pub async fn copy_files(
    files: Vec<HashedFile>,
    location: &LocationInfo,
    archive_root: &Path,
    settings: &ImportSettings,
    known_hashes: &HashSet<String>,
    endpoints: EndpointClass,
    ctx: &ImportContext,
    reporter: &mut ProgressReporter,
) -> Result<Vec<CopiedFile>, ImportError> {
    let width = WorkerProfile::detect(settings.local_workers, settings.network_workers)
        .width(endpoints.any_network());
    let chain = StrategyChain::new(settings.copy_mode);

    pre_create_directories(&files, location, archive_root, endpoints.dest_network).await;

    run_copy_queue(
        files,
        &chain,
        location,
        archive_root,
        known_hashes,
        width,
        settings.network_failure_threshold,
        ctx,
        reporter,
    )
    .await
}

/// Worker result, resolved on the consumer loop
enum CopyAttempt {
    /// Cancellation or session abort observed before the unit started
    NotStarted(HashedFile),
    Done(CopiedFile),
    /// Deferred-hash file streamed to a temp path; the fingerprint is only
    /// now known, so duplicate resolution and the final rename happen on
    /// the consumer loop where the batch-seen set lives.
    Pending {
        hashed: HashedFile,
        temp: PathBuf,
        fingerprint: String,
        bytes: u64,
    },
    Failed {
        hashed: HashedFile,
        error: String,
        network: bool,
    },
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_copy_queue(
    files: Vec<HashedFile>,
    placer: &(dyn PlaceFile),
    location: &LocationInfo,
    archive_root: &Path,
    known_hashes: &HashSet<String>,
    width: usize,
    failure_threshold: u32,
    ctx: &ImportContext,
    reporter: &mut ProgressReporter,
) -> Result<Vec<CopiedFile>, ImportError> {
    reporter.begin_stage();

    let order: HashMap<Uuid, usize> = files
        .iter()
        .enumerate()
        .map(|(i, f)| (f.descriptor.id, i))
        .collect();

    let (to_copy, skipped): (Vec<_>, Vec<_>) = files.into_iter().partition(|f| f.needs_copy());
    let total = to_copy.len() as u64;
    let mut results: Vec<CopiedFile> = skipped.into_iter().map(CopiedFile::skipped).collect();

    let abort = Arc::new(AtomicBool::new(false));
    let mut guard = ConsecutiveFailureGuard::new(failure_threshold);
    let mut failure: Option<ImportError> = None;
    // Fingerprints that already have an archive copy, including ones that
    // only became known mid-stage (deferred hashing)
    let mut seen: HashSet<String> = known_hashes.clone();

    let mut completions = futures::stream::iter(to_copy.into_iter().map(|file| {
        let ctx = ctx.clone();
        let abort = abort.clone();
        async move {
            if ctx.is_cancelled() || abort.load(Ordering::Relaxed) {
                return CopyAttempt::NotStarted(file);
            }

            match &file.fingerprint {
                Some(fp) => {
                    let dest = ArchivePath::compute(
                        archive_root,
                        location,
                        file.descriptor.kind,
                        fp,
                        file.descriptor.extension.as_deref(),
                    );
                    match placer.place(&file, &dest).await {
                        Ok((method, bytes)) => CopyAttempt::Done(CopiedFile {
                            hashed: file,
                            archive_path: Some(dest.full_path()),
                            copy_error: None,
                            method: Some(method),
                            bytes_written: bytes,
                        }),
                        Err(e) => CopyAttempt::Failed {
                            network: network::is_network_error(&e),
                            error: e.to_string(),
                            hashed: file,
                        },
                    }
                }
                None => {
                    // Hash deferred from the network source: one streaming
                    // pass both copies and fingerprints
                    let dest_dir = ArchivePath::compute(
                        archive_root,
                        location,
                        file.descriptor.kind,
                        "pending",
                        None,
                    )
                    .directory;
                    match stream_hash_to_temp(&file.descriptor.source_path, &dest_dir).await {
                        Ok((temp, fingerprint, bytes)) => CopyAttempt::Pending {
                            hashed: file,
                            temp,
                            fingerprint,
                            bytes,
                        },
                        Err(e) => CopyAttempt::Failed {
                            network: network::is_network_error(&e),
                            error: e.to_string(),
                            hashed: file,
                        },
                    }
                }
            }
        }
    }))
    .buffer_unordered(width.max(1));

    while let Some(attempt) = completions.next().await {
        match attempt {
            CopyAttempt::NotStarted(hashed) => {
                results.push(CopiedFile::skipped(hashed));
            }
            CopyAttempt::Done(copied) => {
                guard.reset();
                if let Some(fp) = copied.fingerprint() {
                    seen.insert(fp.to_string());
                }
                reporter.files_processed += 1;
                reporter.bytes_processed += copied.hashed.descriptor.size;
                reporter.emit(
                    ctx,
                    Stage::Copy,
                    reporter.files_processed,
                    total,
                    Some(copied.hashed.descriptor.file_name.clone()),
                );
                results.push(copied);
            }
            CopyAttempt::Pending {
                hashed,
                temp,
                fingerprint,
                bytes,
            } => {
                guard.reset();
                let resolved =
                    resolve_pending(hashed, temp, fingerprint, bytes, &mut seen, location, archive_root)
                        .await;
                match &resolved {
                    Resolved::Duplicate(_) => reporter.duplicates_found += 1,
                    Resolved::Failed(_) => reporter.errors_found += 1,
                    Resolved::Copied(_) => {}
                }
                let copied = resolved.into_inner();
                reporter.files_processed += 1;
                reporter.bytes_processed += copied.hashed.descriptor.size;
                reporter.emit(
                    ctx,
                    Stage::Copy,
                    reporter.files_processed,
                    total,
                    Some(copied.hashed.descriptor.file_name.clone()),
                );
                results.push(copied);
            }
            CopyAttempt::Failed {
                hashed,
                error,
                network,
            } => {
                reporter.files_processed += 1;
                reporter.errors_found += 1;
                if network {
                    if let Some(err) = guard.record_network_error(&error) {
                        abort.store(true, Ordering::Relaxed);
                        failure.get_or_insert(err);
                    }
                } else {
                    guard.reset();
                }
                warn!(
                    file = %hashed.descriptor.source_path.display(),
                    network,
                    error = %error,
                    "copy failed"
                );
                reporter.emit(
                    ctx,
                    Stage::Copy,
                    reporter.files_processed,
                    total,
                    Some(hashed.descriptor.file_name.clone()),
                );
                results.push(CopiedFile {
                    hashed,
                    archive_path: None,
                    copy_error: Some(error),
                    method: None,
                    bytes_written: 0,
                });
            }
        }
    }
    drop(completions);

    if let Some(err) = failure {
        return Err(err);
    }
    ctx.check_cancelled()?;

    results.sort_by_key(|f| {
        order
            .get(&f.hashed.descriptor.id)
            .copied()
            .unwrap_or(usize::MAX)
    });
    Ok(results)
}

enum Resolved {
    Copied(CopiedFile),
    Duplicate(CopiedFile),
    Failed(CopiedFile),
}

impl Resolved {
    fn into_inner(self) -> CopiedFile {
        match self {
            Resolved::Copied(c) | Resolved::Duplicate(c) | Resolved::Failed(c) => c,
        }
    }
}

/// Finish a deferred-hash placement now that the fingerprint is known:
/// either it is a duplicate (drop the temp) or it gets renamed to its
/// hash-derived final name.
async fn resolve_pending(
    hashed: HashedFile,
    temp: PathBuf,
    fingerprint: String,
    bytes: u64,
    seen: &mut HashSet<String>,
    location: &LocationInfo,
    archive_root: &Path,
) -> Resolved {
    let hashed = HashedFile {
        fingerprint: Some(fingerprint.clone()),
        ..hashed
    };

    if !seen.insert(fingerprint.clone()) {
        let _ = fs::remove_file(&temp).await;
        return Resolved::Duplicate(CopiedFile {
            hashed: HashedFile {
                is_duplicate: true,
                ..hashed
            },
            archive_path: None,
            copy_error: None,
            method: None,
            bytes_written: 0,
        });
    }

    let dest = ArchivePath::compute(
        archive_root,
        location,
        hashed.descriptor.kind,
        &fingerprint,
        hashed.descriptor.extension.as_deref(),
    );
    match fs::rename(&temp, dest.full_path()).await {
        Ok(()) => Resolved::Copied(CopiedFile {
            hashed,
            archive_path: Some(dest.full_path()),
            copy_error: None,
            method: Some(CopyMethod::ByteCopy),
            bytes_written: bytes,
        }),
        Err(e) => {
            let _ = fs::remove_file(&temp).await;
            seen.remove(&fingerprint);
            Resolved::Failed(CopiedFile {
                hashed,
                archive_path: None,
                copy_error: Some(e.to_string()),
                method: None,
                bytes_written: 0,
            })
        }
    }
}

/// All destination directories for the batch are created up front; one by
/// one for network destinations (round-trip storms destabilize shares),
/// concurrently for local ones.
async fn pre_create_directories(
    files: &[HashedFile],
    location: &LocationInfo,
    archive_root: &Path,
    dest_network: bool,
) {
    let dirs: HashSet<PathBuf> = files
        .iter()
        .filter(|f| f.needs_copy())
        .map(|f| {
            ArchivePath::compute(archive_root, location, f.descriptor.kind, "pending", None)
                .directory
        })
        .collect();

    if dest_network {
        for dir in dirs {
            if let Err(e) = fs::create_dir_all(&dir).await {
                warn!(dir = %dir.display(), error = %e, "failed to pre-create directory");
            }
        }
    } else {
        futures::future::join_all(dirs.into_iter().map(|dir| async move {
            if let Err(e) = fs::create_dir_all(&dir).await {
                warn!(dir = %dir.display(), error = %e, "failed to pre-create directory");
            }
        }))
        .await;
    }
}

fn temp_path(directory: &Path, file_name: &str) -> PathBuf {
    directory.join(format!(".{file_name}.{}.svtmp", Uuid::new_v4().simple()))
}

async fn copy_bytes(source: &Path, dest: &Path) -> io::Result<u64> {
    let mut reader = fs::File::open(source).await?;
    let mut writer = fs::File::create(dest).await?;
    let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read]).await?;
        total += read as u64;
    }

    writer.flush().await?;
    writer.sync_all().await?;
    Ok(total)
}

/// Stream a file to a temp path while hashing it in the same pass
async fn stream_hash_to_temp(
    source: &Path,
    dest_dir: &Path,
) -> io::Result<(PathBuf, String, u64)> {
    let temp = dest_dir.join(format!(".pending-{}.svtmp", Uuid::new_v4().simple()));

    let result: io::Result<(String, u64)> = async {
        let mut reader = fs::File::open(source).await?;
        let mut writer = fs::File::create(&temp).await?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
        let mut total = 0u64;

        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            writer.write_all(&buffer[..read]).await?;
            total += read as u64;
        }

        writer.flush().await?;
        writer.sync_all().await?;
        Ok((hasher.finalize().to_hex().to_string(), total))
    }
    .await;

    match result {
        Ok((fingerprint, bytes)) => Ok((temp, fingerprint, bytes)),
        Err(e) => {
            let _ = fs::remove_file(&temp).await;
            Err(e)
        }
    }
}

#[cfg(unix)]
async fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    fs::symlink(target, link).await
}

#[cfg(windows)]
async fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    fs::symlink_file(target, link).await
}
