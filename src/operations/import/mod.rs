//! The import pipeline
//!
//! Five ordered stages (scan, hash, copy, validate, finalize), each
//! consuming the previous stage's output and producing a wider record, plus
//! this orchestrator, which sequences them for one session, folds per-stage
//! progress into a single monotonic signal, and turns the two session-level
//! conditions (cancellation, sustained network failure) into a terminal
//! report instead of a pile of per-file errors.

pub mod context;
pub mod copier;
pub mod error;
pub mod finalizer;
pub mod hasher;
pub mod network;
pub mod progress;
pub mod scanner;
pub mod validator;

pub use context::{ChannelSink, ImportContext, ImportProgress, ProgressSink};
pub use error::ImportError;

use crate::config::ImportSettings;
use crate::domain::import::FinalizedFile;
use crate::domain::LocationInfo;
use crate::infrastructure::database::{catalog, Database};
use crate::infrastructure::jobs::JobDispatcher;
use crate::operations::import::finalizer::Finalizer;
use crate::operations::import::network::{EndpointClass, WorkerProfile};
use crate::operations::import::progress::{ProgressReporter, Stage};
use crate::operations::import::scanner::{CaptureGroup, ScanIssue};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// One import session's input
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub sources: Vec<PathBuf>,
    pub location: LocationInfo,
    /// Actor recorded on every catalog row this session produces
    pub imported_by: String,
    /// Finalize each file right after its own validation instead of
    /// committing the whole batch at the end
    pub progressive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Completed,
    CompletedWithErrors,
    Cancelled,
    /// Session-level failure (sustained network errors); the remaining
    /// queue was abandoned
    Aborted,
}

/// Terminal record for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub status: ImportStatus,
    pub total_imported: u64,
    pub total_copied: u64,
    pub total_duplicates: u64,
    pub total_errors: u64,
    pub total_invalid: u64,
    pub total_rolled_back: u64,
    pub bytes_copied: u64,
    pub jobs_queued: u64,
    pub duration_ms: u64,
    /// Message of the session-level failure for aborted sessions
    pub failure: Option<String>,
}

struct StageOutcome {
    finalized: Vec<FinalizedFile>,
    jobs_queued: u64,
    scan_issues: Vec<ScanIssue>,
}

/// Drives stages 2–5 for one session (scanning runs ahead inside `run`).
/// All collaborators are explicit: the catalog handle, the archive root,
/// the settings, and the job dispatcher arrive through the constructor,
/// never through ambient state.
pub struct ImportPipeline {
    db: Arc<Database>,
    archive_root: PathBuf,
    settings: ImportSettings,
    dispatcher: Arc<dyn JobDispatcher>,
}

impl ImportPipeline {
    pub fn new(
        db: Arc<Database>,
        archive_root: PathBuf,
        settings: ImportSettings,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> Self {
        Self {
            db,
            archive_root,
            settings,
            dispatcher,
        }
    }

    /// Run one import session to its terminal report. Cancellation and
    /// sustained network failure end the session cleanly with a
    /// `Cancelled` / `Aborted` report; infrastructure errors propagate.
    pub async fn run(
        &self,
        request: ImportRequest,
        ctx: &ImportContext,
    ) -> Result<ImportReport, ImportError> {
        let started = Instant::now();
        info!(
            location = %request.location.code,
            sources = request.sources.len(),
            progressive = request.progressive,
            "import session starting"
        );

        let mut reporter = ProgressReporter::default();

        match self.run_stages(&request, started, ctx, &mut reporter).await {
            Ok(outcome) => {
                let report = build_report(&outcome, started);
                info!(
                    status = ?report.status,
                    imported = report.total_imported,
                    duplicates = report.total_duplicates,
                    errors = report.total_errors,
                    "import session finished"
                );
                Ok(report)
            }
            Err(ImportError::Cancelled) => {
                info!("import session cancelled");
                Ok(interrupted_report(
                    ImportStatus::Cancelled,
                    &reporter,
                    started,
                    None,
                ))
            }
            Err(e @ ImportError::NetworkFailure { .. }) => {
                warn!(error = %e, "import session aborted");
                Ok(interrupted_report(
                    ImportStatus::Aborted,
                    &reporter,
                    started,
                    Some(e.to_string()),
                ))
            }
            Err(e) => Err(e),
        }
    }

    async fn run_stages(
        &self,
        request: &ImportRequest,
        started: Instant,
        ctx: &ImportContext,
        reporter: &mut ProgressReporter,
    ) -> Result<StageOutcome, ImportError> {
        let location = &request.location;
        let endpoints = EndpointClass::classify(
            &request.sources,
            &self.archive_root,
            &self.settings.network_path_markers,
        );
        let profile = WorkerProfile::detect(
            self.settings.local_workers,
            self.settings.network_workers,
        );
        if endpoints.any_network() {
            info!(
                source_network = endpoints.source_network,
                dest_network = endpoints.dest_network,
                "network storage detected, throttling concurrency"
            );
        }

        // Stage 1: scan
        let scan = scanner::scan(&request.sources, ctx).await?;
        reporter.files_total = scan.files.len() as u64;
        reporter.bytes_total = scan.files.iter().map(|f| f.size).sum();
        reporter.errors_found += scan.issues.len() as u64;
        reporter.emit(ctx, Stage::Scan, 1, 1, None);

        // Resume support: fingerprints already cataloged for this location
        // become the known set, so previously imported files fall out as
        // duplicates instead of being copied again.
        let known = catalog::known_hashes(self.db.conn(), location.id).await?;

        // Stage 2: hash (deferred into the copy stream for network sources)
        let hashed = hasher::hash_files(
            scan.files,
            &known,
            endpoints.source_network,
            profile.width(endpoints.source_network),
            ctx,
            reporter,
        )
        .await?;

        // Stage 3: copy
        let copied = copier::copy_files(
            hashed,
            location,
            &self.archive_root,
            &self.settings,
            &known,
            endpoints,
            ctx,
            reporter,
        )
        .await?;

        let finalizer = Finalizer::new(
            self.db.conn(),
            self.dispatcher.clone(),
            location,
            &self.archive_root,
            request.imported_by.clone(),
        );

        // Stages 4 + 5
        let (finalized, jobs_queued) = if request.progressive {
            self.run_progressive(copied, &finalizer, &scan.capture_groups, started, ctx, reporter)
                .await?
        } else {
            let validated = validator::validate_files(
                copied,
                self.settings.rollback_invalid,
                profile.width(endpoints.dest_network),
                ctx,
                reporter,
            )
            .await?;
            finalizer
                .finalize_batch(
                    validated,
                    &scan.capture_groups,
                    started.elapsed().as_millis() as i64,
                    ctx,
                    reporter,
                )
                .await?
        };

        Ok(StageOutcome {
            finalized,
            jobs_queued,
            scan_issues: scan.issues,
        })
    }

    /// Progressive mode: one file at a time through validate + finalize,
    /// so earlier files are committed and visible even if a later file
    /// fails; the batch-level work runs once at the end.
    async fn run_progressive(
        &self,
        copied: Vec<crate::domain::import::CopiedFile>,
        finalizer: &Finalizer<'_>,
        groups: &[CaptureGroup],
        started: Instant,
        ctx: &ImportContext,
        reporter: &mut ProgressReporter,
    ) -> Result<(Vec<FinalizedFile>, u64), ImportError> {
        reporter.begin_stage();
        let total = copied.iter().filter(|c| c.was_copied()).count() as u64;
        let mut finalized = Vec::with_capacity(copied.len());
        let mut jobs_queued = 0;

        for file in copied {
            ctx.check_cancelled()?;
            let attempted = file.was_copied();
            let validated =
                validator::validate_one(file, self.settings.rollback_invalid).await;

            if attempted {
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

            let (record, jobs) = finalizer.finalize_one(validated).await;
            if record.finalize_error.is_some() {
                reporter.errors_found += 1;
            }
            jobs_queued += jobs;
            finalized.push(record);
        }

        jobs_queued += finalizer
            .finish_session(&finalized, groups, started.elapsed().as_millis() as i64)
            .await?;

        Ok((finalized, jobs_queued))
    }
}

fn build_report(outcome: &StageOutcome, started: Instant) -> ImportReport {
    let mut report = ImportReport {
        status: ImportStatus::Completed,
        total_imported: 0,
        total_copied: 0,
        total_duplicates: 0,
        total_errors: outcome.scan_issues.len() as u64,
        total_invalid: 0,
        total_rolled_back: 0,
        bytes_copied: 0,
        jobs_queued: outcome.jobs_queued,
        duration_ms: started.elapsed().as_millis() as u64,
        failure: None,
    };

    for f in &outcome.finalized {
        let copied = &f.validated.copied;
        if f.catalog_id.is_some() {
            report.total_imported += 1;
        }
        if copied.was_copied() {
            report.total_copied += 1;
            report.bytes_copied += copied.bytes_written;
        }
        if copied.hashed.is_duplicate {
            report.total_duplicates += 1;
        }
        if copied.was_copied() && !f.validated.is_valid {
            report.total_invalid += 1;
        }
        if f.validated.rolled_back {
            report.total_rolled_back += 1;
        }
        if copied.hashed.hash_error.is_some()
            || copied.copy_error.is_some()
            || f.validated.validation_error.is_some()
            || f.finalize_error.is_some()
        {
            report.total_errors += 1;
        }
    }

    if report.total_errors > 0 {
        report.status = ImportStatus::CompletedWithErrors;
    }
    report
}

fn interrupted_report(
    status: ImportStatus,
    reporter: &ProgressReporter,
    started: Instant,
    failure: Option<String>,
) -> ImportReport {
    ImportReport {
        status,
        total_imported: 0,
        total_copied: 0,
        total_duplicates: reporter.duplicates_found,
        total_errors: reporter.errors_found,
        total_invalid: 0,
        total_rolled_back: 0,
        bytes_copied: reporter.bytes_processed,
        jobs_queued: 0,
        duration_ms: started.elapsed().as_millis() as u64,
        failure,
    }
}
