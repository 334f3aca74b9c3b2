//! Stage 5: catalog commit and follow-on work
//!
//! Catalog rows for a batch land inside one transaction together with the
//! import summary row. Re-running a partially completed session is safe:
//! duplicate-key conflicts are success, not errors. Everything after the
//! commit (capture linking, cover image, job submission) is best-effort
//! and never converts a successful import into a failure.

use crate::domain::import::{FinalizedFile, ValidatedFile};
use crate::domain::{LocationInfo, MediaKind};
use crate::infrastructure::database::entities::{
    document, file as other_file, image, import_batch, map, video,
};
use crate::infrastructure::database::catalog;
use crate::infrastructure::jobs::{
    JobData, JobDispatcher, JobKind, JobOptions, JobPriority, JobRequest,
};
use crate::operations::import::context::ImportContext;
use crate::operations::import::error::ImportError;
use crate::operations::import::progress::{ProgressReporter, Stage};
use crate::operations::import::scanner::CaptureGroup;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, TransactionTrait,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct Finalizer<'a> {
    conn: &'a DatabaseConnection,
    dispatcher: Arc<dyn JobDispatcher>,
    location: &'a LocationInfo,
    archive_root: &'a Path,
    imported_by: String,
}

impl<'a> Finalizer<'a> {
    pub fn new(
        conn: &'a DatabaseConnection,
        dispatcher: Arc<dyn JobDispatcher>,
        location: &'a LocationInfo,
        archive_root: &'a Path,
        imported_by: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            dispatcher,
            location,
            archive_root,
            imported_by: imported_by.into(),
        }
    }

    /// Commit the whole session in one transaction, then run the
    /// best-effort follow-on work.
    pub async fn finalize_batch(
        &self,
        validated: Vec<ValidatedFile>,
        groups: &[CaptureGroup],
        duration_ms: i64,
        ctx: &ImportContext,
        reporter: &mut ProgressReporter,
    ) -> Result<(Vec<FinalizedFile>, u64), ImportError> {
        reporter.begin_stage();
        let total = validated.iter().filter(|v| v.is_valid).count() as u64;

        let txn = self.conn.begin().await?;
        let mut finalized = Vec::with_capacity(validated.len());

        for v in validated {
            let record = self.insert_record(&txn, v).await;
            if record.catalog_id.is_some() {
                reporter.files_processed += 1;
                reporter.emit(
                    ctx,
                    Stage::Finalize,
                    reporter.files_processed,
                    total,
                    Some(record.validated.descriptor().file_name.clone()),
                );
            } else if record.finalize_error.is_some() {
                reporter.errors_found += 1;
            }
            finalized.push(record);
        }

        self.insert_batch_row(&txn, &finalized, duration_ms).await?;
        txn.commit().await?;

        let jobs_queued = self.post_process(&finalized, groups, true).await;
        Ok((finalized, jobs_queued))
    }

    /// Progressive-mode primitive: commit one file's row right after its
    /// own validation, and queue its per-file jobs. Returns the widened
    /// record plus the number of jobs queued for it.
    pub async fn finalize_one(&self, validated: ValidatedFile) -> (FinalizedFile, u64) {
        let record = self.insert_record(self.conn, validated).await;
        let mut jobs = 0;
        if record.catalog_id.is_some() {
            jobs = self.submit_file_jobs(&record).await;
        }
        (record, jobs)
    }

    /// Progressive-mode end-of-session hook: the batch-level work that
    /// batch mode runs after its commit: summary row, capture links,
    /// cover image, location jobs.
    pub async fn finish_session(
        &self,
        finalized: &[FinalizedFile],
        groups: &[CaptureGroup],
        duration_ms: i64,
    ) -> Result<u64, ImportError> {
        self.insert_batch_row(self.conn, finalized, duration_ms)
            .await?;
        Ok(self.post_process(finalized, groups, false).await)
    }

    /// Insert the catalog row for one validated file. Files that did not
    /// survive earlier stages pass through without touching the catalog.
    async fn insert_record(
        &self,
        conn: &impl ConnectionTrait,
        validated: ValidatedFile,
    ) -> FinalizedFile {
        if !validated.is_valid {
            return FinalizedFile {
                validated,
                catalog_id: None,
                finalize_error: None,
            };
        }

        let Some(fingerprint) = validated.fingerprint().map(str::to_string) else {
            return FinalizedFile {
                validated,
                catalog_id: None,
                finalize_error: Some("validated file without fingerprint".into()),
            };
        };

        match self.insert_media_row(conn, &validated, &fingerprint).await {
            Ok(()) => FinalizedFile {
                validated,
                catalog_id: Some(fingerprint),
                finalize_error: None,
            },
            Err(e) => FinalizedFile {
                validated,
                catalog_id: None,
                finalize_error: Some(e.to_string()),
            },
        }
    }

    async fn insert_media_row(
        &self,
        conn: &impl ConnectionTrait,
        v: &ValidatedFile,
        fingerprint: &str,
    ) -> Result<(), DbErr> {
        let d = v.descriptor();
        let archive_path = v
            .copied
            .archive_path
            .clone()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let file_name = PathBuf::from(&archive_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| fingerprint.to_string());
        let now = Utc::now();
        let location_id = self.location.id;
        let sub_location_id = self.location.sub_location_id();

        let result = match d.kind {
            MediaKind::Image => {
                image::Entity::insert(image::ActiveModel {
                    hash: Set(fingerprint.to_string()),
                    file_name: Set(file_name),
                    file_path: Set(archive_path),
                    original_name: Set(d.file_name.clone()),
                    original_path: Set(d.source_path.to_string_lossy().to_string()),
                    location_id: Set(location_id),
                    sub_location_id: Set(sub_location_id),
                    imported_by: Set(self.imported_by.clone()),
                    size: Set(d.size as i64),
                    sibling_hash: Set(None),
                    width: Set(None),
                    height: Set(None),
                    taken_at: Set(None),
                    camera: Set(None),
                    created_at: Set(now),
                })
                .on_conflict(
                    OnConflict::column(image::Column::Hash)
                        .do_nothing()
                        .to_owned(),
                )
                .exec(conn)
                .await
                .map(|_| ())
            }
            MediaKind::Video => {
                video::Entity::insert(video::ActiveModel {
                    hash: Set(fingerprint.to_string()),
                    file_name: Set(file_name),
                    file_path: Set(archive_path),
                    original_name: Set(d.file_name.clone()),
                    original_path: Set(d.source_path.to_string_lossy().to_string()),
                    location_id: Set(location_id),
                    sub_location_id: Set(sub_location_id),
                    imported_by: Set(self.imported_by.clone()),
                    size: Set(d.size as i64),
                    duration_secs: Set(None),
                    width: Set(None),
                    height: Set(None),
                    proxy_path: Set(None),
                    created_at: Set(now),
                })
                .on_conflict(
                    OnConflict::column(video::Column::Hash)
                        .do_nothing()
                        .to_owned(),
                )
                .exec(conn)
                .await
                .map(|_| ())
            }
            MediaKind::Document => {
                document::Entity::insert(document::ActiveModel {
                    hash: Set(fingerprint.to_string()),
                    file_name: Set(file_name),
                    file_path: Set(archive_path),
                    original_name: Set(d.file_name.clone()),
                    original_path: Set(d.source_path.to_string_lossy().to_string()),
                    location_id: Set(location_id),
                    sub_location_id: Set(sub_location_id),
                    imported_by: Set(self.imported_by.clone()),
                    size: Set(d.size as i64),
                    page_count: Set(None),
                    extracted_text: Set(None),
                    created_at: Set(now),
                })
                .on_conflict(
                    OnConflict::column(document::Column::Hash)
                        .do_nothing()
                        .to_owned(),
                )
                .exec(conn)
                .await
                .map(|_| ())
            }
            MediaKind::Map => {
                map::Entity::insert(map::ActiveModel {
                    hash: Set(fingerprint.to_string()),
                    file_name: Set(file_name),
                    file_path: Set(archive_path),
                    original_name: Set(d.file_name.clone()),
                    original_path: Set(d.source_path.to_string_lossy().to_string()),
                    location_id: Set(location_id),
                    sub_location_id: Set(sub_location_id),
                    imported_by: Set(self.imported_by.clone()),
                    size: Set(d.size as i64),
                    georeference: Set(None),
                    created_at: Set(now),
                })
                .on_conflict(
                    OnConflict::column(map::Column::Hash)
                        .do_nothing()
                        .to_owned(),
                )
                .exec(conn)
                .await
                .map(|_| ())
            }
            MediaKind::Unknown => {
                other_file::Entity::insert(other_file::ActiveModel {
                    hash: Set(fingerprint.to_string()),
                    file_name: Set(file_name),
                    file_path: Set(archive_path),
                    original_name: Set(d.file_name.clone()),
                    original_path: Set(d.source_path.to_string_lossy().to_string()),
                    location_id: Set(location_id),
                    sub_location_id: Set(sub_location_id),
                    imported_by: Set(self.imported_by.clone()),
                    size: Set(d.size as i64),
                    metadata: Set(None),
                    created_at: Set(now),
                })
                .on_conflict(
                    OnConflict::column(other_file::Column::Hash)
                        .do_nothing()
                        .to_owned(),
                )
                .exec(conn)
                .await
                .map(|_| ())
            }
        };

        match result {
            Ok(()) => Ok(()),
            // Resuming a partially committed session: the row is already
            // there, which is exactly the state we wanted
            Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn insert_batch_row(
        &self,
        conn: &impl ConnectionTrait,
        finalized: &[FinalizedFile],
        duration_ms: i64,
    ) -> Result<(), DbErr> {
        let mut counts: HashMap<MediaKind, i32> = HashMap::new();
        let mut duplicates = 0;
        let mut errors = 0;
        let mut total_bytes: i64 = 0;

        for f in finalized {
            if f.catalog_id.is_some() {
                *counts.entry(f.validated.descriptor().kind).or_default() += 1;
                total_bytes += f.validated.descriptor().size as i64;
            }
            if f.validated.copied.hashed.is_duplicate {
                duplicates += 1;
            }
            if f.validated.copied.hashed.hash_error.is_some()
                || f.validated.copied.copy_error.is_some()
                || f.validated.validation_error.is_some()
                || f.finalize_error.is_some()
            {
                errors += 1;
            }
        }

        import_batch::Entity::insert(import_batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            location_id: Set(self.location.id),
            sub_location_id: Set(self.location.sub_location_id()),
            imported_by: Set(self.imported_by.clone()),
            image_count: Set(counts.get(&MediaKind::Image).copied().unwrap_or(0)),
            video_count: Set(counts.get(&MediaKind::Video).copied().unwrap_or(0)),
            document_count: Set(counts.get(&MediaKind::Document).copied().unwrap_or(0)),
            map_count: Set(counts.get(&MediaKind::Map).copied().unwrap_or(0)),
            other_count: Set(counts.get(&MediaKind::Unknown).copied().unwrap_or(0)),
            duplicate_count: Set(duplicates),
            error_count: Set(errors),
            total_bytes: Set(total_bytes),
            duration_ms: Set(duration_ms),
            created_at: Set(Utc::now()),
        })
        .exec(conn)
        .await?;

        Ok(())
    }

    /// Best-effort follow-on work. Nothing in here may fail the import.
    async fn post_process(
        &self,
        finalized: &[FinalizedFile],
        groups: &[CaptureGroup],
        include_file_jobs: bool,
    ) -> u64 {
        self.link_captures(finalized, groups).await;
        self.assign_cover(finalized).await;

        let mut jobs_queued = 0;
        if include_file_jobs {
            for f in finalized.iter().filter(|f| f.catalog_id.is_some()) {
                jobs_queued += self.submit_file_jobs(f).await;
            }
        }
        jobs_queued += self.submit_location_jobs().await;
        jobs_queued
    }

    /// Link RAW/rendered pairs detected by the scanner. A pairing that
    /// cannot be resolved (one side missing, not finalized, wrong kind) is
    /// skipped silently.
    async fn link_captures(&self, finalized: &[FinalizedFile], groups: &[CaptureGroup]) {
        if groups.is_empty() {
            return;
        }

        let by_source: HashMap<&Path, &FinalizedFile> = finalized
            .iter()
            .filter(|f| f.catalog_id.is_some())
            .map(|f| (f.validated.descriptor().source_path.as_path(), f))
            .collect();

        for group in groups {
            let raw = by_source.get(group.raw_path.as_path());
            let rendered = by_source.get(group.rendered_path.as_path());
            let (Some(raw), Some(rendered)) = (raw, rendered) else {
                continue;
            };
            if raw.validated.descriptor().kind != MediaKind::Image
                || rendered.validated.descriptor().kind != MediaKind::Image
            {
                continue;
            }
            let (Some(raw_hash), Some(rendered_hash)) =
                (raw.catalog_id.as_deref(), rendered.catalog_id.as_deref())
            else {
                continue;
            };

            for (hash, sibling) in [(raw_hash, rendered_hash), (rendered_hash, raw_hash)] {
                let update = image::Entity::update_many()
                    .col_expr(image::Column::SiblingHash, Expr::value(sibling))
                    .filter(image::Column::Hash.eq(hash))
                    .exec(self.conn)
                    .await;
                if let Err(e) = update {
                    warn!(stem = %group.stem, error = %e, "capture link failed");
                }
            }
            debug!(stem = %group.stem, "linked capture pair");
        }
    }

    /// Give the location (and sub-location) a cover image if it has none,
    /// using the first successfully imported image of the session.
    async fn assign_cover(&self, finalized: &[FinalizedFile]) {
        let first_image = finalized.iter().find(|f| {
            f.catalog_id.is_some() && f.validated.descriptor().kind == MediaKind::Image
        });
        let Some(hash) = first_image.and_then(|f| f.catalog_id.as_deref()) else {
            return;
        };

        if let Err(e) = catalog::set_location_cover_if_empty(self.conn, self.location.id, hash).await
        {
            warn!(error = %e, "cover assignment failed");
        }
        if let Some(sub_id) = self.location.sub_location_id() {
            if let Err(e) = catalog::set_sub_location_cover_if_empty(self.conn, sub_id, hash).await
            {
                warn!(error = %e, "sub-location cover assignment failed");
            }
        }
    }

    async fn submit_file_jobs(&self, f: &FinalizedFile) -> u64 {
        let d = f.validated.descriptor();
        let Some(archive_path) = f.validated.copied.archive_path.as_ref() else {
            return 0;
        };
        let source = archive_path.to_string_lossy().to_string();
        let options = JobOptions {
            content_hash: f.catalog_id.clone(),
            media_kind: Some(d.kind),
            location_id: Some(self.location.id),
            sub_location_id: self.location.sub_location_id(),
        };

        let mut requests = vec![
            JobRequest {
                kind: JobKind::Metadata,
                plugin: "metadata-extractor".into(),
                priority: JobPriority::High,
                data: JobData {
                    source: source.clone(),
                    destination: None,
                    options: options.clone(),
                },
            },
            JobRequest {
                kind: JobKind::Thumbnail,
                plugin: "thumbnailer".into(),
                priority: JobPriority::Normal,
                data: JobData {
                    source: source.clone(),
                    destination: None,
                    options: options.clone(),
                },
            },
        ];
        if d.kind == MediaKind::Video {
            requests.push(JobRequest {
                kind: JobKind::Import,
                plugin: "video-proxy".into(),
                priority: JobPriority::Bulk,
                data: JobData {
                    source,
                    destination: None,
                    options,
                },
            });
        }

        self.submit_all(requests).await
    }

    /// Location-level jobs, queued once per session
    async fn submit_location_jobs(&self) -> u64 {
        let location_dir = self
            .archive_root
            .join("locations")
            .join(&self.location.region)
            .join(self.location.id.to_string());
        let source = location_dir.to_string_lossy().to_string();
        let options = JobOptions {
            content_hash: None,
            media_kind: None,
            location_id: Some(self.location.id),
            sub_location_id: self.location.sub_location_id(),
        };

        let requests = vec![
            JobRequest {
                kind: JobKind::Tag,
                plugin: "geo-enricher".into(),
                priority: JobPriority::Normal,
                data: JobData {
                    source: source.clone(),
                    destination: None,
                    options: options.clone(),
                },
            },
            JobRequest {
                kind: JobKind::Import,
                plugin: "location-stats".into(),
                priority: JobPriority::Bulk,
                data: JobData {
                    source: source.clone(),
                    destination: None,
                    options: options.clone(),
                },
            },
            JobRequest {
                kind: JobKind::Import,
                plugin: "preservation-manifest".into(),
                priority: JobPriority::Bulk,
                data: JobData {
                    source,
                    destination: None,
                    options,
                },
            },
        ];

        self.submit_all(requests).await
    }

    async fn submit_all(&self, requests: Vec<JobRequest>) -> u64 {
        let mut queued = 0;
        for request in requests {
            match self.dispatcher.submit(request).await {
                Ok(()) => queued += 1,
                Err(e) => warn!(error = %e, "job submission failed, skipping"),
            }
        }
        queued
    }
}
