//! End-to-end import pipeline tests

use sitevault_core::config::{CopyMode, ImportSettings, VaultConfig};
use sitevault_core::domain::archive::ArchivePath;
use sitevault_core::domain::fingerprint::fingerprint_bytes;
use sitevault_core::domain::{LocationInfo, LocationKind, MediaKind, SubLocationInfo};
use sitevault_core::infrastructure::database::catalog;
use sitevault_core::infrastructure::database::entities::{image, import_batch, location};
use sitevault_core::infrastructure::jobs::{DispatchError, JobDispatcher, JobRequest};
use sitevault_core::operations::import::network::EndpointClass;
use sitevault_core::operations::import::progress::ProgressReporter;
use sitevault_core::operations::import::{
    copier, hasher, scanner, validator, ImportContext, ImportStatus,
};
use sitevault_core::Vault;
use sea_orm::EntityTrait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

/// Dispatcher that records every request instead of running anything
#[derive(Default)]
struct RecordingDispatcher {
    requests: Mutex<Vec<JobRequest>>,
}

impl RecordingDispatcher {
    fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl JobDispatcher for RecordingDispatcher {
    async fn submit(&self, request: JobRequest) -> Result<(), DispatchError> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

struct TestVault {
    data: TempDir,
    vault: Vault,
    jobs: Arc<RecordingDispatcher>,
    location_id: Uuid,
    location_info: LocationInfo,
}

impl TestVault {
    fn config(&self) -> VaultConfig {
        self.vault.config().clone()
    }

    fn archive_root(&self) -> PathBuf {
        self.vault.config().archive_root.clone()
    }
}

async fn setup(mode: CopyMode) -> TestVault {
    let data = tempfile::tempdir().unwrap();
    let config = VaultConfig {
        archive_root: data.path().join("archive"),
        database_path: data.path().join("catalog.db"),
        import: ImportSettings {
            copy_mode: mode,
            ..Default::default()
        },
    };

    let jobs = Arc::new(RecordingDispatcher::default());
    let vault = Vault::open(config)
        .await
        .unwrap()
        .with_dispatcher(jobs.clone());

    let loc = catalog::create_location(
        vault.database().conn(),
        "BLW-017",
        "Old Boiler Works",
        "eu-de",
        LocationKind::Industrial,
    )
    .await
    .unwrap();

    let location_info = LocationInfo {
        id: loc.id,
        code: loc.code.clone(),
        region: loc.region.clone(),
        kind: LocationKind::Industrial,
        sub_location: None,
    };

    TestVault {
        data,
        vault,
        jobs,
        location_id: loc.id,
        location_info,
    }
}

async fn write_source(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    tokio::fs::write(&path, content).await.unwrap();
    path
}

fn image_path(tv: &TestVault, content: &[u8]) -> PathBuf {
    ArchivePath::compute(
        &tv.archive_root(),
        &tv.location_info,
        MediaKind::Image,
        &fingerprint_bytes(content),
        Some("jpg"),
    )
    .full_path()
}

#[tokio::test]
async fn scenario_a_fresh_import_of_two_images() {
    let tv = setup(CopyMode::CopyOnly).await;
    let src = tempfile::tempdir().unwrap();
    write_source(src.path(), "front.jpg", b"front elevation").await;
    write_source(src.path(), "hall.jpg", b"turbine hall").await;

    let ctx = ImportContext::new();
    let report = tv
        .vault
        .import(
            vec![src.path().to_path_buf()],
            tv.location_id,
            None,
            "tester",
            false,
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(report.status, ImportStatus::Completed);
    assert_eq!(report.total_copied, 2);
    assert_eq!(report.total_imported, 2);
    assert_eq!(report.total_duplicates, 0);
    assert_eq!(report.total_errors, 0);

    // Files sit at their deterministic hash-named paths
    assert!(image_path(&tv, b"front elevation").exists());
    assert!(image_path(&tv, b"turbine hall").exists());

    // Two catalog rows, both attributed to the actor
    let rows = image::Entity::find().all(tv.vault.database().conn()).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.imported_by == "tester"));

    // Cover image got assigned to one of the session's images
    let loc = location::Entity::find_by_id(tv.location_id)
        .one(tv.vault.database().conn())
        .await
        .unwrap()
        .unwrap();
    let hashes: HashSet<String> = rows.iter().map(|r| r.hash.clone()).collect();
    assert!(hashes.contains(loc.cover_hash.as_deref().unwrap()));

    // metadata + thumbnail per image, plus the three location-level jobs
    assert_eq!(report.jobs_queued, 7);
    assert_eq!(tv.jobs.count(), 7);

    // One import batch row with per-kind counts
    let batches = import_batch::Entity::find()
        .all(tv.vault.database().conn())
        .await
        .unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].image_count, 2);
    assert_eq!(batches[0].duplicate_count, 0);
}

#[tokio::test]
async fn scenario_b_reimport_is_idempotent() {
    let tv = setup(CopyMode::CopyOnly).await;
    let src = tempfile::tempdir().unwrap();
    write_source(src.path(), "front.jpg", b"front elevation").await;
    write_source(src.path(), "hall.jpg", b"turbine hall").await;

    let ctx = ImportContext::new();
    let first = tv
        .vault
        .import(
            vec![src.path().to_path_buf()],
            tv.location_id,
            None,
            "tester",
            false,
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(first.total_copied, 2);

    // A fresh Vault over the same catalog sees the hashes from run one
    let vault2 = Vault::open(tv.config()).await.unwrap();
    let second = vault2
        .import(
            vec![src.path().to_path_buf()],
            tv.location_id,
            None,
            "tester",
            false,
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(second.total_copied, 0);
    assert_eq!(second.total_duplicates, 2);
    assert_eq!(second.total_imported, 0);
    assert_eq!(second.status, ImportStatus::Completed);

    let rows = image::Entity::find().all(vault2.database().conn()).await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn scenario_c_corruption_is_rolled_back() {
    let tv = setup(CopyMode::CopyOnly).await;
    let src = tempfile::tempdir().unwrap();
    write_source(src.path(), "shot.jpg", b"original pixels").await;

    // Drive the stages by hand so the archive copy can be corrupted
    // between copy and validation
    let ctx = ImportContext::new();
    let mut reporter = ProgressReporter::new(1, 15);
    let scanned = scanner::scan(&[src.path().to_path_buf()], &ctx).await.unwrap();
    let hashed = hasher::hash_files(
        scanned.files,
        &HashSet::new(),
        false,
        2,
        &ctx,
        &mut reporter,
    )
    .await
    .unwrap();
    let copied = copier::copy_files(
        hashed,
        &tv.location_info,
        &tv.archive_root(),
        &tv.config().import,
        &HashSet::new(),
        EndpointClass::default(),
        &ctx,
        &mut reporter,
    )
    .await
    .unwrap();

    let archive_path = copied[0].archive_path.clone().unwrap();
    tokio::fs::write(&archive_path, b"bit rot").await.unwrap();

    let validated = validator::validate_files(copied, true, 2, &ctx, &mut reporter)
        .await
        .unwrap();

    assert!(!validated[0].is_valid);
    assert!(validated[0].rolled_back);
    assert!(!archive_path.exists());
}

#[tokio::test]
async fn interrupted_copy_leaves_no_artifacts() {
    let tv = setup(CopyMode::CopyOnly).await;
    let src = tempfile::tempdir().unwrap();
    write_source(src.path(), "shot.jpg", b"payload").await;

    let ctx = ImportContext::new();
    let mut reporter = ProgressReporter::new(1, 7);
    let scanned = scanner::scan(&[src.path().to_path_buf()], &ctx).await.unwrap();
    let hashed = hasher::hash_files(
        scanned.files,
        &HashSet::new(),
        false,
        2,
        &ctx,
        &mut reporter,
    )
    .await
    .unwrap();

    // Source vanishes between hashing and copying; the copy must fail
    // without leaving anything at or near the final path
    tokio::fs::remove_file(src.path().join("shot.jpg")).await.unwrap();

    let copied = copier::copy_files(
        hashed,
        &tv.location_info,
        &tv.archive_root(),
        &tv.config().import,
        &HashSet::new(),
        EndpointClass::default(),
        &ctx,
        &mut reporter,
    )
    .await
    .unwrap();

    assert!(copied[0].copy_error.is_some());
    let dir = image_path(&tv, b"payload").parent().unwrap().to_path_buf();
    let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn progressive_mode_reaches_the_same_end_state() {
    let tv = setup(CopyMode::CopyOnly).await;
    let src = tempfile::tempdir().unwrap();
    write_source(src.path(), "front.jpg", b"front elevation").await;
    write_source(src.path(), "notes.pdf", b"survey notes").await;

    let ctx = ImportContext::new();
    let report = tv
        .vault
        .import(
            vec![src.path().to_path_buf()],
            tv.location_id,
            None,
            "tester",
            true,
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(report.status, ImportStatus::Completed);
    assert_eq!(report.total_imported, 2);

    let images = image::Entity::find().all(tv.vault.database().conn()).await.unwrap();
    assert_eq!(images.len(), 1);
    let batches = import_batch::Entity::find()
        .all(tv.vault.database().conn())
        .await
        .unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].image_count, 1);
    assert_eq!(batches[0].document_count, 1);
}

#[tokio::test]
async fn sub_location_import_files_under_sloc_segment() {
    let tv = setup(CopyMode::CopyOnly).await;
    let sub = catalog::create_sub_location(tv.vault.database().conn(), tv.location_id, "B2", "Basement")
        .await
        .unwrap();
    let src = tempfile::tempdir().unwrap();
    write_source(src.path(), "pit.jpg", b"flooded pit").await;

    let ctx = ImportContext::new();
    let report = tv
        .vault
        .import(
            vec![src.path().to_path_buf()],
            tv.location_id,
            Some(sub.id),
            "tester",
            false,
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(report.total_imported, 1);

    let mut info = tv.location_info.clone();
    info.sub_location = Some(SubLocationInfo {
        id: sub.id,
        code: "B2".into(),
    });
    let expected = ArchivePath::compute(
        &tv.archive_root(),
        &info,
        MediaKind::Image,
        &fingerprint_bytes(b"flooded pit"),
        Some("jpg"),
    )
    .full_path();
    assert!(expected.exists());
    assert!(expected.to_string_lossy().contains(&format!("sloc-{}", sub.id)));

    let rows = image::Entity::find().all(tv.vault.database().conn()).await.unwrap();
    assert_eq!(rows[0].sub_location_id, Some(sub.id));

    // Sub-location cover follows the same first-image rule
    let sub_row = sitevault_core::infrastructure::database::entities::sub_location::Entity::find_by_id(sub.id)
        .one(tv.vault.database().conn())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        sub_row.cover_hash.as_deref(),
        Some(fingerprint_bytes(b"flooded pit").as_str())
    );
}

#[tokio::test]
async fn capture_pairs_are_linked_after_commit() {
    let tv = setup(CopyMode::CopyOnly).await;
    let src = tempfile::tempdir().unwrap();
    write_source(src.path(), "DSC0007.arw", b"raw sensor dump").await;
    write_source(src.path(), "DSC0007.jpg", b"rendered jpeg").await;

    let ctx = ImportContext::new();
    let report = tv
        .vault
        .import(
            vec![src.path().to_path_buf()],
            tv.location_id,
            None,
            "tester",
            false,
            &ctx,
        )
        .await
        .unwrap();
    assert_eq!(report.total_imported, 2);

    let raw_hash = fingerprint_bytes(b"raw sensor dump");
    let jpg_hash = fingerprint_bytes(b"rendered jpeg");

    let rows = image::Entity::find().all(tv.vault.database().conn()).await.unwrap();
    let raw_row = rows.iter().find(|r| r.hash == raw_hash).unwrap();
    let jpg_row = rows.iter().find(|r| r.hash == jpg_hash).unwrap();
    assert_eq!(raw_row.sibling_hash.as_deref(), Some(jpg_hash.as_str()));
    assert_eq!(jpg_row.sibling_hash.as_deref(), Some(raw_hash.as_str()));
}

#[tokio::test]
async fn network_source_defers_hashing_and_still_lands_files() {
    let data = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();

    // Classify the source directory as network storage via the marker list
    let config = VaultConfig {
        archive_root: data.path().join("archive"),
        database_path: data.path().join("catalog.db"),
        import: ImportSettings {
            copy_mode: CopyMode::CopyOnly,
            network_path_markers: vec![src.path().to_string_lossy().to_string()],
            ..Default::default()
        },
    };
    let vault = Vault::open(config).await.unwrap();
    let loc = catalog::create_location(
        vault.database().conn(),
        "NAS-1",
        "Remote",
        "eu-de",
        LocationKind::Other,
    )
    .await
    .unwrap();

    write_source(src.path(), "a.jpg", b"over the wire").await;
    write_source(src.path(), "b.jpg", b"over the wire").await; // duplicate content

    let ctx = ImportContext::new();
    let report = vault
        .import(
            vec![src.path().to_path_buf()],
            loc.id,
            None,
            "tester",
            false,
            &ctx,
        )
        .await
        .unwrap();

    // One lands, the other is detected as a duplicate only after its
    // streaming hash resolves
    assert_eq!(report.total_copied, 1);
    assert_eq!(report.total_duplicates, 1);
    assert_eq!(report.total_imported, 1);

    let info = LocationInfo {
        id: loc.id,
        code: loc.code,
        region: loc.region,
        kind: LocationKind::Other,
        sub_location: None,
    };
    let expected = ArchivePath::compute(
        &data.path().join("archive"),
        &info,
        MediaKind::Image,
        &fingerprint_bytes(b"over the wire"),
        Some("jpg"),
    )
    .full_path();
    assert!(expected.exists());
}

#[tokio::test]
async fn cancellation_before_work_reports_cancelled() {
    let tv = setup(CopyMode::CopyOnly).await;
    let src = tempfile::tempdir().unwrap();
    write_source(src.path(), "front.jpg", b"front elevation").await;

    let ctx = ImportContext::new();
    ctx.cancellation_token().cancel();

    let report = tv
        .vault
        .import(
            vec![src.path().to_path_buf()],
            tv.location_id,
            None,
            "tester",
            false,
            &ctx,
        )
        .await
        .unwrap();

    assert_eq!(report.status, ImportStatus::Cancelled);
    assert_eq!(report.total_imported, 0);
    assert!(image::Entity::find()
        .all(tv.vault.database().conn())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn link_preferred_mode_records_zero_bytes_written() {
    let tv = setup(CopyMode::LinkPreferred).await;
    // Source inside the same tempdir tree as the archive, so a hard link
    // on the same filesystem is possible
    let src = tv.data.path().join("incoming");
    tokio::fs::create_dir_all(&src).await.unwrap();
    write_source(&src, "front.jpg", b"front elevation").await;

    let ctx = ImportContext::new();
    let report = tv
        .vault
        .import(vec![src.clone()], tv.location_id, None, "tester", false, &ctx)
        .await
        .unwrap();

    assert_eq!(report.total_imported, 1);
    assert_eq!(report.bytes_copied, 0);
    assert!(image_path(&tv, b"front elevation").exists());
}
