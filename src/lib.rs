//! sitevault-core
//!
//! Archival media ingestion for documenting physical sites: verified,
//! content-addressed, deduplicated archive copies with committed catalog
//! records and chain-of-custody guarantees.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod operations;

use crate::config::VaultConfig;
use crate::infrastructure::database::{catalog, Database};
use crate::infrastructure::jobs::{JobDispatcher, NullDispatcher};
use crate::operations::import::{
    ImportContext, ImportError, ImportPipeline, ImportReport, ImportRequest,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// The main context for one opened archive: configuration, catalog, and
/// the job dispatcher, wired once and passed around explicitly.
pub struct Vault {
    config: VaultConfig,
    db: Arc<Database>,
    dispatcher: Arc<dyn JobDispatcher>,
}

impl Vault {
    /// Open (or initialize) the archive described by the config
    pub async fn open(config: VaultConfig) -> Result<Self, sea_orm::DbErr> {
        let db = Arc::new(Database::create(&config.database_path).await?);
        info!(archive_root = ?config.archive_root, "vault opened");
        Ok(Self {
            config,
            db,
            dispatcher: Arc::new(NullDispatcher),
        })
    }

    /// Replace the no-op dispatcher with a real one
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn JobDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run one import session into the given catalog location
    pub async fn import(
        &self,
        sources: Vec<PathBuf>,
        location_id: Uuid,
        sub_location_id: Option<Uuid>,
        imported_by: impl Into<String>,
        progressive: bool,
        ctx: &ImportContext,
    ) -> Result<ImportReport, ImportError> {
        let location = catalog::location_info(self.db.conn(), location_id, sub_location_id)
            .await?
            .ok_or(ImportError::LocationNotFound(location_id))?;

        let pipeline = ImportPipeline::new(
            self.db.clone(),
            self.config.archive_root.clone(),
            self.config.import.clone(),
            self.dispatcher.clone(),
        );

        pipeline
            .run(
                ImportRequest {
                    sources,
                    location,
                    imported_by: imported_by.into(),
                    progressive,
                },
                ctx,
            )
            .await
    }
}
