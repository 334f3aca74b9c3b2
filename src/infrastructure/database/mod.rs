//! Catalog database on SQLite via SeaORM

use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod catalog;
pub mod entities;
pub mod migration;

/// Wrapper owning the catalog connection pool
pub struct Database {
    conn: DatabaseConnection,
}

impl Database {
    /// Create (or open) the catalog at the given path and run migrations
    pub async fn create(path: &Path) -> Result<Self, DbErr> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DbErr::Custom(format!("failed to create directory: {e}")))?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", path.display());
        let db = Self::connect(db_url, 10).await?;
        db.migrate().await?;

        info!("opened catalog at {:?}", path);
        Ok(db)
    }

    /// In-memory catalog, used by tests. Pinned to one connection so every
    /// statement sees the same database.
    pub async fn in_memory() -> Result<Self, DbErr> {
        let db = Self::connect("sqlite::memory:".to_string(), 1).await?;
        db.migrate().await?;
        Ok(db)
    }

    async fn connect(db_url: String, max_connections: u32) -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new(db_url);
        opt.max_connections(max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt).await?;
        Ok(Self { conn })
    }

    async fn migrate(&self) -> Result<(), DbErr> {
        migration::Migrator::up(&self.conn, None).await
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}
