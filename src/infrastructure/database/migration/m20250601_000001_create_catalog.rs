//! Initial migration: location hierarchy, media tables, import batches

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Locations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Locations::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Locations::Code).string().not_null().unique_key())
                    .col(ColumnDef::new(Locations::Name).string().not_null())
                    .col(ColumnDef::new(Locations::Region).string().not_null())
                    .col(ColumnDef::new(Locations::Kind).string().not_null())
                    .col(ColumnDef::new(Locations::CoverHash).string())
                    .col(ColumnDef::new(Locations::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Locations::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SubLocations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SubLocations::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(SubLocations::LocationId).uuid().not_null())
                    .col(ColumnDef::new(SubLocations::Code).string().not_null())
                    .col(ColumnDef::new(SubLocations::Name).string().not_null())
                    .col(ColumnDef::new(SubLocations::CoverHash).string())
                    .col(ColumnDef::new(SubLocations::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(SubLocations::Table, SubLocations::LocationId)
                            .to(Locations::Table, Locations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Images::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Images::Hash).string().not_null().primary_key())
                    .col(ColumnDef::new(Images::FileName).string().not_null())
                    .col(ColumnDef::new(Images::FilePath).string().not_null())
                    .col(ColumnDef::new(Images::OriginalName).string().not_null())
                    .col(ColumnDef::new(Images::OriginalPath).string().not_null())
                    .col(ColumnDef::new(Images::LocationId).uuid().not_null())
                    .col(ColumnDef::new(Images::SubLocationId).uuid())
                    .col(ColumnDef::new(Images::ImportedBy).string().not_null())
                    .col(ColumnDef::new(Images::Size).big_integer().not_null())
                    .col(ColumnDef::new(Images::SiblingHash).string())
                    .col(ColumnDef::new(Images::Width).integer())
                    .col(ColumnDef::new(Images::Height).integer())
                    .col(ColumnDef::new(Images::TakenAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Images::Camera).string())
                    .col(ColumnDef::new(Images::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Images::Table, Images::LocationId)
                            .to(Locations::Table, Locations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Videos::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Videos::Hash).string().not_null().primary_key())
                    .col(ColumnDef::new(Videos::FileName).string().not_null())
                    .col(ColumnDef::new(Videos::FilePath).string().not_null())
                    .col(ColumnDef::new(Videos::OriginalName).string().not_null())
                    .col(ColumnDef::new(Videos::OriginalPath).string().not_null())
                    .col(ColumnDef::new(Videos::LocationId).uuid().not_null())
                    .col(ColumnDef::new(Videos::SubLocationId).uuid())
                    .col(ColumnDef::new(Videos::ImportedBy).string().not_null())
                    .col(ColumnDef::new(Videos::Size).big_integer().not_null())
                    .col(ColumnDef::new(Videos::DurationSecs).double())
                    .col(ColumnDef::new(Videos::Width).integer())
                    .col(ColumnDef::new(Videos::Height).integer())
                    .col(ColumnDef::new(Videos::ProxyPath).string())
                    .col(ColumnDef::new(Videos::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Videos::Table, Videos::LocationId)
                            .to(Locations::Table, Locations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Documents::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Documents::Hash).string().not_null().primary_key())
                    .col(ColumnDef::new(Documents::FileName).string().not_null())
                    .col(ColumnDef::new(Documents::FilePath).string().not_null())
                    .col(ColumnDef::new(Documents::OriginalName).string().not_null())
                    .col(ColumnDef::new(Documents::OriginalPath).string().not_null())
                    .col(ColumnDef::new(Documents::LocationId).uuid().not_null())
                    .col(ColumnDef::new(Documents::SubLocationId).uuid())
                    .col(ColumnDef::new(Documents::ImportedBy).string().not_null())
                    .col(ColumnDef::new(Documents::Size).big_integer().not_null())
                    .col(ColumnDef::new(Documents::PageCount).integer())
                    .col(ColumnDef::new(Documents::ExtractedText).text())
                    .col(ColumnDef::new(Documents::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Documents::Table, Documents::LocationId)
                            .to(Locations::Table, Locations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Maps::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Maps::Hash).string().not_null().primary_key())
                    .col(ColumnDef::new(Maps::FileName).string().not_null())
                    .col(ColumnDef::new(Maps::FilePath).string().not_null())
                    .col(ColumnDef::new(Maps::OriginalName).string().not_null())
                    .col(ColumnDef::new(Maps::OriginalPath).string().not_null())
                    .col(ColumnDef::new(Maps::LocationId).uuid().not_null())
                    .col(ColumnDef::new(Maps::SubLocationId).uuid())
                    .col(ColumnDef::new(Maps::ImportedBy).string().not_null())
                    .col(ColumnDef::new(Maps::Size).big_integer().not_null())
                    .col(ColumnDef::new(Maps::Georeference).json())
                    .col(ColumnDef::new(Maps::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Maps::Table, Maps::LocationId)
                            .to(Locations::Table, Locations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Files::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Files::Hash).string().not_null().primary_key())
                    .col(ColumnDef::new(Files::FileName).string().not_null())
                    .col(ColumnDef::new(Files::FilePath).string().not_null())
                    .col(ColumnDef::new(Files::OriginalName).string().not_null())
                    .col(ColumnDef::new(Files::OriginalPath).string().not_null())
                    .col(ColumnDef::new(Files::LocationId).uuid().not_null())
                    .col(ColumnDef::new(Files::SubLocationId).uuid())
                    .col(ColumnDef::new(Files::ImportedBy).string().not_null())
                    .col(ColumnDef::new(Files::Size).big_integer().not_null())
                    .col(ColumnDef::new(Files::Metadata).json())
                    .col(ColumnDef::new(Files::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Files::Table, Files::LocationId)
                            .to(Locations::Table, Locations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ImportBatches::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ImportBatches::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ImportBatches::LocationId).uuid().not_null())
                    .col(ColumnDef::new(ImportBatches::SubLocationId).uuid())
                    .col(ColumnDef::new(ImportBatches::ImportedBy).string().not_null())
                    .col(ColumnDef::new(ImportBatches::ImageCount).integer().not_null().default(0))
                    .col(ColumnDef::new(ImportBatches::VideoCount).integer().not_null().default(0))
                    .col(ColumnDef::new(ImportBatches::DocumentCount).integer().not_null().default(0))
                    .col(ColumnDef::new(ImportBatches::MapCount).integer().not_null().default(0))
                    .col(ColumnDef::new(ImportBatches::OtherCount).integer().not_null().default(0))
                    .col(ColumnDef::new(ImportBatches::DuplicateCount).integer().not_null().default(0))
                    .col(ColumnDef::new(ImportBatches::ErrorCount).integer().not_null().default(0))
                    .col(ColumnDef::new(ImportBatches::TotalBytes).big_integer().not_null().default(0))
                    .col(ColumnDef::new(ImportBatches::DurationMs).big_integer().not_null().default(0))
                    .col(ColumnDef::new(ImportBatches::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(ImportBatches::Table, ImportBatches::LocationId)
                            .to(Locations::Table, Locations::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Sibling lookups during capture linking hit images by location
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_images_location")
                    .table(Images::Table)
                    .col(Images::LocationId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ImportBatches::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Files::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Maps::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Documents::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Videos::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Images::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(SubLocations::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Locations::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Locations {
    Table,
    Id,
    Code,
    Name,
    Region,
    Kind,
    CoverHash,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SubLocations {
    Table,
    Id,
    LocationId,
    Code,
    Name,
    CoverHash,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Images {
    Table,
    Hash,
    FileName,
    FilePath,
    OriginalName,
    OriginalPath,
    LocationId,
    SubLocationId,
    ImportedBy,
    Size,
    SiblingHash,
    Width,
    Height,
    TakenAt,
    Camera,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Videos {
    Table,
    Hash,
    FileName,
    FilePath,
    OriginalName,
    OriginalPath,
    LocationId,
    SubLocationId,
    ImportedBy,
    Size,
    DurationSecs,
    Width,
    Height,
    ProxyPath,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Documents {
    Table,
    Hash,
    FileName,
    FilePath,
    OriginalName,
    OriginalPath,
    LocationId,
    SubLocationId,
    ImportedBy,
    Size,
    PageCount,
    ExtractedText,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Maps {
    Table,
    Hash,
    FileName,
    FilePath,
    OriginalName,
    OriginalPath,
    LocationId,
    SubLocationId,
    ImportedBy,
    Size,
    Georeference,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Files {
    Table,
    Hash,
    FileName,
    FilePath,
    OriginalName,
    OriginalPath,
    LocationId,
    SubLocationId,
    ImportedBy,
    Size,
    Metadata,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ImportBatches {
    Table,
    Id,
    LocationId,
    SubLocationId,
    ImportedBy,
    ImageCount,
    VideoCount,
    DocumentCount,
    MapCount,
    OtherCount,
    DuplicateCount,
    ErrorCount,
    TotalBytes,
    DurationMs,
    CreatedAt,
}
