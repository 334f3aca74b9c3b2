//! Catalog queries shared by the pipeline and the CLI

use crate::domain::{LocationInfo, LocationKind, SubLocationInfo};
use crate::infrastructure::database::entities::{
    document, file, image, location, map, sub_location, video,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QuerySelect,
};
use sea_orm::sea_query::Expr;
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

pub async fn create_location(
    conn: &impl ConnectionTrait,
    code: &str,
    name: &str,
    region: &str,
    kind: LocationKind,
) -> Result<location::Model, DbErr> {
    let now = Utc::now();
    location::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        name: Set(name.to_string()),
        region: Set(region.to_string()),
        kind: Set(kind.to_string()),
        cover_hash: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
}

pub async fn create_sub_location(
    conn: &impl ConnectionTrait,
    location_id: Uuid,
    code: &str,
    name: &str,
) -> Result<sub_location::Model, DbErr> {
    sub_location::ActiveModel {
        id: Set(Uuid::new_v4()),
        location_id: Set(location_id),
        code: Set(code.to_string()),
        name: Set(name.to_string()),
        cover_hash: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
}

/// Load the immutable session snapshot for a destination
pub async fn location_info(
    conn: &impl ConnectionTrait,
    location_id: Uuid,
    sub_location_id: Option<Uuid>,
) -> Result<Option<LocationInfo>, DbErr> {
    let Some(loc) = location::Entity::find_by_id(location_id).one(conn).await? else {
        return Ok(None);
    };

    let sub_location = match sub_location_id {
        Some(id) => sub_location::Entity::find_by_id(id)
            .one(conn)
            .await?
            .map(|s| SubLocationInfo { id: s.id, code: s.code }),
        None => None,
    };

    Ok(Some(LocationInfo {
        id: loc.id,
        code: loc.code,
        region: loc.region,
        kind: LocationKind::from_str(&loc.kind).unwrap_or(LocationKind::Other),
        sub_location,
    }))
}

pub async fn find_location_by_code(
    conn: &impl ConnectionTrait,
    code: &str,
) -> Result<Option<location::Model>, DbErr> {
    location::Entity::find()
        .filter(location::Column::Code.eq(code))
        .one(conn)
        .await
}

pub async fn find_sub_location_by_code(
    conn: &impl ConnectionTrait,
    location_id: Uuid,
    code: &str,
) -> Result<Option<sub_location::Model>, DbErr> {
    sub_location::Entity::find()
        .filter(
            sub_location::Column::LocationId
                .eq(location_id)
                .and(sub_location::Column::Code.eq(code)),
        )
        .one(conn)
        .await
}

/// Every content hash already cataloged for a location, across all media
/// tables. Seeds the hasher's known set, which is what makes re-importing
/// the same sources a no-op.
pub async fn known_hashes(
    conn: &impl ConnectionTrait,
    location_id: Uuid,
) -> Result<HashSet<String>, DbErr> {
    let mut hashes = HashSet::new();

    hashes.extend(
        image::Entity::find()
            .filter(image::Column::LocationId.eq(location_id))
            .select_only()
            .column(image::Column::Hash)
            .into_tuple::<String>()
            .all(conn)
            .await?,
    );
    hashes.extend(
        video::Entity::find()
            .filter(video::Column::LocationId.eq(location_id))
            .select_only()
            .column(video::Column::Hash)
            .into_tuple::<String>()
            .all(conn)
            .await?,
    );
    hashes.extend(
        document::Entity::find()
            .filter(document::Column::LocationId.eq(location_id))
            .select_only()
            .column(document::Column::Hash)
            .into_tuple::<String>()
            .all(conn)
            .await?,
    );
    hashes.extend(
        map::Entity::find()
            .filter(map::Column::LocationId.eq(location_id))
            .select_only()
            .column(map::Column::Hash)
            .into_tuple::<String>()
            .all(conn)
            .await?,
    );
    hashes.extend(
        file::Entity::find()
            .filter(file::Column::LocationId.eq(location_id))
            .select_only()
            .column(file::Column::Hash)
            .into_tuple::<String>()
            .all(conn)
            .await?,
    );

    Ok(hashes)
}

/// Assign a cover image unless the location already has one
pub async fn set_location_cover_if_empty(
    conn: &impl ConnectionTrait,
    location_id: Uuid,
    hash: &str,
) -> Result<(), DbErr> {
    location::Entity::update_many()
        .col_expr(location::Column::CoverHash, Expr::value(hash))
        .col_expr(location::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(
            location::Column::Id
                .eq(location_id)
                .and(location::Column::CoverHash.is_null()),
        )
        .exec(conn)
        .await?;
    Ok(())
}

pub async fn set_sub_location_cover_if_empty(
    conn: &impl ConnectionTrait,
    sub_location_id: Uuid,
    hash: &str,
) -> Result<(), DbErr> {
    sub_location::Entity::update_many()
        .col_expr(sub_location::Column::CoverHash, Expr::value(hash))
        .filter(
            sub_location::Column::Id
                .eq(sub_location_id)
                .and(sub_location::Column::CoverHash.is_null()),
        )
        .exec(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::Database;

    #[tokio::test]
    async fn location_roundtrip_and_cover_assignment() {
        let db = Database::in_memory().await.unwrap();
        let loc = create_location(db.conn(), "BLW-017", "Old Mill", "eu-de", LocationKind::Industrial)
            .await
            .unwrap();

        let info = location_info(db.conn(), loc.id, None).await.unwrap().unwrap();
        assert_eq!(info.code, "BLW-017");
        assert_eq!(info.kind, LocationKind::Industrial);
        assert!(info.sub_location.is_none());

        set_location_cover_if_empty(db.conn(), loc.id, "aaa").await.unwrap();
        set_location_cover_if_empty(db.conn(), loc.id, "bbb").await.unwrap();
        let loc = location::Entity::find_by_id(loc.id)
            .one(db.conn())
            .await
            .unwrap()
            .unwrap();
        // First writer wins; the second call must not overwrite
        assert_eq!(loc.cover_hash.as_deref(), Some("aaa"));
    }

    #[tokio::test]
    async fn known_hashes_spans_all_media_tables() {
        let db = Database::in_memory().await.unwrap();
        let loc = create_location(db.conn(), "X", "X", "eu", LocationKind::Other)
            .await
            .unwrap();

        image::ActiveModel {
            hash: Set("h-image".into()),
            file_name: Set("h-image.jpg".into()),
            file_path: Set("p".into()),
            original_name: Set("a.jpg".into()),
            original_path: Set("/src/a.jpg".into()),
            location_id: Set(loc.id),
            sub_location_id: Set(None),
            imported_by: Set("tester".into()),
            size: Set(1),
            sibling_hash: Set(None),
            width: Set(None),
            height: Set(None),
            taken_at: Set(None),
            camera: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(db.conn())
        .await
        .unwrap();

        let hashes = known_hashes(db.conn(), loc.id).await.unwrap();
        assert!(hashes.contains("h-image"));
        assert_eq!(hashes.len(), 1);
    }
}
