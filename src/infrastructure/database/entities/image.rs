//! Image entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "images")]
pub struct Model {
    /// Content fingerprint; doubles as the catalog record id
    #[sea_orm(primary_key, auto_increment = false)]
    pub hash: String,
    pub file_name: String,
    pub file_path: String,
    pub original_name: String,
    pub original_path: String,
    pub location_id: Uuid,
    pub sub_location_id: Option<Uuid>,
    pub imported_by: String,
    pub size: i64,
    /// Hash of the other half of a RAW/rendered capture pair
    pub sibling_hash: Option<String>,
    // Populated later by the metadata job
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub taken_at: Option<DateTimeUtc>,
    pub camera: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
