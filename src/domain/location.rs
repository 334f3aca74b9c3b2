//! Location context for an import session
//!
//! A location is a documented physical site; a sub-location is a named
//! subdivision of one (a wing, a floor, an outbuilding). `LocationInfo` is a
//! snapshot taken when the session starts and stays immutable for its
//! duration; archive paths are derived from it and from nothing else.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Destination context for one import session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationInfo {
    /// Stable location identifier (catalog primary key)
    pub id: Uuid,

    /// Short display code, e.g. `BLW-017`
    pub code: String,

    /// Region code the location is filed under, e.g. `eu-de`
    pub region: String,

    /// Location-type tag
    pub kind: LocationKind,

    /// Set when importing into a subdivision of the site
    pub sub_location: Option<SubLocationInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubLocationInfo {
    pub id: Uuid,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LocationKind {
    Industrial,
    Residential,
    Institutional,
    Military,
    Infrastructure,
    Other,
}

impl LocationInfo {
    pub fn sub_location_id(&self) -> Option<Uuid> {
        self.sub_location.as_ref().map(|s| s.id)
    }
}
