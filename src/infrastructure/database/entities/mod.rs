//! Catalog entities
//!
//! One media table per kind, keyed by content hash, plus the location
//! hierarchy and the per-session import batch summary.

pub mod document;
pub mod file;
pub mod image;
pub mod import_batch;
pub mod location;
pub mod map;
pub mod sub_location;
pub mod video;
