//! Background job submission
//!
//! The import pipeline does not run follow-on work itself; it builds job
//! requests and hands them to an external dispatcher. Submission failures
//! are logged and skipped; they never fail an import.

use crate::domain::MediaKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobKind {
    Metadata,
    Thumbnail,
    Tag,
    Import,
    Capture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum JobPriority {
    Critical,
    High,
    Normal,
    Low,
    Bulk,
}

/// Everything a downstream worker needs to pick the job up cold
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_kind: Option<MediaKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_location_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobData {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    pub options: JobOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub plugin: String,
    pub priority: JobPriority,
    pub data: JobData,
}

#[derive(Debug, thiserror::Error)]
#[error("job dispatch failed: {0}")]
pub struct DispatchError(pub String);

/// Seam to the external job dispatcher
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn submit(&self, request: JobRequest) -> Result<(), DispatchError>;
}

/// Dispatcher that logs and drops every request; the default when no
/// dispatcher is wired up (headless and test use).
#[derive(Debug, Default)]
pub struct NullDispatcher;

#[async_trait]
impl JobDispatcher for NullDispatcher {
    async fn submit(&self, request: JobRequest) -> Result<(), DispatchError> {
        tracing::debug!(
            kind = %request.kind,
            plugin = %request.plugin,
            priority = %request.priority,
            "dropping job request (no dispatcher configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_shape() {
        let request = JobRequest {
            kind: JobKind::Thumbnail,
            plugin: "thumbnailer".into(),
            priority: JobPriority::Normal,
            data: JobData {
                source: "/archive/a.jpg".into(),
                destination: None,
                options: JobOptions {
                    content_hash: Some("abc".into()),
                    media_kind: Some(MediaKind::Image),
                    ..Default::default()
                },
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "thumbnail");
        assert_eq!(json["priority"], "NORMAL");
        assert_eq!(json["data"]["options"]["content_hash"], "abc");
        assert!(json["data"].get("destination").is_none());
    }
}
