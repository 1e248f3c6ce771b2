use super::PullOptions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request to pull `repository:tag` for an optional platform (empty = engine default)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImagePullRequest {
    pub repository: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub platform: String,
}

impl ImagePullRequest {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
            platform: String::new(),
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn options(&self) -> PullOptions<'_> {
        PullOptions {
            repository: &self.repository,
            tag: &self.tag,
            platform: &self.platform,
        }
    }

    pub fn reference(&self) -> String {
        self.options().reference()
    }
}

/// One entry of the image listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: String,
    /// Serialized as `tag` even though it holds every repo tag
    #[serde(rename = "tag")]
    pub tags: Vec<String>,
    #[serde(rename = "created")]
    pub created_at: i64,
    pub size: i64,
    pub virtual_size: i64,
    pub labels: HashMap<String, String>,
}

/// Full description of a single image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDetail {
    /// The reference the caller asked for
    pub id: String,
    /// Content-addressed id the engine resolved the reference to
    pub resolved_id: String,
    #[serde(rename = "tag")]
    pub tags: Vec<String>,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
    /// Empty when the image was never instantiated
    #[serde(rename = "container")]
    pub container_id: String,
    #[serde(rename = "os")]
    pub operating_system: String,
    pub architecture: String,
    pub size: i64,
    pub virtual_size: i64,
    pub author: String,
    #[serde(rename = "docker_version")]
    pub engine_version: String,
}

/// One layer of an image build history, newest first in a history listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLayer {
    pub id: String,
    #[serde(rename = "created")]
    pub created_at: i64,
    pub created_by: String,
    pub comment: String,
    pub size: i64,
    pub tags: Vec<String>,
}
