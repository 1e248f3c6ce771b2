//! Records as the container engine reports them.
//!
//! Both podman and docker spellings of the keys are accepted. Only the
//! identifier is required; everything else defaults when absent and unknown
//! keys are ignored.

use serde::Deserialize;
use std::collections::HashMap;

/// Engine timestamps come as unix seconds or as RFC3339 text depending on the command
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum NativeTimestamp {
    Unix(i64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NativeImage {
    #[serde(rename = "Id", alias = "ID", alias = "id")]
    pub id: String,
    #[serde(rename = "RepoTags", default)]
    pub repo_tags: Option<Vec<String>>,
    #[serde(rename = "Created", default)]
    pub created: Option<NativeTimestamp>,
    #[serde(rename = "Size", default)]
    pub size: Option<i64>,
    #[serde(rename = "VirtualSize", default)]
    pub virtual_size: Option<i64>,
    #[serde(rename = "Labels", default)]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NativeImageDetail {
    #[serde(rename = "Id", alias = "ID", alias = "id")]
    pub id: String,
    #[serde(rename = "RepoTags", default)]
    pub repo_tags: Option<Vec<String>>,
    #[serde(rename = "Created", default)]
    pub created: Option<NativeTimestamp>,
    #[serde(rename = "Container", default)]
    pub container: Option<String>,
    #[serde(rename = "Os", alias = "OS", default)]
    pub os: Option<String>,
    #[serde(rename = "Architecture", default)]
    pub architecture: Option<String>,
    #[serde(rename = "Size", default)]
    pub size: Option<i64>,
    #[serde(rename = "VirtualSize", default)]
    pub virtual_size: Option<i64>,
    #[serde(rename = "Author", default)]
    pub author: Option<String>,
    #[serde(rename = "DockerVersion", alias = "Version", default)]
    pub docker_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NativeHistoryLayer {
    #[serde(rename = "id", alias = "Id", alias = "ID")]
    pub id: String,
    #[serde(rename = "created", alias = "Created", default)]
    pub created: Option<NativeTimestamp>,
    #[serde(rename = "CreatedBy", alias = "createdBy", alias = "created_by", default)]
    pub created_by: Option<String>,
    #[serde(rename = "comment", alias = "Comment", default)]
    pub comment: Option<String>,
    #[serde(rename = "size", alias = "Size", default)]
    pub size: Option<i64>,
    #[serde(rename = "tags", alias = "Tags", default)]
    pub tags: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_podman_image_listing() {
        let json = r#"[{
            "Id": "sha256:aaa",
            "ParentId": "",
            "RepoTags": ["docker.io/library/alpine:3.18"],
            "Created": 1691436020,
            "Size": 7626624,
            "VirtualSize": 7626624,
            "Labels": null,
            "Containers": 0
        }]"#;

        let images: Vec<NativeImage> = serde_json::from_str(json).unwrap();
        assert_eq!(images[0].id, "sha256:aaa");
        assert_eq!(images[0].created, Some(NativeTimestamp::Unix(1691436020)));
        assert!(images[0].labels.is_none());
    }

    #[test]
    fn decodes_textual_created_in_inspect() {
        let json = r#"{
            "Id": "sha256:bbb",
            "Created": "2023-08-07T19:20:20.894140623Z",
            "Os": "linux",
            "Architecture": "arm64",
            "Version": "20.10.23"
        }"#;

        let detail: NativeImageDetail = serde_json::from_str(json).unwrap();
        assert!(matches!(detail.created, Some(NativeTimestamp::Text(_))));
        assert_eq!(detail.docker_version.as_deref(), Some("20.10.23"));
        assert!(detail.repo_tags.is_none());
    }

    #[test]
    fn decodes_podman_history_keys() {
        let json = r#"[{
            "id": "<missing>",
            "created": "2023-08-07T19:20:20Z",
            "CreatedBy": "/bin/sh -c #(nop) ADD file:abc in /",
            "size": 7626624,
            "comment": "",
            "tags": null
        }]"#;

        let layers: Vec<NativeHistoryLayer> = serde_json::from_str(json).unwrap();
        assert_eq!(layers[0].id, "<missing>");
        assert_eq!(layers[0].size, Some(7626624));
        assert!(layers[0].tags.is_none());
    }

    #[test]
    fn missing_identifier_is_rejected() {
        let result = serde_json::from_str::<NativeImage>(r#"{"Size": 1}"#);
        assert!(result.is_err());
    }
}
