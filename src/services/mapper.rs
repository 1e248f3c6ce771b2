//! Engine-native records to domain types. None of these can fail: absent
//! optional fields become zero values or empty collections.

use crate::domain::native::{NativeHistoryLayer, NativeImage, NativeImageDetail, NativeTimestamp};
use crate::domain::{HistoryLayer, ImageDetail, ImageSummary};
use chrono::{DateTime, Utc};

pub fn to_summary(native: NativeImage) -> ImageSummary {
    ImageSummary {
        id: native.id,
        tags: native.repo_tags.unwrap_or_default(),
        created_at: native.created.as_ref().map(unix_seconds).unwrap_or(0),
        size: non_negative(native.size),
        virtual_size: non_negative(native.virtual_size),
        labels: native.labels.unwrap_or_default(),
    }
}

/// `requested` is echoed back as the detail id; the engine's own id lands in `resolved_id`
pub fn to_detail(requested: &str, native: NativeImageDetail) -> ImageDetail {
    ImageDetail {
        id: requested.to_string(),
        resolved_id: native.id,
        tags: native.repo_tags.unwrap_or_default(),
        created_at: native
            .created
            .as_ref()
            .map(calendar_time)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        container_id: native.container.unwrap_or_default(),
        operating_system: native.os.unwrap_or_default(),
        architecture: native.architecture.unwrap_or_default(),
        size: non_negative(native.size),
        virtual_size: non_negative(native.virtual_size),
        author: native.author.unwrap_or_default(),
        engine_version: native.docker_version.unwrap_or_default(),
    }
}

pub fn to_history_layer(native: NativeHistoryLayer) -> HistoryLayer {
    HistoryLayer {
        id: native.id,
        created_at: native.created.as_ref().map(unix_seconds).unwrap_or(0),
        created_by: native.created_by.unwrap_or_default(),
        comment: native.comment.unwrap_or_default(),
        size: non_negative(native.size),
        tags: native.tags.unwrap_or_default(),
    }
}

pub fn to_summaries(natives: Vec<NativeImage>) -> Vec<ImageSummary> {
    natives.into_iter().map(to_summary).collect()
}

/// Engine order, which is already newest layer first. Timestamps are not trusted for
/// ordering: reproducible builds stamp layers with the epoch.
pub fn to_history(natives: Vec<NativeHistoryLayer>) -> Vec<HistoryLayer> {
    natives.into_iter().map(to_history_layer).collect()
}

fn unix_seconds(ts: &NativeTimestamp) -> i64 {
    match ts {
        NativeTimestamp::Unix(secs) => *secs,
        NativeTimestamp::Text(text) => DateTime::parse_from_rfc3339(text.trim())
            .map(|dt| dt.timestamp())
            .unwrap_or(0),
    }
}

fn calendar_time(ts: &NativeTimestamp) -> DateTime<Utc> {
    match ts {
        NativeTimestamp::Unix(secs) => {
            DateTime::from_timestamp(*secs, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        }
        NativeTimestamp::Text(text) => DateTime::parse_from_rfc3339(text.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    }
}

fn non_negative(value: Option<i64>) -> i64 {
    value.unwrap_or(0).max(0)
}
