//! Field-name candidates for gallery payloads.
//!
//! Upstream payloads are not consistent about naming, so each concept lists
//! the keys it may live under and the first usable one wins.

use serde_json::{Map, Value};

/// Continuation token inside the page metadata
pub const CONTINUATION: &[&str] = &["nextCursor", "cursor", "next"];

/// Poster image on the item itself
pub const POSTER: &[&str] = &["thumbnail", "preview", "cover", "coverUrl", "previewUrl", "image"];

/// Poster image inside the metadata bag
pub const META_POSTER: &[&str] = &["thumbnail", "thumbnailUrl", "preview", "previewUrl", "image"];

pub const PROMPT: &[&str] = &["prompt", "Prompt", "positive", "textPrompt"];

pub const NEGATIVE_PROMPT: &[&str] = &["negativePrompt", "NegativePrompt", "negative"];

/// Metadata keys whose presence marks an item as a video
pub const META_VIDEO: &[&str] = &["video", "videoUrl", "mp4", "mp4Url"];

/// Metadata keys that carry a playable video URL
pub const META_MEDIA_SOURCE: &[&str] = &["videoUrl", "mp4Url"];

pub const PAGE_URL: &[&str] = &["pageUrl", "postUrl"];

/// First candidate holding a non-empty string
pub fn first_str<'a>(object: &'a Map<String, Value>, candidates: &[&str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|key| object.get(*key))
        .filter_map(Value::as_str)
        .find(|value| !value.is_empty())
}

/// Resolve the continuation token.
///
/// The first candidate that is present and not null decides; an empty string
/// or any non-scalar there means the stream is exhausted.
pub fn continuation_token(metadata: &Map<String, Value>) -> Option<String> {
    let value = CONTINUATION
        .iter()
        .filter_map(|key| metadata.get(*key))
        .find(|value| !value.is_null())?;

    match value {
        Value::String(token) if !token.is_empty() => Some(token.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Loose truthiness used for flags the server may send as bool, number or string
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn is_video_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    path.ends_with(".mp4") || path.ends_with(".webm")
}
