//! Shared data structures for the browser state
//!
//! These types represent the data model that flows between the gallery
//! sources, the pagination layer and the host surface. An `Item` keeps the
//! complete payload it was built from so it can be echoed back unchanged.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::fields;
use crate::error::BrowserError;

/// Stable identity of an item, unique within a render list.
///
/// Keys order integer-like ids numerically ahead of all other ids, which
/// order as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Ids arrive as strings or numbers; both normalize to the same key
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(id) if !id.is_empty() => Some(Self(id.clone())),
            Value::Number(id) => Some(Self(id.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical non-negative integer form only; "007" and "-1" are plain strings
    fn as_index(&self) -> Option<u64> {
        let id = self.0.as_str();
        let canonical = !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && (id == "0" || !id.starts_with('0'));
        if canonical { id.parse().ok() } else { None }
    }
}

impl Ord for ItemKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.as_index(), other.as_index()) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ItemKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Content rating of a single item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rating {
    None,
    Soft,
    Mature,
    X,
    /// A level this build does not know about, kept verbatim
    Other(String),
}

impl Rating {
    fn from_payload(object: &Map<String, Value>) -> Self {
        match object.get("nsfwLevel") {
            Some(Value::String(level)) => match level.as_str() {
                "None" => Rating::None,
                "Soft" => Rating::Soft,
                "Mature" => Rating::Mature,
                "X" => Rating::X,
                other => Rating::Other(other.to_string()),
            },
            // Legacy payloads only carry a boolean
            _ if object.get("nsfw").is_some_and(fields::is_truthy) => Rating::X,
            _ => Rating::None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Rating::None => "None",
            Rating::Soft => "Soft",
            Rating::Mature => "Mature",
            Rating::X => "X",
            Rating::Other(level) => level,
        }
    }
}

/// A single gallery entry
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub key: ItemKey,
    pub kind: MediaKind,
    /// Source URL (image or video)
    pub url: String,
    pub poster: Option<String>,
    pub rating: Rating,
    pub created_at: Option<DateTime<Utc>>,
    /// Free-form metadata bag (`meta`)
    pub meta: Map<String, Value>,
    raw: Map<String, Value>,
}

impl Item {
    /// Build an item from its payload. Entries without a usable id are rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(raw) = value else {
            return None;
        };
        let key = ItemKey::from_value(raw.get("id")?)?;

        let meta = match raw.get("meta") {
            Some(Value::Object(meta)) => meta.clone(),
            _ => Map::new(),
        };
        let url = raw.get("url").and_then(Value::as_str).unwrap_or_default().to_string();
        let kind = if detect_video(&url, &meta) { MediaKind::Video } else { MediaKind::Image };
        let poster = fields::first_str(&raw, fields::POSTER)
            .or_else(|| fields::first_str(&meta, fields::META_POSTER))
            .map(str::to_string);
        let created_at = raw
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
            .map(|stamp| stamp.with_timezone(&Utc));

        Some(Self {
            key,
            kind,
            url,
            poster,
            rating: Rating::from_payload(&raw),
            created_at,
            meta,
            raw,
        })
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    pub fn prompt(&self) -> Option<&str> {
        fields::first_str(&self.meta, fields::PROMPT)
    }

    pub fn negative_prompt(&self) -> Option<&str> {
        fields::first_str(&self.meta, fields::NEGATIVE_PROMPT)
    }

    /// True when a non-blank positive prompt is present
    pub fn has_prompt(&self) -> bool {
        self.prompt().is_some_and(|prompt| !prompt.trim().is_empty())
    }

    /// URL handed to the media element once the item is near-visible
    pub fn media_source(&self) -> Option<&str> {
        if !self.url.is_empty() {
            return Some(&self.url);
        }
        fields::first_str(&self.meta, fields::META_MEDIA_SOURCE)
    }

    /// Link to the item's page on the gallery site
    pub fn page_url(&self, base: &str) -> String {
        match fields::first_str(&self.raw, fields::PAGE_URL) {
            Some(url) => url.to_string(),
            None => format!("{}/{}", base.trim_end_matches('/'), self.key),
        }
    }

    /// The complete original payload
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

fn detect_video(url: &str, meta: &Map<String, Value>) -> bool {
    if fields::is_video_url(url) {
        return true;
    }
    fields::META_VIDEO
        .iter()
        .filter_map(|key| meta.get(*key))
        .find(|value| fields::is_truthy(value))
        .and_then(Value::as_str)
        .is_some_and(fields::is_video_url)
}

/// One response from the list endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    /// `None` means the stream is exhausted
    pub continuation: Option<String>,
    /// The server already applied the media-kind and prompt predicates
    pub pre_filtered: bool,
    /// Server-reported time spent assembling the page
    pub elapsed_ms: Option<u64>,
}

impl Page {
    /// Parse `{items: [...], metadata: {...}}`. A top-level `error` field is a failure.
    pub fn from_value(value: Value) -> Result<Self, BrowserError> {
        let Value::Object(mut body) = value else {
            return Err(BrowserError::shape("list response is not an object"));
        };

        if let Some(error) = body.get("error").filter(|error| fields::is_truthy(error)) {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(BrowserError::Shape(message));
        }

        let items = match body.remove("items") {
            Some(Value::Array(items)) => items.into_iter().filter_map(Item::from_value).collect(),
            _ => Vec::new(),
        };

        let metadata = match body.remove("metadata") {
            Some(Value::Object(metadata)) => metadata,
            _ => Map::new(),
        };

        Ok(Self {
            items,
            continuation: fields::continuation_token(&metadata),
            pre_filtered: metadata.get("aggregated").is_some_and(fields::is_truthy),
            elapsed_ms: metadata.get("elapsedMs").and_then(Value::as_f64).map(|ms| ms.max(0.0).round() as u64),
        })
    }
}

/// Parse the bulk favorites response, an object mapping id to payload
pub fn favorites_from_value(value: Value) -> Result<Vec<Item>, BrowserError> {
    let Value::Object(entries) = value else {
        return Err(BrowserError::shape("favorites response is not an object"));
    };

    let items = entries
        .into_iter()
        .filter_map(|(id, payload)| {
            let Value::Object(mut payload) = payload else {
                return None;
            };
            payload.entry("id").or_insert(Value::String(id));
            Item::from_value(Value::Object(payload))
        })
        .collect();

    Ok(items)
}
