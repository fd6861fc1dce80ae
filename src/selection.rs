//! Selection payload written to the host's output slot, and its decoder.
//!
//! The slot always holds a JSON string of the form
//! `{"item": {...}, "download_image": bool}`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::state::data::Item;
use crate::state::fields;

/// Slot contents when nothing is selected
pub const EMPTY_SELECTION: &str = "{}";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionPayload {
    pub item: Value,
    pub download_image: bool,
}

impl SelectionPayload {
    /// Build the payload for `item`. `meta.prompt` and `meta.negativePrompt`
    /// are always present, resolved from whichever alias the item used.
    pub fn new(item: &Item, image_output_connected: bool) -> Self {
        let mut meta = item.meta.clone();
        let prompt = item.prompt().unwrap_or_default().to_string();
        let negative = item.negative_prompt().unwrap_or_default().to_string();
        meta.insert("prompt".to_string(), Value::String(prompt));
        meta.insert("negativePrompt".to_string(), Value::String(negative));

        let mut payload = item.raw().clone();
        payload.insert("meta".to_string(), Value::Object(meta));

        Self { item: Value::Object(payload), download_image: image_output_connected }
    }

    pub fn to_slot_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| EMPTY_SELECTION.to_string())
    }
}

/// Coerce whatever the host stored in the slot back to a string
pub fn coerce_slot_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => EMPTY_SELECTION.to_string(),
        other => other.to_string(),
    }
}

/// What downstream consumers read out of a selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedSelection {
    pub positive_prompt: String,
    pub negative_prompt: String,
    pub image_url: String,
    pub download_image: bool,
    /// Metadata without the prompt keys, as an indented JSON document
    pub info: String,
}

/// Decode a slot string. Malformed input decodes to empty values.
pub fn decode_selection(slot: &str) -> DecodedSelection {
    let raw = if slot.trim().is_empty() { EMPTY_SELECTION } else { slot };
    let selection = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(selection)) => selection,
        _ => Map::new(),
    };

    let item = match selection.get("item") {
        Some(Value::Object(item)) => item.clone(),
        _ => Map::new(),
    };
    let download_image = selection.get("download_image").is_some_and(fields::is_truthy);

    let mut meta = match item.get("meta") {
        Some(Value::Object(meta)) => meta.clone(),
        _ => Map::new(),
    };

    let positive_prompt = fields::first_str(&meta, fields::PROMPT).unwrap_or_default().to_string();
    let negative_prompt = fields::first_str(&meta, fields::NEGATIVE_PROMPT).unwrap_or_default().to_string();
    let image_url = item.get("url").and_then(Value::as_str).unwrap_or_default().to_string();

    for key in fields::PROMPT.iter().chain(fields::NEGATIVE_PROMPT) {
        meta.remove(*key);
    }

    DecodedSelection {
        positive_prompt,
        negative_prompt,
        image_url,
        download_image,
        info: pretty_json(&Value::Object(meta)),
    }
}

fn pretty_json(value: &Value) -> String {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    match value.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(out).unwrap_or_else(|_| EMPTY_SELECTION.to_string()),
        Err(_) => EMPTY_SELECTION.to_string(),
    }
}
