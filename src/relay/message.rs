//! Inbound message classification
//!
//! Every inbound payload is either a caption event or opaque. Classification
//! is a parse-and-look step, never a validation step: anything that isn't a
//! JSON object with `"type": "caption"` is opaque, including payloads that
//! aren't JSON at all.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::registry::{Payload, TranscriptLine};

/// Value of the `type` field that marks a caption event
pub const CAPTION_TYPE: &str = "caption";

/// Sender label used when a caption carries none
pub const UNKNOWN_SENDER: &str = "Unknown";

/// A normalized caption event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionEvent {
    /// Speaker label
    pub sender: String,
    /// Caption text with surrounding whitespace trimmed
    pub text: String,
}

/// Outbound wire shape: `{"type":"caption","text":..,"sender":..}`
#[derive(Serialize)]
struct CaptionWire<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
    sender: &'a str,
}

impl CaptionEvent {
    /// Normalize the fields of a caption object
    ///
    /// - `text`: strings are used as-is, a missing or `null` field becomes
    ///   the empty string, any other JSON value is rendered as JSON text.
    ///   The result is trimmed.
    /// - `sender`: strings are used as-is, a missing or `null` field becomes
    ///   `"Unknown"`, any other JSON value is rendered as JSON text.
    fn from_object(object: &Map<String, Value>) -> Self {
        let text = coerce_to_string(object.get("text")).unwrap_or_default();
        let sender =
            coerce_to_string(object.get("sender")).unwrap_or_else(|| UNKNOWN_SENDER.to_string());

        Self {
            sender,
            text: text.trim().to_string(),
        }
    }

    /// Whether there is nothing to record or relay
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Serialize to the outbound caption shape
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&CaptionWire {
            kind: CAPTION_TYPE,
            text: &self.text,
            sender: &self.sender,
        })
    }

    /// The transcript line this caption produces
    pub fn to_line(&self) -> TranscriptLine {
        TranscriptLine::new(self.sender.clone(), self.text.clone())
    }
}

fn coerce_to_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// An inbound message as seen by the router
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    /// Structured caption event (already normalized; text may be empty)
    Caption(CaptionEvent),
    /// Anything else, relayed unchanged
    Opaque(Payload),
}

impl RelayMessage {
    /// Classify a raw payload
    ///
    /// Binary payloads are always opaque.
    pub fn classify(payload: Payload) -> Self {
        let caption = match &payload {
            Payload::Text(text) => parse_caption(text),
            Payload::Binary(_) => None,
        };

        match caption {
            Some(event) => RelayMessage::Caption(event),
            None => RelayMessage::Opaque(payload),
        }
    }
}

fn parse_caption(text: &str) -> Option<CaptionEvent> {
    let Ok(Value::Object(object)) = serde_json::from_str::<Value>(text) else {
        return None;
    };

    match object.get("type") {
        Some(Value::String(kind)) if kind == CAPTION_TYPE => {
            Some(CaptionEvent::from_object(&object))
        }
        _ => None,
    }
}
