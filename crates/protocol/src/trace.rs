use std::fmt;

use {
    serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned},
    serde_json::{Map, Value},
    thiserror::Error,
    tracing::warn,
};

use crate::interaction::{ButtonSpec, CardItem};

/// Trace type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TraceKind {
    /// `text` or `speak`.
    Text,
    Choice,
    Visual,
    Carousel,
    Card,
    Context,
    /// Anything else. An empty tag means the trace carried no `type` at all.
    Unknown(String),
}

impl TraceKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Choice => "choice",
            Self::Visual => "visual",
            Self::Carousel => "carousel",
            Self::Card => "card",
            Self::Context => "context",
            Self::Unknown(tag) => tag,
        }
    }
}

impl From<&str> for TraceKind {
    fn from(tag: &str) -> Self {
        match tag {
            "text" | "speak" => Self::Text,
            "choice" => Self::Choice,
            "visual" => Self::Visual,
            "carousel" => Self::Carousel,
            "card" => Self::Card,
            "context" => Self::Context,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(tag) if tag.is_empty() => f.write_str("<untagged>"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A trace whose payload does not have the shape its kind requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {kind} trace: {reason}")]
pub struct MalformedTrace {
    pub kind: String,
    pub reason: String,
}

impl MalformedTrace {
    #[must_use]
    pub fn new(kind: &TraceKind, reason: impl fmt::Display) -> Self {
        Self {
            kind: kind.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// One event emitted by the runtime.
///
/// Decoding is total. A missing `payload` becomes an empty object, and an
/// array element that is not an object becomes an untagged trace holding the
/// raw value, so the normalizer still gets to see (and report) it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "Value", into = "Value")]
pub struct RawTrace {
    pub kind: TraceKind,
    pub payload: Value,
}

impl RawTrace {
    pub fn new(kind: impl Into<TraceKind>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Decode the payload into the typed shape for this trace's kind.
    pub(crate) fn decode<T: DeserializeOwned>(&self) -> Result<T, MalformedTrace> {
        T::deserialize(&self.payload).map_err(|e| MalformedTrace::new(&self.kind, e))
    }
}

impl From<Value> for RawTrace {
    fn from(value: Value) -> Self {
        let Value::Object(mut object) = value else {
            return Self {
                kind: TraceKind::Unknown(String::new()),
                payload: value,
            };
        };
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .map(TraceKind::from)
            .unwrap_or_else(|| TraceKind::Unknown(String::new()));
        let payload = object
            .remove("payload")
            .unwrap_or_else(|| Value::Object(Map::new()));
        Self { kind, payload }
    }
}

impl From<RawTrace> for Value {
    fn from(trace: RawTrace) -> Self {
        serde_json::json!({
            "type": trace.kind.as_str(),
            "payload": trace.payload,
        })
    }
}

// ── Typed payloads ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct TextPayload {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoicePayload {
    #[serde(default, deserialize_with = "lenient_buttons")]
    pub buttons: Vec<ButtonEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ButtonEntry {
    pub name: String,
    #[serde(default)]
    pub request: Option<Value>,
}

/// Decode each button on its own so one bad entry does not cost the others.
fn lenient_buttons<'de, D>(deserializer: D) -> Result<Vec<ButtonEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match ButtonEntry::deserialize(entry) {
            Ok(button) => Some(button),
            Err(e) => {
                warn!(index, error = %e, "skipping malformed button");
                None
            },
        })
        .collect())
}

impl From<ButtonEntry> for ButtonSpec {
    fn from(entry: ButtonEntry) -> Self {
        match entry.request {
            Some(request) => ButtonSpec::new(entry.name, request),
            None => ButtonSpec::text(entry.name),
        }
    }
}

/// `image` is either the URL itself or an object carrying it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ImageRef {
    Url(String),
    Object { url: String },
}

impl ImageRef {
    pub fn into_url(self) -> String {
        match self {
            Self::Url(url) | Self::Object { url } => url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct VisualPayload {
    #[serde(default)]
    pub image: Option<ImageRef>,
}

/// Rich cards wrap the description in `{ "text": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Description {
    Plain(String),
    Rich { text: String },
}

#[derive(Debug, Deserialize)]
pub(crate) struct CardPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<Description>,
    #[serde(default, alias = "imageUrl")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient_buttons")]
    pub buttons: Vec<ButtonEntry>,
}

impl From<CardPayload> for CardItem {
    fn from(card: CardPayload) -> Self {
        Self {
            title: card.title,
            description: card.description.map(|d| match d {
                Description::Plain(text) | Description::Rich { text } => text,
            }),
            image: card.image,
            buttons: card.buttons.into_iter().map(ButtonSpec::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CarouselPayload {
    #[serde(default, alias = "cards")]
    pub items: Vec<CardPayload>,
}
