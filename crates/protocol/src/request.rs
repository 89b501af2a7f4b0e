use {
    serde::Serialize,
    serde_json::{Map, Value, json},
};

use crate::{VERSION_ID, interaction::ButtonSpec};

/// The runtime request for a typed message.
#[must_use]
pub fn text_request(message: &str) -> Value {
    json!({ "type": "text", "payload": message })
}

/// Body of `POST /state/user/{user_id}/interact`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractRequest {
    pub request: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl InteractRequest {
    #[must_use]
    pub fn text(message: &str) -> Self {
        Self {
            request: text_request(message),
            context: None,
        }
    }

    /// Replay the request stored on a pressed button.
    #[must_use]
    pub fn button(button: &ButtonSpec) -> Self {
        Self {
            request: button.request.clone(),
            context: None,
        }
    }

    /// Attach the session context. An empty context is left off the wire.
    #[must_use]
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = (!context.is_empty()).then_some(context);
        self
    }
}

/// Body of the transcript persistence call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptRequest {
    #[serde(rename = "projectID")]
    pub project_id: String,
    #[serde(rename = "versionID")]
    pub version_id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

impl TranscriptRequest {
    pub fn new(project_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            version_id: VERSION_ID.to_string(),
            session_id: session_id.into(),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_is_omitted() {
        let body = serde_json::to_value(InteractRequest::text("hi").with_context(Map::new())).unwrap();
        assert_eq!(
            body,
            json!({ "request": { "type": "text", "payload": "hi" } })
        );
    }

    #[test]
    fn context_is_attached() {
        let mut context = Map::new();
        context.insert("step".into(), json!("pricing"));
        let body = serde_json::to_value(InteractRequest::text("hi").with_context(context)).unwrap();
        assert_eq!(body["context"], json!({ "step": "pricing" }));
    }

    #[test]
    fn button_request_is_replayed_verbatim() {
        let request = json!({ "type": "path-abc", "payload": { "label": "Buy" } });
        let button = ButtonSpec::new("Buy", request.clone());
        assert_eq!(InteractRequest::button(&button).request, request);
    }

    #[test]
    fn transcript_uses_runtime_field_names() {
        let body = serde_json::to_value(TranscriptRequest::new("proj", "42")).unwrap();
        assert_eq!(
            body,
            json!({ "projectID": "proj", "versionID": "production", "sessionID": "42" })
        );
    }
}
