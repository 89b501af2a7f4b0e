use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

use crate::request::text_request;

/// A button the runtime asked us to show.
///
/// `request` is echoed back to the runtime verbatim when the button is pressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonSpec {
    pub label: String,
    pub request: Value,
}

impl ButtonSpec {
    pub fn new(label: impl Into<String>, request: Value) -> Self {
        Self {
            label: label.into(),
            request,
        }
    }

    /// A button that sends its own label back as a text request.
    pub fn text(label: impl Into<String>) -> Self {
        let label = label.into();
        let request = text_request(&label);
        Self { label, request }
    }

    /// True when pressing the button is indistinguishable from typing its label.
    #[must_use]
    pub fn is_plain_text(&self) -> bool {
        self.request == text_request(&self.label)
    }
}

/// One card, standalone or as a carousel entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<ButtonSpec>,
}

/// Everything one runtime response asks the chat layer to show.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionResult {
    /// Text and speak traces, newline-joined in encounter order.
    pub text: Option<String>,
    pub buttons: Vec<ButtonSpec>,
    /// Last visual trace wins.
    pub image_url: Option<String>,
    pub carousel: Option<Vec<CardItem>>,
    pub card: Option<CardItem>,
    /// Context traces merged key by key, later keys overwrite earlier ones.
    pub context_patch: Map<String, Value>,
}

impl InteractionResult {
    /// True when there is nothing to render.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.buttons.is_empty()
            && self.image_url.is_none()
            && self.carousel.is_none()
            && self.card.is_none()
    }

    /// Labels of every button the response carries: the choice buttons, then
    /// the standalone card's, then each carousel card's.
    pub fn button_labels(&self) -> impl Iterator<Item = &str> {
        let cards = self.card.iter().chain(self.carousel.iter().flatten());
        self.buttons
            .iter()
            .chain(cards.flat_map(|card| card.buttons.iter()))
            .map(|button| button.label.as_str())
    }

    /// One-line transcript of what the bot said, for session history.
    #[must_use]
    pub fn transcript(&self) -> Option<String> {
        if let Some(text) = &self.text {
            return Some(text.clone());
        }
        let titles: Vec<&str> = self
            .card
            .iter()
            .chain(self.carousel.iter().flatten())
            .filter_map(|card| card.title.as_deref())
            .collect();
        if titles.is_empty() {
            self.image_url.clone()
        } else {
            Some(titles.join(" | "))
        }
    }
}
