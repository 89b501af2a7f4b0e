//! UI renderer.
//!
//! Rendering is split in two. [`plan`] decides, without I/O, which messages a
//! response becomes. [`render`] sends them one by one; a unit the platform
//! rejects is logged and skipped, and the user gets a single apology at the
//! end no matter how many units failed.

use {
    flowrelay_channels::{ButtonGrid, ChannelOutbound, DEFAULT_ROW_WIDTH, InlineButton},
    flowrelay_protocol::{ButtonSpec, CallbackError, CardItem, InteractionResult},
    tracing::{debug, error, warn},
};

#[cfg(feature = "metrics")]
use flowrelay_metrics::{chat as chat_metrics, counter, labels};

/// Sent once per turn when any render call failed.
pub const RENDER_APOLOGY: &str =
    "I encountered an error processing the response. Please try again.";

/// Produces the callback data for one button.
pub type IssueToken<'a> = &'a (dyn Fn(&ButtonSpec) -> Result<String, CallbackError> + Sync);

/// One outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderUnit {
    Text {
        text: String,
        buttons: Option<ButtonGrid>,
    },
    Photo {
        url: String,
        caption: Option<String>,
        buttons: Option<ButtonGrid>,
    },
}

impl RenderUnit {
    fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Photo { .. } => "photo",
        }
    }
}

/// The messages a response becomes, in send order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderPlan {
    pub units: Vec<RenderUnit>,
    /// Buttons left out because their callback token did not fit.
    pub dropped_buttons: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    pub sent: usize,
    pub failed: usize,
    pub dropped_buttons: usize,
    pub apologized: bool,
}

/// Lay out a normalized response.
///
/// A non-empty carousel wins, then a card. Otherwise the image goes first and
/// the text follows with the choice buttons attached. `issue` turns each
/// button into callback data.
#[must_use]
pub fn plan(result: &InteractionResult, issue: IssueToken<'_>) -> RenderPlan {
    let mut plan = RenderPlan::default();

    match (&result.carousel, &result.card) {
        (Some(items), _) if !items.is_empty() => {
            for card in items {
                plan.push_card(card, issue);
            }
        },
        (_, Some(card)) => plan.push_card(card, issue),
        _ => {
            if let Some(url) = &result.image_url {
                plan.units.push(RenderUnit::Photo {
                    url: url.clone(),
                    caption: None,
                    buttons: None,
                });
            }
            match result.text.as_deref().filter(|t| !t.trim().is_empty()) {
                Some(text) => {
                    let buttons = plan.keyboard(&result.buttons, issue);
                    plan.units.push(RenderUnit::Text {
                        text: text.to_string(),
                        buttons,
                    });
                },
                None if !result.buttons.is_empty() => {
                    debug!(
                        buttons = result.buttons.len(),
                        "choice without text, buttons not shown"
                    );
                },
                None => {},
            }
        },
    }
    plan
}

impl RenderPlan {
    fn push_card(&mut self, card: &CardItem, issue: IssueToken<'_>) {
        let caption = card_caption(card);
        let buttons = self.keyboard(&card.buttons, issue);
        match &card.image {
            Some(url) => self.units.push(RenderUnit::Photo {
                url: url.clone(),
                caption: (!caption.is_empty()).then_some(caption),
                buttons,
            }),
            None if caption.is_empty() && buttons.is_none() => {
                debug!("skipping card with nothing to show");
            },
            None => self.units.push(RenderUnit::Text {
                text: caption,
                buttons,
            }),
        }
    }

    fn keyboard(&mut self, buttons: &[ButtonSpec], issue: IssueToken<'_>) -> Option<ButtonGrid> {
        let mut inline = Vec::with_capacity(buttons.len());
        for button in buttons {
            match issue(button) {
                Ok(token) => inline.push(InlineButton::new(&button.label, token)),
                Err(e) => {
                    warn!(label = %button.label, error = %e, "dropping button");
                    self.dropped_buttons += 1;
                    #[cfg(feature = "metrics")]
                    counter!(chat_metrics::BUTTONS_DROPPED_TOTAL).increment(1);
                },
            }
        }
        (!inline.is_empty()).then(|| ButtonGrid::from_buttons(inline, DEFAULT_ROW_WIDTH))
    }
}

/// Bold title, description on the next line.
fn card_caption(card: &CardItem) -> String {
    match (card.title.as_deref(), card.description.as_deref()) {
        (Some(title), Some(description)) => format!("**{title}**\n{description}"),
        (Some(title), None) => format!("**{title}**"),
        (None, Some(description)) => description.to_string(),
        (None, None) => String::new(),
    }
}

/// Send `result` to `chat_id`.
pub async fn render(
    outbound: &dyn ChannelOutbound,
    chat_id: &str,
    result: &InteractionResult,
    issue: IssueToken<'_>,
) -> RenderOutcome {
    let plan = plan(result, issue);
    let mut outcome = RenderOutcome {
        dropped_buttons: plan.dropped_buttons,
        ..Default::default()
    };

    for (index, unit) in plan.units.iter().enumerate() {
        let sent = match unit {
            RenderUnit::Text { text, buttons } => {
                outbound.send_text(chat_id, text, buttons.as_ref()).await
            },
            RenderUnit::Photo {
                url,
                caption,
                buttons,
            } => {
                outbound
                    .send_photo(chat_id, url, caption.as_deref(), buttons.as_ref())
                    .await
            },
        };
        match sent {
            Ok(()) => outcome.sent += 1,
            Err(e) => {
                warn!(
                    chat_id,
                    index,
                    unit = unit.kind(),
                    error_type = e.kind(),
                    error = %e,
                    "render call failed"
                );
                outcome.failed += 1;
                #[cfg(feature = "metrics")]
                counter!(
                    chat_metrics::RENDER_FAILURES_TOTAL,
                    labels::ERROR_TYPE => e.kind()
                )
                .increment(1);
            },
        }
    }

    if outcome.failed > 0 {
        match outbound.send_text(chat_id, RENDER_APOLOGY, None).await {
            Ok(()) => outcome.apologized = true,
            Err(e) => error!(chat_id, error = %e, "could not deliver render apology"),
        }
    }
    outcome
}
