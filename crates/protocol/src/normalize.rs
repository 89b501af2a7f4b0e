//! Trace interpreter.
//!
//! [`normalize`] is a left fold over the trace array with one handler per
//! [`TraceKind`]. Each handler decodes its payload before touching the
//! accumulator, so a malformed trace contributes nothing and the fold moves on.

use {
    serde_json::{Map, Value},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use flowrelay_metrics::{counter, protocol as proto_metrics};

use crate::{
    interaction::{ButtonSpec, CardItem, InteractionResult},
    trace::{
        CardPayload, CarouselPayload, ChoicePayload, MalformedTrace, RawTrace, TextPayload,
        TraceKind, VisualPayload,
    },
};

/// Fold a runtime response into a single [`InteractionResult`].
///
/// Never fails. Every trace is visited exactly once; malformed ones are
/// logged at `warn` and skipped, unknown kinds are logged at `debug`.
pub fn normalize(traces: &[RawTrace]) -> InteractionResult {
    traces
        .iter()
        .enumerate()
        .fold(InteractionResult::default(), |mut result, (index, trace)| {
            if let Err(e) = apply(&mut result, trace) {
                warn!(index, trace_kind = %trace.kind, error = %e, "skipping malformed trace");
                #[cfg(feature = "metrics")]
                counter!(proto_metrics::MALFORMED_TRACES_TOTAL).increment(1);
            }
            result
        })
}

fn apply(result: &mut InteractionResult, trace: &RawTrace) -> Result<(), MalformedTrace> {
    match &trace.kind {
        TraceKind::Text => {
            let payload: TextPayload = trace.decode()?;
            push_text(result, payload.message.unwrap_or_default());
        },
        TraceKind::Choice => {
            let payload: ChoicePayload = trace.decode()?;
            result
                .buttons
                .extend(payload.buttons.into_iter().map(ButtonSpec::from));
        },
        TraceKind::Visual => {
            let payload: VisualPayload = trace.decode()?;
            match payload.image {
                Some(image) => result.image_url = Some(image.into_url()),
                None => debug!("visual trace without an image"),
            }
        },
        TraceKind::Carousel => {
            let payload: CarouselPayload = trace.decode()?;
            result.carousel = Some(payload.items.into_iter().map(CardItem::from).collect());
        },
        TraceKind::Card => {
            let payload: CardPayload = trace.decode()?;
            result.card = Some(payload.into());
        },
        TraceKind::Context => {
            let patch: Map<String, Value> = trace.decode()?;
            result.context_patch.extend(patch);
        },
        TraceKind::Unknown(tag) if tag.is_empty() => {
            return Err(MalformedTrace::new(&trace.kind, "missing type tag"));
        },
        TraceKind::Unknown(tag) => {
            debug!(trace_kind = %tag, "ignoring unknown trace kind");
        },
    }
    Ok(())
}

fn push_text(result: &mut InteractionResult, message: String) {
    result.text = Some(match result.text.take() {
        Some(mut text) => {
            text.push('\n');
            text.push_str(&message);
            text
        },
        None => message,
    });
}
