use serde::Serialize;

/// Buttons per keyboard row.
pub const DEFAULT_ROW_WIDTH: usize = 2;

/// A button as the transport sees it: what to show and the opaque data to
/// hand back when it is pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub label: String,
    pub token: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// Buttons laid out in rows, order preserved left to right, top to bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ButtonGrid {
    rows: Vec<Vec<InlineButton>>,
}

impl ButtonGrid {
    /// Group `buttons` into rows of `width`; only the last row may be short.
    /// A width of zero is treated as one.
    pub fn from_buttons(buttons: Vec<InlineButton>, width: usize) -> Self {
        let width = width.max(1);
        let mut rows = Vec::with_capacity(buttons.len().div_ceil(width));
        let mut buttons = buttons.into_iter().peekable();
        while buttons.peek().is_some() {
            rows.push(buttons.by_ref().take(width).collect());
        }
        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<InlineButton>] {
        &self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}
