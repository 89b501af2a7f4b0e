use flowrelay_analytics::UserMetrics;

/// Slash commands the bot answers itself, without the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Clear,
    Stats,
}

impl Command {
    pub const ALL: [Self; 3] = [Self::Start, Self::Clear, Self::Stats];

    /// Parse `"/clear"`, `"clear"` or `"/clear@SomeBot trailing args"`.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let word = input.trim().trim_start_matches('/').split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        Self::ALL
            .into_iter()
            .find(|command| command.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Clear => "clear",
            Self::Stats => "stats",
        }
    }

    /// Shown in the client's command menu and in the welcome text.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Start => "Start the conversation",
            Self::Clear => "Clear your session",
            Self::Stats => "View your chat statistics",
        }
    }
}

pub const CLEARED_TEXT: &str = "Your session has been reset.";
pub const NO_STATS_TEXT: &str = "No analytics data available for your account yet.";

#[must_use]
pub fn welcome_text() -> String {
    let mut text = String::from(
        "👋 Welcome! I'm your Voiceflow-powered assistant. \
         You can start chatting with me right away!\n\nAvailable commands:",
    );
    for command in Command::ALL {
        text.push_str(&format!("\n/{} - {}", command.name(), command.description()));
    }
    text
}

#[must_use]
pub fn stats_text(metrics: Option<&UserMetrics>) -> String {
    let Some(metrics) = metrics else {
        return NO_STATS_TEXT.to_string();
    };
    let timestamp = "%Y-%m-%d %H:%M:%S UTC";
    format!(
        "Your Chat Statistics:\n\
         Total messages: {}\n\
         Button clicks: {}\n\
         Images received: {}\n\
         First interaction: {}\n\
         Last interaction: {}",
        metrics.total_messages,
        metrics.button_clicks,
        metrics.images_received,
        metrics.first_interaction.format(timestamp),
        metrics.last_interaction.format(timestamp),
    )
}
