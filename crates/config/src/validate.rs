//! Configuration validation.
//!
//! Two passes: unknown or misspelled keys in the raw file, then semantic
//! checks on the effective config (after env overrides).

use std::path::{Path, PathBuf};

use {secrecy::ExposeSecret, serde_json::Value};

use crate::{
    loader::{self, ENV_API_KEY, ENV_TELEGRAM_TOKEN},
    schema::FlowrelayConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// "syntax", "unknown-field", "missing", "invalid" or "file-ref".
    pub category: &'static str,
    /// Dotted path, e.g. `backend.api_key`.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.severity, self.message)
        } else {
            write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Known keys per section.
const SCHEMA: &[(&str, &[&str])] = &[
    ("telegram", &["token", "api_url", "poll_timeout_secs"]),
    ("backend", &[
        "api_key",
        "base_url",
        "project_id",
        "timeout_secs",
        "transcripts",
    ]),
    ("metrics", &["enabled", "listen"]),
];

/// Validate the config file at `path` (or the discovered one) together with
/// the environment overrides.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path.map(Path::to_path_buf).or_else(loader::find_config_file);
    let mut result = ValidationResult {
        diagnostics: Vec::new(),
        config_path: config_path.clone(),
    };

    let mut config = match &config_path {
        Some(path) => {
            match loader::load_config_value(path) {
                Ok(value) => check_unknown_fields(&value, &mut result.diagnostics),
                Err(e) => {
                    result
                        .diagnostics
                        .push(Diagnostic::new(Severity::Error, "syntax", "", e.to_string()));
                    return result;
                },
            }
            match loader::load_config(path) {
                Ok(config) => config,
                Err(e) => {
                    result
                        .diagnostics
                        .push(Diagnostic::new(Severity::Error, "syntax", "", e.to_string()));
                    return result;
                },
            }
        },
        None => {
            result.diagnostics.push(Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults and environment",
            ));
            FlowrelayConfig::default()
        },
    };

    loader::apply_env_overrides(&mut config);
    result.diagnostics.extend(check_config(&config));
    result.diagnostics.sort_by_key(|d| d.severity);
    result
}

/// Flag keys that no section knows about.
pub fn check_unknown_fields(value: &Value, diagnostics: &mut Vec<Diagnostic>) {
    let Value::Object(root) = value else {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "syntax",
            "",
            "config root must be a table",
        ));
        return;
    };
    let sections: Vec<&str> = SCHEMA.iter().map(|(name, _)| *name).collect();

    for (section, body) in root {
        let Some((_, keys)) = SCHEMA.iter().find(|(name, _)| name == section) else {
            diagnostics.push(unknown_field(section, section, &sections));
            continue;
        };
        let Value::Object(fields) = body else {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                section.as_str(),
                "expected a table",
            ));
            continue;
        };
        for key in fields.keys() {
            if !keys.contains(&key.as_str()) {
                diagnostics.push(unknown_field(&format!("{section}.{key}"), key, keys));
            }
        }
    }
}

fn unknown_field(path: &str, key: &str, candidates: &[&str]) -> Diagnostic {
    let message = match suggest(key, candidates, 3) {
        Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
        None => "unknown field".to_string(),
    };
    Diagnostic::new(Severity::Error, "unknown-field", path, message)
}

/// Semantic checks on the effective config.
#[must_use]
pub fn check_config(config: &FlowrelayConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let token = config.telegram.token.expose_secret();
    if token.trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "missing",
            "telegram.token",
            format!("no bot token; set it here or in {ENV_TELEGRAM_TOKEN}"),
        ));
    } else if !looks_like_bot_token(token) {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "invalid",
            "telegram.token",
            "token does not look like <bot id>:<secret>",
        ));
    }

    if config.backend.api_key.expose_secret().trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "missing",
            "backend.api_key",
            format!("no API key; set it here or in {ENV_API_KEY}"),
        ));
    }

    let base_url = config.backend.base_url.trim();
    if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "invalid",
            "backend.base_url",
            format!("{base_url:?} is not an http(s) URL"),
        ));
    }

    if config.backend.timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "invalid",
            "backend.timeout_secs",
            "timeout must be at least one second",
        ));
    }

    if config.backend.transcripts && !config.backend.transcripts_active() {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "missing",
            "backend.project_id",
            "no project id; transcripts will not be saved",
        ));
    }

    if config.metrics.listen.is_some() && !config.metrics.enabled {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "invalid",
            "metrics.listen",
            "listen address is ignored while metrics are disabled",
        ));
    }

    diagnostics
}

fn looks_like_bot_token(token: &str) -> bool {
    token.split_once(':').is_some_and(|(id, secret)| {
        !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) && !secret.is_empty()
    })
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Closest candidate within `max_distance` edits.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}
