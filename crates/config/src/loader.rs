use std::path::{Path, PathBuf};

use {secrecy::Secret, tracing::{debug, warn}};

use crate::{
    Error, Result,
    env_subst::substitute_env,
    schema::FlowrelayConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "flowrelay.toml",
    "flowrelay.yaml",
    "flowrelay.yml",
    "flowrelay.json",
];

pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_API_KEY: &str = "VOICEFLOW_API_KEY";
pub const ENV_PROJECT_ID: &str = "VOICEFLOW_PROJECT_ID";
pub const ENV_BASE_URL: &str = "VOICEFLOW_API_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "FLOWRELAY_BACKEND_TIMEOUT_SECS";

/// Load config from `path` (format chosen by extension).
pub fn load_config(path: &Path) -> Result<FlowrelayConfig> {
    let value = load_config_value(path)?;
    serde_json::from_value(value).map_err(|e| Error::parse(path, e))
}

/// Load `path` as an untyped tree, after `${ENV}` substitution.
pub fn load_config_value(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_value(&substitute_env(&raw), path)
}

/// Resolve the effective config.
///
/// An explicit `path` must exist. Without one, the first of
/// `./flowrelay.{toml,yaml,yml,json}` and the same names under the user
/// config dir is used, or defaults when neither exists. Environment
/// overrides are applied last.
pub fn discover_and_load(path: Option<&Path>) -> Result<(FlowrelayConfig, Option<PathBuf>)> {
    let path = path.map(Path::to_path_buf).or_else(find_config_file);
    let mut config = match &path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(path)?
        },
        None => {
            debug!("no config file found, using defaults");
            FlowrelayConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    Ok((config, path))
}

/// Find the first config file in the standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// The user config directory (`~/.config/flowrelay/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "flowrelay").map(|d| d.config_dir().to_path_buf())
}

/// Overlay the bot's environment variables onto `config`. Empty values are
/// ignored.
pub fn apply_env_overrides(config: &mut FlowrelayConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

pub(crate) fn apply_env_overrides_with(
    config: &mut FlowrelayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = var(ENV_TELEGRAM_TOKEN) {
        config.telegram.token = Secret::new(token);
    }
    if let Some(key) = var(ENV_API_KEY) {
        config.backend.api_key = Secret::new(key);
    }
    if let Some(project) = var(ENV_PROJECT_ID) {
        config.backend.project_id = Some(project);
    }
    if let Some(url) = var(ENV_BASE_URL) {
        config.backend.base_url = url;
    }
    if let Some(raw) = var(ENV_TIMEOUT_SECS) {
        match raw.trim().parse() {
            Ok(secs) => config.backend.timeout_secs = secs,
            Err(e) => warn!(var = ENV_TIMEOUT_SECS, value = %raw, error = %e, "ignoring invalid timeout"),
        }
    }
}

fn parse_config_value(raw: &str, path: &Path) -> Result<serde_json::Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(raw).map_err(|e| Error::parse(path, e))?;
            serde_json::to_value(v).map_err(|e| Error::parse(path, e))
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value =
                serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e))?;
            serde_json::to_value(v).map_err(|e| Error::parse(path, e))
        },
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}
