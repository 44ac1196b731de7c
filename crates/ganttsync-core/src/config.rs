use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;

use crate::codec::TimestampCodec;

/// Project-level config file, relative to the project root.
pub const PROJECT_CONFIG_PATH: &str = ".ganttsync/config.toml";

/// Environment override for `endpoint.base_url`.
pub const ENDPOINT_ENV: &str = "GANTTSYNC_ENDPOINT";

/// Environment override for the output mode.
pub const FORMAT_ENV: &str = "GANTTSYNC_FORMAT";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_EDIT_PATH: &str = "/live_edit.php";
pub const DEFAULT_DATA_PATH: &str = "/data.php";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// One config file as written on disk. Every key is optional so project and
/// user files can be layered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub endpoint: EndpointSection,
    #[serde(default)]
    pub time: TimeSection,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub edit_path: Option<String>,
    #[serde(default)]
    pub data_path: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSection {
    /// Minutes to add to local time to get UTC (UTC+3 is `-180`).
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

impl ConfigFile {
    /// Layer `self` over `lower`: keys set in `self` win.
    #[must_use]
    pub fn over(self, lower: Self) -> Self {
        Self {
            endpoint: EndpointSection {
                base_url: self.endpoint.base_url.or(lower.endpoint.base_url),
                edit_path: self.endpoint.edit_path.or(lower.endpoint.edit_path),
                data_path: self.endpoint.data_path.or(lower.endpoint.data_path),
                timeout_secs: self.endpoint.timeout_secs.or(lower.endpoint.timeout_secs),
            },
            time: TimeSection {
                utc_offset_minutes: self.time.utc_offset_minutes.or(lower.time.utc_offset_minutes),
            },
            output: self.output.or(lower.output),
        }
    }
}

/// Resolved endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub edit_path: String,
    pub data_path: String,
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            edit_path: DEFAULT_EDIT_PATH.to_string(),
            data_path: DEFAULT_DATA_PATH.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl EndpointConfig {
    /// Endpoint that accepts create/update/delete requests.
    #[must_use]
    pub fn edit_url(&self) -> String {
        join_url(&self.base_url, &self.edit_path)
    }

    /// Endpoint that serves the task table.
    #[must_use]
    pub fn data_url(&self) -> String {
        join_url(&self.base_url, &self.data_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub endpoint: EndpointConfig,
    /// `None` means "use the machine's local offset".
    pub utc_offset_minutes: Option<i32>,
    pub resolved_output: String,
}

impl EffectiveConfig {
    #[must_use]
    pub fn codec(&self) -> TimestampCodec {
        self.utc_offset_minutes
            .map_or_else(TimestampCodec::local, TimestampCodec::with_offset)
    }
}

pub fn load_project_config(project_root: &Path) -> Result<ConfigFile> {
    load_file(&project_root.join(PROJECT_CONFIG_PATH))
}

pub fn load_user_config() -> Result<ConfigFile> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    load_file(&config_dir.join("ganttsync/config.toml"))
}

/// Load one config file; a missing file is an empty layer.
pub fn load_file(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ConfigFile>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve the effective configuration.
///
/// Precedence for the base URL: `cli_endpoint` > `GANTTSYNC_ENDPOINT` >
/// `explicit_file` > project file > user file > defaults.
pub fn resolve_config(
    project_root: &Path,
    explicit_file: Option<&Path>,
    cli_endpoint: Option<&str>,
    cli_json: bool,
) -> Result<EffectiveConfig> {
    let mut layered = load_project_config(project_root)?.over(load_user_config()?);
    if let Some(path) = explicit_file {
        if !path.exists() {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        layered = load_file(path)?.over(layered);
    }

    let env_endpoint = env::var(ENDPOINT_ENV).ok().filter(|v| !v.trim().is_empty());
    let env_format = env::var(FORMAT_ENV).ok();
    Ok(resolve(
        layered,
        cli_endpoint.map(str::to_string).or(env_endpoint),
        cli_json,
        env_format,
        std::io::stdout().is_terminal(),
    ))
}

fn resolve(
    layered: ConfigFile,
    endpoint_override: Option<String>,
    cli_json: bool,
    env_format: Option<String>,
    stdout_is_tty: bool,
) -> EffectiveConfig {
    let defaults = EndpointConfig::default();
    let section = layered.endpoint;
    let endpoint = EndpointConfig {
        base_url: endpoint_override
            .or(section.base_url)
            .unwrap_or(defaults.base_url),
        edit_path: section.edit_path.unwrap_or(defaults.edit_path),
        data_path: section.data_path.unwrap_or(defaults.data_path),
        timeout_secs: section.timeout_secs.unwrap_or(defaults.timeout_secs),
    };

    EffectiveConfig {
        endpoint,
        utc_offset_minutes: layered.time.utc_offset_minutes,
        resolved_output: resolve_output(cli_json, layered.output, env_format, stdout_is_tty),
    }
}

fn resolve_output(
    cli_json: bool,
    file_output: Option<String>,
    env_format: Option<String>,
    stdout_is_tty: bool,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = file_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if stdout_is_tty {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}
