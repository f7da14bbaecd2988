use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CHANGELENS_DIR_NAME: &str = ".changelens";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8081";
pub const DEFAULT_ANALYSIS_ENDPOINT: &str = "http://localhost:6066";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisProviderKind {
    #[default]
    Remote,
    Heuristic,
}

impl AnalysisProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Heuristic => "heuristic",
        }
    }
}

impl std::str::FromStr for AnalysisProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "remote" => Ok(Self::Remote),
            "heuristic" => Ok(Self::Heuristic),
            other => Err(format!(
                "invalid analysis provider '{other}', expected one of: remote, heuristic"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChangelensConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub provider: AnalysisProviderKind,
    #[serde(default = "default_analysis_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: AnalysisProviderKind::Remote,
            endpoint: default_analysis_endpoint(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn changelens_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(CHANGELENS_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    changelens_dir(workspace_root).join(CONFIG_FILE_NAME)
}

pub fn load_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<ChangelensConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(ChangelensConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: ChangelensConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<ChangelensConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(changelens_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = ChangelensConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

pub fn validate_config(config: &ChangelensConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if !looks_like_http_url(&config.backend.base_url) {
        warnings.push(ConfigWarning {
            code: "backend_url_scheme",
            message: format!(
                "backend.base_url '{}' does not start with http:// or https://",
                config.backend.base_url
            ),
        });
    }

    if config.analysis.provider == AnalysisProviderKind::Remote
        && !looks_like_http_url(&config.analysis.endpoint)
    {
        warnings.push(ConfigWarning {
            code: "analysis_endpoint_scheme",
            message: format!(
                "analysis.endpoint '{}' does not start with http:// or https://; every analysis will use the heuristic fallback",
                config.analysis.endpoint
            ),
        });
    }

    warnings
}

/// Strips trailing slashes so paths can be appended with `format!("{base}/...")`.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn looks_like_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_owned()
}

fn default_analysis_endpoint() -> String {
    DEFAULT_ANALYSIS_ENDPOINT.to_owned()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_preview_chars() -> usize {
    DEFAULT_PREVIEW_CHARS
}

fn normalize_url_or(value: &str, fallback: &str) -> String {
    let normalized = normalize_base_url(value);
    if normalized.is_empty() {
        fallback.to_owned()
    } else {
        normalized
    }
}

fn normalize_config(mut config: ChangelensConfig) -> ChangelensConfig {
    config.backend.base_url = normalize_url_or(&config.backend.base_url, DEFAULT_BACKEND_URL);
    if config.backend.timeout_secs == 0 {
        config.backend.timeout_secs = DEFAULT_TIMEOUT_SECS;
    }

    config.analysis.endpoint =
        normalize_url_or(&config.analysis.endpoint, DEFAULT_ANALYSIS_ENDPOINT);
    if config.analysis.timeout_secs == 0 {
        config.analysis.timeout_secs = DEFAULT_TIMEOUT_SECS;
    }
    if config.analysis.preview_chars == 0 {
        config.analysis.preview_chars = DEFAULT_PREVIEW_CHARS;
    }

    config
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn ensure_workspace_config_creates_default_file() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();

        let config = ensure_workspace_config(workspace).expect("ensure config");

        assert_eq!(config.analysis.provider, AnalysisProviderKind::Remote);
        assert_eq!(config.backend.base_url, DEFAULT_BACKEND_URL);
        assert!(config_path(workspace).exists());

        let content = fs::read_to_string(config_path(workspace)).expect("read config file");
        assert!(content.contains("[backend]"));
        assert!(content.contains("[analysis]"));
        assert!(content.contains("provider = \"remote\""));
    }

    #[test]
    fn load_workspace_config_without_file_returns_defaults() {
        let temp = tempdir().expect("tempdir");

        let config = load_workspace_config(temp.path()).expect("load config");

        assert_eq!(config, ChangelensConfig::default());
        assert!(!config_path(temp.path()).exists());
    }

    #[test]
    fn load_workspace_config_parses_and_normalizes_values() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();
        fs::create_dir_all(changelens_dir(workspace)).expect("create .changelens");

        let raw = r#"
[backend]
base_url = "http://tickets.internal:9000/ "
timeout_secs = 0

[analysis]
provider = "heuristic"
endpoint = "   "
preview_chars = 80
"#;
        fs::write(config_path(workspace), raw).expect("write config");

        let config = load_workspace_config(workspace).expect("load config");

        assert_eq!(config.backend.base_url, "http://tickets.internal:9000");
        assert_eq!(config.backend.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.analysis.provider, AnalysisProviderKind::Heuristic);
        assert_eq!(config.analysis.endpoint, DEFAULT_ANALYSIS_ENDPOINT);
        assert_eq!(config.analysis.preview_chars, 80);
    }

    #[test]
    fn validate_config_flags_non_http_urls() {
        let mut config = ChangelensConfig::default();
        assert!(validate_config(&config).is_empty());

        config.backend.base_url = "tickets.internal".to_owned();
        config.analysis.endpoint = "ftp://analysis".to_owned();

        let codes = validate_config(&config)
            .into_iter()
            .map(|warning| warning.code)
            .collect::<Vec<_>>();
        assert_eq!(codes, vec!["backend_url_scheme", "analysis_endpoint_scheme"]);

        config.analysis.provider = AnalysisProviderKind::Heuristic;
        assert_eq!(validate_config(&config).len(), 1);
    }

    #[test]
    fn provider_kind_parses_from_str() {
        assert_eq!(
            "heuristic".parse::<AnalysisProviderKind>(),
            Ok(AnalysisProviderKind::Heuristic)
        );
        assert!("gemini".parse::<AnalysisProviderKind>().is_err());
    }
}
