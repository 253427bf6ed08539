use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use sw_backend::{InitError, ProviderSettings};
use thiserror::Error;

use crate::safety::SafetyPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub safety: SafetyConfig,
    pub executor: ExecutorConfig,
    pub history: HistoryConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Preferred provider name or alias.
    pub default: String,
    /// Try the other providers when the preferred one fails.
    pub fallback_chain: bool,
    pub anthropic: BackendConfig,
    pub openai: BackendConfig,
    pub gemini: BackendConfig,
    pub ollama: BackendConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default: "anthropic".to_string(),
            fallback_chain: true,
            anthropic: BackendConfig::default(),
            openai: BackendConfig::default(),
            gemini: BackendConfig::default(),
            ollama: BackendConfig::default(),
        }
    }
}

/// Per-provider settings. Unset fields use the client's defaults.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub model: Option<String>,
    /// Command printing the API key on stdout, run via `sh -c`.
    /// Takes precedence over the `<PROVIDER>_API_KEY` variable.
    pub api_key_cmd: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SafetyConfig {
    pub enforce_high_risk: bool,
    pub extra_blocked: Vec<String>,
    /// Run commands that need no confirmation without asking.
    pub auto_execute: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enforce_high_risk: true,
            extra_blocked: Vec::new(),
            auto_execute: false,
        }
    }
}

impl SafetyConfig {
    pub fn policy(&self) -> SafetyPolicy {
        SafetyPolicy {
            enforce_high_risk: self.enforce_high_risk,
            extra_blocked: self.extra_blocked.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutorConfig {
    pub timeout_secs: u64,
    pub shell: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            shell: "sh".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Defaults to `$XDG_DATA_HOME/shellwise/history.json`.
    pub path: Option<String>,
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            max_entries: 1000,
        }
    }
}

impl HistoryConfig {
    pub fn resolve_path(&self) -> PathBuf {
        resolve_or(&self.path, || data_dir().join("history.json"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    /// Defaults to `$XDG_DATA_HOME/shellwise/audit.jsonl`.
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl AuditConfig {
    pub fn resolve_path(&self) -> PathBuf {
        resolve_or(&self.path, || data_dir().join("audit.jsonl"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Defaults to `$XDG_DATA_HOME/shellwise/shellwise.log`.
    pub path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            path: None,
        }
    }
}

impl LoggingConfig {
    pub fn resolve_path(&self) -> PathBuf {
        resolve_or(&self.path, || data_dir().join("shellwise.log"))
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the user config, falling back to defaults when it is missing
    /// or unreadable.
    pub fn load_or_default() -> Self {
        let path = config_path();
        if !path.exists() {
            return Config::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            eprintln!("warning: {e}");
            Config::default()
        })
    }

    fn backend(&self, provider: &str) -> Option<&BackendConfig> {
        match provider {
            "anthropic" => Some(&self.provider.anthropic),
            "openai" => Some(&self.provider.openai),
            "gemini" => Some(&self.provider.gemini),
            "ollama" => Some(&self.provider.ollama),
            _ => None,
        }
    }

    /// Resolve constructor settings for a canonical provider name.
    pub fn provider_settings(&self, provider: &'static str) -> Result<ProviderSettings, InitError> {
        let Some(backend) = self.backend(provider) else {
            return Ok(ProviderSettings::default());
        };

        let api_key = match key_env_var(provider) {
            Some(env_var) => resolve_api_key(provider, env_var, backend.api_key_cmd.as_deref())?,
            None => None,
        };

        Ok(ProviderSettings {
            api_key,
            model: backend.model.clone(),
            base_url: backend.base_url.clone(),
        })
    }
}

fn key_env_var(provider: &str) -> Option<&'static str> {
    match provider {
        "anthropic" => Some(sw_backend::anthropic::ENV_VAR),
        "openai" => Some(sw_backend::openai::ENV_VAR),
        "gemini" => Some(sw_backend::gemini::ENV_VAR),
        _ => None,
    }
}

/// `api_key_cmd` first, then the environment. A failing command is an
/// error rather than a silent fallthrough.
fn resolve_api_key(
    provider: &'static str,
    env_var: &str,
    api_key_cmd: Option<&str>,
) -> Result<Option<String>, InitError> {
    if let Some(cmd) = api_key_cmd {
        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .output()
            .map_err(|e| InitError::KeyCommand {
                provider,
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(InitError::KeyCommand {
                provider,
                message: format!("`{cmd}` exited with {}", output.status),
            });
        }
        let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !key.is_empty() {
            return Ok(Some(key));
        }
    }

    Ok(std::env::var(env_var)
        .ok()
        .filter(|key| !key.trim().is_empty()))
}

fn resolve_or(custom: &Option<String>, default: impl FnOnce() -> PathBuf) -> PathBuf {
    custom.as_ref().map(PathBuf::from).unwrap_or_else(default)
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local").join("share"))
        .join("shellwise")
}

pub fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("shellwise")
        .join("config.toml")
}
