//! Configuration (layered: code > env > TOML file).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::RondoError;
use crate::tools::ToolChoice;

pub const DEFAULT_MAX_ROUNDS: usize = 20;

/// How tool calls are answered after each round.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DispatchMode {
    /// The engine answers every call; a call without a handler fails the
    /// session.
    #[default]
    Autonomous,
    /// The engine answers what it can and leaves the rest to the caller.
    Inspect,
    /// The caller answers every call.
    Manual,
}

/// Per-session settings.
#[derive(Debug, Clone, Builder)]
pub struct SessionConfig {
    #[builder(into)]
    pub model: String,
    /// Persist state server-side and continue by response id.
    #[builder(default = true)]
    pub store: bool,
    #[builder(default)]
    pub stream: bool,
    #[builder(default)]
    pub tool_choice: ToolChoice,
    /// Keep a forced tool choice after the first round. By default later
    /// rounds fall back to `auto` so a forced call cannot loop.
    #[builder(default)]
    pub persist_tool_choice: bool,
    #[builder(default)]
    pub dispatch_mode: DispatchMode,
    #[builder(default = DEFAULT_MAX_ROUNDS)]
    pub max_rounds: usize,
    /// Longest wait between two stream events before the round times out.
    pub stream_idle_timeout_ms: Option<u64>,
    /// Longest a single handler may run before its call fails.
    pub tool_timeout_ms: Option<u64>,
    #[builder(into)]
    pub instructions: Option<String>,
    pub parallel_tool_calls: Option<bool>,
    #[builder(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Values loaded from the environment or a TOML file.
#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RondoConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub store: Option<bool>,
    pub stream: Option<bool>,
    pub max_rounds: Option<usize>,
    pub dispatch_mode: Option<DispatchMode>,
    pub stream_idle_timeout_ms: Option<u64>,
    pub tool_timeout_ms: Option<u64>,
}

impl fmt::Debug for RondoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RondoConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("store", &self.store)
            .field("stream", &self.stream)
            .field("max_rounds", &self.max_rounds)
            .field("dispatch_mode", &self.dispatch_mode)
            .field("stream_idle_timeout_ms", &self.stream_idle_timeout_ms)
            .field("tool_timeout_ms", &self.tool_timeout_ms)
            .finish()
    }
}

impl RondoConfig {
    /// Load from environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self, RondoError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup (the environment, or a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RondoError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Self {
            api_key: get("OPENAI_API_KEY"),
            base_url: get("OPENAI_BASE_URL"),
            model: get("RONDO_MODEL"),
            store: parse_opt(get("RONDO_STORE"), "RONDO_STORE", parse_bool)?,
            stream: parse_opt(get("RONDO_STREAM"), "RONDO_STREAM", parse_bool)?,
            max_rounds: parse_opt(get("RONDO_MAX_ROUNDS"), "RONDO_MAX_ROUNDS", |v| {
                v.parse::<usize>().map_err(|e| e.to_string())
            })?,
            dispatch_mode: parse_opt(get("RONDO_DISPATCH_MODE"), "RONDO_DISPATCH_MODE", |v| {
                DispatchMode::from_str(v).map_err(|e| e.to_string())
            })?,
            stream_idle_timeout_ms: parse_opt(
                get("RONDO_STREAM_IDLE_TIMEOUT_MS"),
                "RONDO_STREAM_IDLE_TIMEOUT_MS",
                |v| v.parse::<u64>().map_err(|e| e.to_string()),
            )?,
            tool_timeout_ms: parse_opt(get("RONDO_TOOL_TIMEOUT_MS"), "RONDO_TOOL_TIMEOUT_MS", |v| {
                v.parse::<u64>().map_err(|e| e.to_string())
            })?,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RondoError> {
        toml::from_str(text).map_err(|e| RondoError::Configuration(format!("invalid TOML: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, RondoError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// `config.toml` in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "rondo", "rondo")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// File at `path` (or the default path when it exists), overlaid by the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, RondoError> {
        let file = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        Ok(file.merge(Self::from_env()?))
    }

    /// Overlay `other` on `self`; values set in `other` win.
    pub fn merge(self, other: Self) -> Self {
        Self {
            api_key: other.api_key.or(self.api_key),
            base_url: other.base_url.or(self.base_url),
            model: other.model.or(self.model),
            store: other.store.or(self.store),
            stream: other.stream.or(self.stream),
            max_rounds: other.max_rounds.or(self.max_rounds),
            dispatch_mode: other.dispatch_mode.or(self.dispatch_mode),
            stream_idle_timeout_ms: other.stream_idle_timeout_ms.or(self.stream_idle_timeout_ms),
            tool_timeout_ms: other.tool_timeout_ms.or(self.tool_timeout_ms),
        }
    }

    /// Session settings from the loaded values. A model id is required.
    pub fn session_config(&self) -> Result<SessionConfig, RondoError> {
        let model = self
            .model
            .clone()
            .ok_or_else(|| RondoError::Configuration("RONDO_MODEL is not set".into()))?;
        Ok(SessionConfig::builder()
            .model(model)
            .store(self.store.unwrap_or(true))
            .stream(self.stream.unwrap_or(false))
            .max_rounds(self.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS))
            .dispatch_mode(self.dispatch_mode.unwrap_or_default())
            .maybe_stream_idle_timeout_ms(self.stream_idle_timeout_ms)
            .maybe_tool_timeout_ms(self.tool_timeout_ms)
            .build())
    }
}

fn parse_opt<T>(
    value: Option<String>,
    key: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Option<T>, RondoError> {
    value
        .map(|v| parse(v.trim()).map_err(|e| RondoError::Configuration(format!("{key}={v:?}: {e}"))))
        .transpose()
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got {other}")),
    }
}
