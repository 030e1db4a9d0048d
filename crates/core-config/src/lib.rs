//! Configuration loading and validation.
//!
//! Reads `composer.toml` (or an override path provided by the binary). Every
//! field has a default, unknown fields are ignored, and a file that fails to
//! parse is reported at warn and replaced by defaults so the client always
//! starts. After loading, [`Config::validate`] clamps values the runtime
//! cannot honor; each clamp is logged under the `config` target.

use anyhow::Result;
use core_behavior::Locale;
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use tracing::{info, warn};

pub const FILE_NAME: &str = "composer.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001/ask".to_string(),
            timeout_ms: 120_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub id: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: "lmstudio-community/Meta-Llama-3-8B-Instruct-GGUF".to_string(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub idle_timeout_ms: u64,
    pub idle_threshold_ms: u64,
    pub locale: Locale,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 3000,
            idle_threshold_ms: 2900,
            locale: Locale::En,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub tick_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { tick_ms: 100 }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub file: ConfigFile,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub model: Option<String>,
}

/// Local `composer.toml` first, then the platform config directory.
pub fn discover() -> PathBuf {
    let local = PathBuf::from(FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("composer").join(FILE_NAME);
    }
    local
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Ok(Config { file }),
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

impl Config {
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.url {
            self.file.server.url = url;
        }
        if let Some(model) = overrides.model {
            self.file.model.id = model;
        }
    }

    /// Clamp values into their usable ranges. Returns the number of clamps.
    pub fn validate(&mut self) -> usize {
        let mut clamps = 0;

        let model = &mut self.file.model;
        let temperature = if model.temperature.is_nan() {
            ModelConfig::default().temperature
        } else {
            model.temperature.clamp(0.0, 2.0)
        };
        if temperature != model.temperature {
            info!(target: "config", raw = model.temperature, clamped = temperature, "temperature_clamped");
            model.temperature = temperature;
            clamps += 1;
        }
        if model.max_tokens == 0 {
            info!(target: "config", raw = 0u32, clamped = 1u32, "max_tokens_clamped");
            model.max_tokens = 1;
            clamps += 1;
        }

        let analysis = &mut self.file.analysis;
        if analysis.idle_threshold_ms > analysis.idle_timeout_ms {
            info!(
                target: "config",
                raw = analysis.idle_threshold_ms,
                clamped = analysis.idle_timeout_ms,
                "idle_threshold_clamped"
            );
            analysis.idle_threshold_ms = analysis.idle_timeout_ms;
            clamps += 1;
        }

        let runtime = &mut self.file.runtime;
        if runtime.tick_ms == 0 {
            info!(target: "config", raw = 0u64, clamped = 1u64, "tick_ms_clamped");
            runtime.tick_ms = 1;
            clamps += 1;
        }
        clamps
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.file.analysis.idle_timeout_ms)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.file.analysis.idle_threshold_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.file.runtime.tick_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.file.server.timeout_ms)
    }
}
