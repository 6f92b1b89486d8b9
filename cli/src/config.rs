use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use daybook_core::insights::StreakThresholds;

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    /// Backends in fallback order, one per model.
    pub models: Vec<String>,
    pub temperature: f64,
    pub timeout_secs: u64,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            models: vec!["gpt-4.1-mini".to_string(), "gpt-4o-mini".to_string()],
            temperature: 0.1,
            timeout_secs: 60,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StreakSettings {
    pub sleep_hours: f64,
    pub protein_g: i64,
}

impl Default for StreakSettings {
    fn default() -> Self {
        let d = StreakThresholds::default();
        Self {
            sleep_hours: d.sleep_hours,
            protein_g: d.protein_g,
        }
    }
}

impl From<&StreakSettings> for StreakThresholds {
    fn from(s: &StreakSettings) -> Self {
        Self {
            sleep_hours: s.sleep_hours,
            protein_g: s.protein_g,
        }
    }
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub logging: LoggingSettings,
    pub streaks: StreakSettings,
}

impl Settings {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid config.toml")
    }

    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("In {}", path.display()))
    }
}

pub struct Config {
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub settings: Settings,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "daybook").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let config_path = proj_dirs.config_dir().join(CONFIG_FILE);
        let settings = Settings::load_from(&config_path)?;

        Ok(Config {
            db_path: data_dir.join("daybook.db"),
            config_path,
            settings,
        })
    }

    /// The API key for the generator backends. Only commands that call a model need it.
    pub fn api_key(&self) -> Result<String> {
        let var = &self.settings.llm.api_key_env;
        let key = std::env::var(var).with_context(|| {
            format!(
                "{var} is not set (configure llm.api_key_env in {})",
                self.config_path.display()
            )
        })?;
        if key.trim().is_empty() {
            anyhow::bail!("{var} is empty");
        }
        Ok(key)
    }
}
