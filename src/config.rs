use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::stats::NutritionGoals;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    /// Fixed reply for every photo
    #[default]
    Stub,
    /// External program fed the photo on stdin
    Command,
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzerKind::Stub => write!(f, "stub"),
            AnalyzerKind::Command => write!(f, "command"),
        }
    }
}

/// Photo analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub kind: AnalyzerKind,
    /// Reply returned by the stub analyzer
    pub reply: String,
    /// Program run by the command analyzer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// Arguments passed to the program
    pub args: Vec<String>,
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Default tracing filter directive
    pub log_level: ConfigValue<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub analyzer: AnalyzerConfig,
    /// Daily nutrition goals
    pub goals: NutritionGoals,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    log_level: Option<String>,
    analyzer: Option<AnalyzerConfig>,
    goals: Option<NutritionGoals>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_db_path = Self::default_data_dir().join("meals.db");

        // Start with defaults
        let mut database_path = ConfigValue::new(default_db_path, ConfigSource::Default);
        let mut log_level = ConfigValue::new("warn".to_string(), ConfigSource::Default);
        let mut config_file = None;
        let mut analyzer = AnalyzerConfig::default();
        let mut goals = NutritionGoals::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(level) = file_config.log_level {
                log_level = ConfigValue::new(level, ConfigSource::File);
            }
            if let Some(analyzer_config) = file_config.analyzer {
                analyzer = analyzer_config;
            }
            if let Some(file_goals) = file_config.goals {
                goals = file_goals;
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("MEALSNAP_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(level) = std::env::var("MEALSNAP_LOG") {
            log_level = ConfigValue::new(level, ConfigSource::Environment);
        }
        if let Ok(program) = std::env::var("MEALSNAP_ANALYZER_COMMAND") {
            analyzer.kind = AnalyzerKind::Command;
            analyzer.program = Some(program);
        }

        Ok(Self {
            database_path,
            log_level,
            config_file,
            analyzer,
            goals,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/mealsnap/
    /// - macOS: ~/Library/Application Support/mealsnap/
    /// - Windows: %APPDATA%/mealsnap/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mealsnap")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/mealsnap/
    /// - macOS: ~/Library/Application Support/mealsnap/
    /// - Windows: %APPDATA%/mealsnap/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mealsnap")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config
            .database_path
            .value
            .to_string_lossy()
            .contains("meals.db"));
        assert_eq!(config.database_path.source, ConfigSource::Default);
        assert_eq!(config.log_level.value, "warn");
        assert_eq!(config.analyzer.kind, AnalyzerKind::Stub);
        assert_eq!(config.goals, NutritionGoals::default());
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: /custom/path/meals.sqlite").unwrap();
        writeln!(file, "log_level: debug").unwrap();
        writeln!(file, "analyzer:").unwrap();
        writeln!(file, "  kind: command").unwrap();
        writeln!(file, "  program: /usr/local/bin/analyze-meal").unwrap();
        writeln!(file, "  args: [\"--model\", \"small\"]").unwrap();
        writeln!(file, "goals:").unwrap();
        writeln!(file, "  calories: 1800").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(
            config.database_path.value,
            PathBuf::from("/custom/path/meals.sqlite")
        );
        assert_eq!(config.database_path.source, ConfigSource::File);
        assert_eq!(config.log_level.value, "debug");
        assert_eq!(config.log_level.source, ConfigSource::File);
        assert_eq!(config.analyzer.kind, AnalyzerKind::Command);
        assert_eq!(
            config.analyzer.program.as_deref(),
            Some("/usr/local/bin/analyze-meal")
        );
        assert_eq!(config.analyzer.args, vec!["--model", "small"]);
        assert_eq!(config.goals.calories, 1800);
        assert_eq!(config.goals.protein, 150);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_relative_database_path_resolves_against_config_dir() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: data/meals.db").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(
            config.database_path.value,
            temp_dir.path().join("data/meals.db")
        );
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: /from/file.db").unwrap();

        std::env::set_var("MEALSNAP_DATABASE_PATH", "/from/env.db");
        std::env::set_var("MEALSNAP_ANALYZER_COMMAND", "analyze-meal");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.database_path.value, PathBuf::from("/from/env.db"));
        assert_eq!(config.database_path.source, ConfigSource::Environment);
        assert_eq!(config.analyzer.kind, AnalyzerKind::Command);
        assert_eq!(config.analyzer.program.as_deref(), Some("analyze-meal"));

        // Clean up
        std::env::remove_var("MEALSNAP_DATABASE_PATH");
        std::env::remove_var("MEALSNAP_ANALYZER_COMMAND");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_partial_file_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "analyzer:").unwrap();
        writeln!(file, "  reply: \"Calories: 100\"").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.database_path.source, ConfigSource::Default);
        assert_eq!(config.analyzer.kind, AnalyzerKind::Stub);
        assert_eq!(config.analyzer.reply, "Calories: 100");
    }
}
