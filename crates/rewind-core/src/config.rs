//! Configuration management for rewind.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/rewind/config.json` (or `rewind.json[c]`)
//! 2. Environment variable: `REWIND_CONFIG_CONTENT`
//! 3. Project config: `rewind.jsonc` or `rewind.json` in the working directory
//! 4. An explicitly named file (`--config`)
//! 5. Environment overrides: `REWIND_HISTORY_PATH`
//!
//! Supports JSONC (JSON with comments) and `{env:VAR_NAME}` substitution.
//!
//! The merged [`Config`] is resolved once into a [`HistorySettings`] value,
//! which is what every history operation receives.

use crate::error::{ConfigError, CoreResult};
use rewind_history::{RetentionPolicy, SnapshotStore};
use rewind_util::path::{default_history_dir, expand_home};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default maximum file size that gets a snapshot (4 MiB).
pub const DEFAULT_FILE_SIZE_LIMIT: u64 = 4 * 1024 * 1024;

/// Default retention window in days.
pub const DEFAULT_HISTORY_RETENTION: u32 = 30;

/// Static regex for variable substitution, compiled once.
static VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

fn var_regex() -> &'static regex::Regex {
    VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\{env:([^}]+)\}")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Main configuration structure.
///
/// Keys use the same names as the editor plugin settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON Schema reference.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Root directory of the mirrored history tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_path: Option<PathBuf>,

    /// Files larger than this many bytes are not snapshotted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_limit: Option<u64>,

    /// Snapshots older than this many days are pruned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_retention: Option<u32>,

    /// Snapshot when a file is closed instead of when it is saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_on_close: Option<bool>,

    /// Log level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
}

/// Log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for rewind_util::LogLevel {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => rewind_util::LogLevel::Debug,
            LogLevel::Info => rewind_util::LogLevel::Info,
            LogLevel::Warn => rewind_util::LogLevel::Warn,
            LogLevel::Error => rewind_util::LogLevel::Error,
        }
    }
}

/// Resolved history settings handed to every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistorySettings {
    /// Absolute root of the mirrored history tree.
    pub history_path: PathBuf,
    /// Size limit in bytes.
    pub file_size_limit: u64,
    /// Retention window in days.
    pub history_retention: u32,
    /// Snapshot on close rather than on save.
    pub history_on_close: bool,
}

impl HistorySettings {
    /// Settings with defaults and the given history root.
    pub fn with_root(history_path: impl Into<PathBuf>) -> Self {
        Self {
            history_path: history_path.into(),
            file_size_limit: DEFAULT_FILE_SIZE_LIMIT,
            history_retention: DEFAULT_HISTORY_RETENTION,
            history_on_close: false,
        }
    }

    /// The size and age limits.
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            file_size_limit: self.file_size_limit,
            retention_days: self.history_retention,
        }
    }

    /// A snapshot store over these settings.
    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::new(self.history_path.clone(), self.policy())
    }
}

impl Config {
    /// Load configuration from all implicit sources.
    ///
    /// Loading order (later sources override earlier):
    /// 1. Global config from `~/.config/rewind/`
    /// 2. `REWIND_CONFIG_CONTENT` environment variable
    /// 3. Project config from `project_dir`
    pub async fn load(project_dir: Option<&Path>) -> CoreResult<(Self, Vec<PathBuf>)> {
        Self::load_with(project_dir, None).await
    }

    /// Load configuration, with an explicit file taking highest precedence.
    pub async fn load_with(
        project_dir: Option<&Path>,
        explicit: Option<&Path>,
    ) -> CoreResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        // 1. Load global config
        if let Some(global_dir) = Self::global_config_dir() {
            for name in &["config.json", "rewind.json", "rewind.jsonc"] {
                let path = global_dir.join(name);
                if path.exists() {
                    let loaded = Self::load_file(&path).await?;
                    config = config.merge(loaded);
                    sources.push(path);
                    break;
                }
            }
        }

        // 2. Load from environment variable
        if let Ok(content) = std::env::var("REWIND_CONFIG_CONTENT") {
            let content = Self::substitute_variables(&content)?;
            let loaded = Self::parse_jsonc(&content, "<env>")?;
            config = config.merge(loaded);
        }

        // 3. Load project config
        if let Some(dir) = project_dir {
            for name in &["rewind.jsonc", "rewind.json"] {
                let path = dir.join(name);
                if path.exists() {
                    let loaded = Self::load_file(&path).await?;
                    config = config.merge(loaded);
                    sources.push(path);
                    break;
                }
            }
        }

        // 4. Explicit file
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.display().to_string(),
                }
                .into());
            }
            let loaded = Self::load_file(path).await?;
            config = config.merge(loaded);
            sources.push(path.to_path_buf());
        }

        // 5. Environment overrides
        if let Ok(path) = std::env::var("REWIND_HISTORY_PATH") {
            if !path.is_empty() {
                config.history_path = Some(PathBuf::from(path));
            }
        }

        Ok((config, sources))
    }

    /// Get the global config directory.
    ///
    /// On Unix systems, prefers `~/.config/rewind` over the platform-specific
    /// directory when it exists.
    pub fn global_config_dir() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            if let Some(home) = dirs::home_dir() {
                let xdg_config = home.join(".config").join("rewind");
                if xdg_config.exists() {
                    return Some(xdg_config);
                }
            }
        }

        rewind_util::path::config_dir()
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::substitute_variables(&content)?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Resolve the history settings, filling in defaults.
    pub fn history_settings(&self) -> CoreResult<HistorySettings> {
        let history_path = match &self.history_path {
            Some(path) => expand_home(path),
            None => default_history_dir().ok_or_else(|| {
                ConfigError::InvalidPath("Could not determine home directory".to_string())
            })?,
        };

        if !history_path.is_absolute() {
            return Err(ConfigError::Validation {
                message: format!(
                    "history_path must be absolute, got {}",
                    history_path.display()
                ),
            }
            .into());
        }

        Ok(HistorySettings {
            history_path,
            file_size_limit: self.file_size_limit.unwrap_or(DEFAULT_FILE_SIZE_LIMIT),
            history_retention: self.history_retention.unwrap_or(DEFAULT_HISTORY_RETENTION),
            history_on_close: self.history_on_close.unwrap_or(false),
        })
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(mut self, other: Self) -> Self {
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        if other.history_path.is_some() {
            self.history_path = other.history_path;
        }
        if other.file_size_limit.is_some() {
            self.file_size_limit = other.file_size_limit;
        }
        if other.history_retention.is_some() {
            self.history_retention = other.history_retention;
        }
        if other.history_on_close.is_some() {
            self.history_on_close = other.history_on_close;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        self
    }

    /// Save to `rewind.json` in `project_dir`, or to the global config file.
    ///
    /// Returns the written path.
    pub async fn save(&self, project_dir: Option<&Path>) -> CoreResult<PathBuf> {
        let path = if let Some(dir) = project_dir {
            dir.join("rewind.json")
        } else {
            let global_dir = Self::global_config_dir().ok_or_else(|| {
                ConfigError::InvalidPath("Could not determine config directory".to_string())
            })?;
            tokio::fs::create_dir_all(&global_dir).await?;
            global_dir.join("config.json")
        };

        let content = serde_json::to_string_pretty(self)?;

        tokio::fs::write(&path, content).await?;
        tracing::info!("Saved configuration to {}", path.display());
        Ok(path)
    }

    /// Parse JSONC (JSON with comments).
    fn parse_jsonc(content: &str, source: &str) -> CoreResult<Self> {
        let stripped = Self::strip_comments(content);

        serde_json::from_str(&stripped).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Strip `//` and `/* */` comments outside of strings.
    fn strip_comments(input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_string = false;
        let mut escape_next = false;

        while let Some(c) = chars.next() {
            if escape_next {
                result.push(c);
                escape_next = false;
                continue;
            }

            if in_string {
                match c {
                    '\\' => escape_next = true,
                    '"' => in_string = false,
                    _ => {}
                }
                result.push(c);
                continue;
            }

            let next = chars.peek().copied();
            match (c, next) {
                ('"', _) => {
                    in_string = true;
                    result.push(c);
                }
                ('/', Some('/')) => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            result.push('\n');
                            break;
                        }
                    }
                }
                ('/', Some('*')) => {
                    chars.next();
                    let mut prev = ' ';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        // Preserve newlines for error reporting
                        if c == '\n' {
                            result.push('\n');
                        }
                        prev = c;
                    }
                }
                _ => result.push(c),
            }
        }

        result
    }

    /// Substitute `{env:VAR_NAME}` placeholders.
    fn substitute_variables(content: &str) -> CoreResult<String> {
        let mut missing = None;

        let result = var_regex().replace_all(content, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match std::env::var(name) {
                Ok(value) => value,
                Err(_) => {
                    missing = Some(name.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(name) => Err(ConfigError::EnvVarNotFound { name }.into()),
            None => Ok(result.into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments() {
        let input = r#"{
            // line comment
            "history_path": "/tmp/h", /* block */
            "url": "http://example.com//path"
        }"#;
        let stripped = Config::strip_comments(input);
        assert!(!stripped.contains("line comment"));
        assert!(!stripped.contains("block"));
        assert!(stripped.contains("http://example.com//path"));
    }

    #[test]
    fn test_parse_settings_keys() {
        let config = Config::parse_jsonc(
            r#"{
                "history_path": "/var/history",
                "file_size_limit": 1024,
                "history_retention": 7,
                "history_on_close": true,
                "log_level": "debug"
            }"#,
            "test",
        )
        .unwrap();

        assert_eq!(config.history_path, Some(PathBuf::from("/var/history")));
        assert_eq!(config.file_size_limit, Some(1024));
        assert_eq!(config.history_retention, Some(7));
        assert_eq!(config.history_on_close, Some(true));
        assert_eq!(config.log_level, Some(LogLevel::Debug));
    }

    #[test]
    fn test_invalid_json_reports_source() {
        let err = Config::parse_jsonc("{ not json", "broken.json").unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = Config {
            history_path: Some(PathBuf::from("/a")),
            history_retention: Some(10),
            ..Default::default()
        };
        let over = Config {
            history_path: Some(PathBuf::from("/b")),
            file_size_limit: Some(1),
            ..Default::default()
        };
        let merged = base.merge(over);
        assert_eq!(merged.history_path, Some(PathBuf::from("/b")));
        assert_eq!(merged.history_retention, Some(10));
        assert_eq!(merged.file_size_limit, Some(1));
    }

    #[test]
    fn test_history_settings_defaults() {
        let settings = Config::default().history_settings().unwrap();
        assert!(settings.history_path.ends_with(".rewind/history"));
        assert_eq!(settings.file_size_limit, DEFAULT_FILE_SIZE_LIMIT);
        assert_eq!(settings.history_retention, DEFAULT_HISTORY_RETENTION);
        assert!(!settings.history_on_close);
    }

    #[test]
    fn test_history_settings_expands_home() {
        let config = Config {
            history_path: Some(PathBuf::from("~/hist")),
            ..Default::default()
        };
        let settings = config.history_settings().unwrap();
        assert_eq!(settings.history_path, dirs::home_dir().unwrap().join("hist"));
    }

    #[test]
    fn test_relative_history_path_rejected() {
        let config = Config {
            history_path: Some(PathBuf::from("relative/hist")),
            ..Default::default()
        };
        assert!(config.history_settings().is_err());
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("REWIND_TEST_HISTORY_ROOT", "/srv/history");
        let out = Config::substitute_variables(r#"{"history_path": "{env:REWIND_TEST_HISTORY_ROOT}"}"#)
            .unwrap();
        assert_eq!(out, r#"{"history_path": "/srv/history"}"#);

        let err = Config::substitute_variables("{env:REWIND_TEST_SURELY_UNSET_VAR}").unwrap_err();
        assert!(err.to_string().contains("REWIND_TEST_SURELY_UNSET_VAR"));
    }

    #[test]
    fn test_policy_from_settings() {
        let mut settings = HistorySettings::with_root("/h");
        settings.file_size_limit = 10;
        settings.history_retention = 2;
        let policy = settings.policy();
        assert_eq!(policy.file_size_limit, 10);
        assert_eq!(policy.retention_days, 2);
        assert_eq!(settings.store().history_root(), Path::new("/h"));
    }

    #[tokio::test]
    async fn test_save_then_load_project_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            history_path: Some(PathBuf::from("/srv/history")),
            history_retention: Some(7),
            history_on_close: Some(true),
            ..Default::default()
        };

        let path = config.save(Some(dir.path())).await.unwrap();
        assert_eq!(path, dir.path().join("rewind.json"));

        let loaded = Config::load_file(&path).await.unwrap();
        assert_eq!(loaded.history_path, Some(PathBuf::from("/srv/history")));
        assert_eq!(loaded.history_retention, Some(7));
        assert_eq!(loaded.history_on_close, Some(true));
    }
}
