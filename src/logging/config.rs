use std::{
    env, fs,
    path::{Path, PathBuf},
};

use hgraph_error::{bail, ensure, GenericError, HgraphResult, StackError, StatusCode};
use serde::{Deserialize, Serialize};

/// Формат вывода событий.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Настройки консольного вывода (stderr).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

/// Настройки файлового вывода (ежедневная ротация).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub format: LogFormat,
    pub filename: String,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень для крейта: trace, debug, info, warn, error.
    pub level: String,
    /// Каталог для файловых логов.
    pub log_dir: PathBuf,
    pub console: ConsoleConfig,
    pub file: FileConfig,
}

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: LogFormat::Compact,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            format: LogFormat::Json,
            filename: "hgraph.log".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
        }
    }
}

impl LoggingConfig {
    /// Переопределения из окружения: `HGRAPH_LOG_LEVEL`, `HGRAPH_LOG_DIR`,
    /// `HGRAPH_LOG_FORMAT`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("HGRAPH_LOG_LEVEL") {
            self.level = level.to_lowercase();
        }
        if let Ok(dir) = env::var("HGRAPH_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Ok(format) = env::var("HGRAPH_LOG_FORMAT") {
            match format.to_lowercase().as_str() {
                "pretty" => self.console.format = LogFormat::Pretty,
                "compact" => self.console.format = LogFormat::Compact,
                "json" => self.console.format = LogFormat::Json,
                // Неизвестный формат оставляет настройку из конфига.
                _ => {}
            }
        }
    }

    pub fn validate(&self) -> HgraphResult<()> {
        if !LEVELS.contains(&self.level.as_str()) {
            bail!(
                StatusCode::InvalidArgs,
                "Invalid log level '{}', expected one of {:?}",
                self.level,
                LEVELS
            );
        }
        ensure!(
            !self.file.enabled || !self.file.filename.trim().is_empty(),
            StatusCode::InvalidArgs,
            "Log file name is empty"
        );
        Ok(())
    }

    /// Создаёт каталог логов, если файловый вывод включён.
    pub fn ensure_log_dir(&self) -> HgraphResult<()> {
        if !self.file.enabled {
            return Ok(());
        }
        fs::create_dir_all(&self.log_dir).map_err(|e| {
            StackError::new(GenericError::new(
                StatusCode::Io,
                format!("Cannot create log dir {}: {e}", self.log_dir.display()),
            ))
        })
    }

    /// Директива `EnvFilter`: уровень для крейта, `warn` для остальных.
    pub fn build_filter_directive(&self) -> String {
        format!("warn,hgraph={}", self.level)
    }

    pub fn log_path(&self) -> PathBuf {
        Path::new(&self.log_dir).join(&self.file.filename)
    }
}
