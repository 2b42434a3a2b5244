use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use hgraph_error::{GenericError, HgraphResult, StackError, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{container::FileOptions, engine::EngineOptions, logging::LoggingConfig};

/// Параметры файлового хранилища.
pub type StorageConfig = FileOptions;

/// Конфигурация приложения.
///
/// Источники в порядке приоритета (последний выигрывает): встроенные
/// значения, файл (TOML/JSON, опционально), переменные окружения
/// `HGRAPH_<SECTION>__<KEY>`, например `HGRAPH_ENGINE__MAX_DEPTH=64`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineOptions,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Загружает конфигурацию без файла.
    pub fn load() -> HgraphResult<Self> {
        Self::load_from(None)
    }

    /// Загружает конфигурацию; `path` должен существовать, если указан.
    pub fn load_from(path: Option<&Path>) -> HgraphResult<Self> {
        let defaults = Config::try_from(&Settings::default()).map_err(config_error)?;
        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let cfg = builder
            .add_source(
                Environment::with_prefix("HGRAPH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error)?;

        let settings: Settings = cfg.try_deserialize().map_err(config_error)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> HgraphResult<()> {
        hgraph_error::ensure!(
            self.engine.max_depth > 0,
            StatusCode::InvalidArgs,
            "engine.max_depth must be positive"
        );
        hgraph_error::ensure!(
            (1..=22).contains(&self.storage.compression_level),
            StatusCode::InvalidArgs,
            "storage.compression_level must be in 1..=22, got {}",
            self.storage.compression_level
        );
        self.logging.validate()
    }
}

fn config_error(err: ConfigError) -> StackError {
    StackError::new(GenericError::new(
        StatusCode::InvalidArgs,
        format!("Invalid configuration: {err}"),
    ))
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
