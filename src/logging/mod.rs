//! Логирование на `tracing`: консоль (stderr) и опционально файл с
//! ежедневной ротацией.

pub mod config;
mod filters;
mod formatter;
pub mod handle;
pub mod sinks;

pub use config::{ConsoleConfig, FileConfig, LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use hgraph_error::{GenericError, HgraphResult, StackError, StatusCode};
use tracing_subscriber::{
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use self::formatter::BoxedLayer;

type Subscriber = Layered<EnvFilter, Registry>;

/// Устанавливает глобальный подписчик по конфигурации.
///
/// Повторный вызов возвращает ошибку: подписчик можно установить только
/// один раз за процесс.
pub fn init_logging(mut config: LoggingConfig) -> HgraphResult<LoggingHandle> {
    config.apply_env_overrides();
    config.validate()?;
    config.ensure_log_dir()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers: Vec<BoxedLayer<Subscriber>> = Vec::new();

    if config.console.enabled {
        layers.push(sinks::console::layer_with_config(&config));
    }

    let file_guard = if config.file.enabled {
        let (file_layer, guard) = sinks::file::layer_with_config(&config);
        layers.push(file_layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| {
            StackError::new(GenericError::new(
                StatusCode::Internal,
                format!("Logging already initialized: {e}"),
            ))
        })?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        console = config.console.enabled,
        file = config.file.enabled,
        log_path = %config.log_path().display(),
        "Logging initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
