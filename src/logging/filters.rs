use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// Фильтр событий: `RUST_LOG` имеет приоритет над конфигурацией.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }
    let directive = config.build_filter_directive();
    match EnvFilter::try_new(&directive) {
        Ok(filter) => filter,
        Err(e) => {
            // Подписчик ещё не установлен, поэтому сообщаем напрямую в stderr.
            eprintln!("Invalid log filter directive '{directive}': {e}; falling back to 'info'");
            EnvFilter::new("info")
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::env;

    use serial_test::serial;
    use tracing_subscriber::{fmt, prelude::*, registry::Registry};

    use super::*;
    use crate::logging::formatter::test_writer::VecMakeWriter;

    /// Тест проверяет, что фильтр из конфига пропускает warn и отсекает info
    /// для уровня `warn`.
    #[test]
    #[serial]
    fn test_filter_from_config_levels() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            level: "warn".into(),
            ..Default::default()
        };
        let filter = build_filter_from_config(&cfg);

        let writer = VecMakeWriter::default();
        let layer = fmt::layer()
            .with_writer(writer.clone())
            .with_ansi(false)
            .with_filter(filter);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "hgraph::engine", "info message filtered out");
            tracing::warn!(target: "hgraph::engine", "warn message passes");
        });

        let out = writer.contents();
        assert!(out.contains("warn message passes"));
        assert!(!out.contains("info message filtered out"));
    }

    /// Тест проверяет, что некорректный уровень не приводит к панике.
    #[test]
    #[serial]
    fn test_invalid_directive_falls_back() {
        env::remove_var("RUST_LOG");
        let cfg = LoggingConfig {
            level: "=[bad".into(),
            ..Default::default()
        };
        let _filter = build_filter_from_config(&cfg);
    }

    /// Тест проверяет приоритет `RUST_LOG` над конфигурацией.
    #[test]
    #[serial]
    fn test_rust_log_takes_precedence() {
        env::set_var("RUST_LOG", "error");
        let filter = build_filter_from_config(&LoggingConfig::default());
        env::remove_var("RUST_LOG");

        let writer = VecMakeWriter::default();
        let layer = fmt::layer()
            .with_writer(writer.clone())
            .with_ansi(false)
            .with_filter(filter);
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "hgraph", "suppressed by env");
        });
        assert!(!writer.contents().contains("suppressed by env"));
    }
}
