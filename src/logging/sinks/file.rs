use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::registry::LookupSpan;

use crate::logging::{
    config::{ConsoleConfig, LoggingConfig},
    formatter::{self, BoxedLayer},
};

/// Файловый слой с ежедневной ротацией. Guard нужно держать до завершения
/// программы, иначе буфер не будет сброшен.
pub fn layer_with_config<S>(config: &LoggingConfig) -> (BoxedLayer<S>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = rolling::daily(&config.log_dir, &config.file.filename);
    let (writer, guard) = non_blocking(appender);

    // В файл без ANSI и с целевым модулем.
    let options = ConsoleConfig {
        enabled: true,
        format: config.file.format,
        with_ansi: false,
        with_target: true,
        with_thread_ids: false,
        with_line_numbers: false,
    };
    let layer = formatter::build_formatter_from_config(&options, config.file.format, writer);
    (layer, guard)
}
