use std::time::Instant;

use tracing_appender::non_blocking::WorkerGuard;

/// Handle, удерживающий фоновые писатели логов. Должен жить до завершения
/// программы: при drop буферы файлового вывода сбрасываются.
#[derive(Default)]
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self { file_guard }
    }

    /// Включён ли файловый вывод.
    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Сбрасывает буферы и отпускает писатели.
    pub fn shutdown(mut self) {
        let start = Instant::now();
        let had_file = self.file_guard.is_some();
        drop(self.file_guard.take());
        tracing::debug!(
            file_sink = had_file,
            shutdown_duration_us = start.elapsed().as_micros() as u64,
            "Logging shutdown completed"
        );
    }
}

impl std::fmt::Debug for LoggingHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("file_sink", &self.has_file_sink())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_without_file_sink() {
        let handle = LoggingHandle::default();
        assert!(!handle.has_file_sink());
        assert_eq!(format!("{handle:?}"), "LoggingHandle { file_sink: false }");
        handle.shutdown();
    }

    /// Тест проверяет, что shutdown отпускает guard файлового писателя.
    #[test]
    fn test_shutdown_releases_guard() {
        let (_writer, guard) = tracing_appender::non_blocking(std::io::sink());
        let handle = LoggingHandle::new(Some(guard));
        assert!(handle.has_file_sink());
        handle.shutdown();
    }
}
