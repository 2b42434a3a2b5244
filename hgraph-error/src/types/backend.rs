use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибка контейнера (backend): файл HGF, узлы и записи.
///
/// Пробрасывается наверх без изменений и без повторных попыток.
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Ошибка ввода-вывода (файл не найден, нет прав и т.д.)
    Io {
        kind: std::io::ErrorKind,
        path: Option<String>,
        reason: String,
    },

    /// Неверный magic number в заголовке
    InvalidMagic { expected: [u8; 3], got: [u8; 3] },

    /// Неподдерживаемая версия формата
    UnsupportedVersion { found: u8, supported: Vec<u8> },

    /// CRC не совпадает
    CrcMismatch { computed: u32, recorded: u32 },

    /// Повреждённые данные в файле
    Corrupted {
        reason: String,
        offset: Option<u64>,
    },

    /// Неизвестный тег в потоке
    InvalidTag {
        tag: u8,
        context: &'static str,
        offset: Option<u64>,
    },

    /// Ошибка сжатия/распаковки блока
    Compression { reason: String },

    /// Превышен лимит размера (длины кодируются как u32)
    SizeLimit { what: String, size: u64, limit: u64 },

    /// Запись в контейнер, открытый только для чтения
    ReadOnly { operation: String },

    /// Узел не существует (или удалён)
    NoSuchNode { node: u32 },

    /// Запись с таким именем отсутствует в узле
    NoSuchEntry { node: u32, name: String },

    /// Имя уже занято в узле (атрибут, датасет или дочерний узел)
    NameTaken {
        node: u32,
        name: String,
        existing: &'static str,
    },
}

impl BackendError {
    /// Конструктор для ошибок ввода-вывода с путём файла.
    pub fn io(
        err: &std::io::Error,
        path: impl Into<String>,
    ) -> Self {
        Self::Io {
            kind: err.kind(),
            path: Some(path.into()),
            reason: err.to_string(),
        }
    }

    /// Добавляет offset к ошибкам разбора.
    pub fn with_offset(
        mut self,
        at: u64,
    ) -> Self {
        match &mut self {
            Self::Corrupted { offset, .. } | Self::InvalidTag { offset, .. } => {
                *offset = Some(at);
            }
            _ => {}
        }
        self
    }

    /// Подсказка для пользователя CLI.
    pub fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            Self::CrcMismatch { .. } | Self::Corrupted { .. } => {
                Some("File may be truncated or corrupted. Re-run the save from the source data")
            }
            Self::UnsupportedVersion { .. } => Some("Upgrade hgraph to read this container"),
            Self::ReadOnly { .. } => Some("Open the container in write or append mode"),
            _ => None,
        }
    }
}

fn write_offset(
    f: &mut std::fmt::Formatter<'_>,
    offset: Option<u64>,
) -> std::fmt::Result {
    if let Some(o) = offset {
        write!(f, " at offset {o}")?;
    }
    Ok(())
}

impl std::fmt::Display for BackendError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Io { path, reason, .. } => match path {
                Some(p) => write!(f, "I/O error on '{p}': {reason}"),
                None => write!(f, "I/O error: {reason}"),
            },
            Self::InvalidMagic { expected, got } => {
                write!(f, "Invalid magic number: expected {expected:?}, got {got:?}")
            }
            Self::UnsupportedVersion { found, supported } => {
                write!(
                    f,
                    "Unsupported container version {found} (supported: {supported:?})"
                )
            }
            Self::CrcMismatch { computed, recorded } => write!(
                f,
                "CRC mismatch: computed 0x{computed:08X}, recorded 0x{recorded:08X}"
            ),
            Self::Corrupted { reason, offset } => {
                write!(f, "Corrupted container: {reason}")?;
                write_offset(f, *offset)
            }
            Self::InvalidTag {
                tag,
                context,
                offset,
            } => {
                write!(f, "Invalid tag 0x{tag:02X} in {context}")?;
                write_offset(f, *offset)
            }
            Self::Compression { reason } => write!(f, "Compression error: {reason}"),
            Self::SizeLimit { what, size, limit } => {
                write!(f, "{what} size {size} exceeds limit {limit}")
            }
            Self::ReadOnly { operation } => {
                write!(f, "Container is read-only: cannot {operation}")
            }
            Self::NoSuchNode { node } => write!(f, "Node #{node} does not exist"),
            Self::NoSuchEntry { node, name } => {
                write!(f, "Node #{node} has no entry named '{name}'")
            }
            Self::NameTaken {
                node,
                name,
                existing,
            } => write!(f, "Name '{name}' already used by {existing} in node #{node}"),
        }
    }
}

impl std::error::Error for BackendError {}

impl ErrorExt for BackendError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Io { kind, .. } => match kind {
                std::io::ErrorKind::NotFound => StatusCode::NotFound,
                std::io::ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
                std::io::ErrorKind::UnexpectedEof => StatusCode::UnexpectedEof,
                std::io::ErrorKind::InvalidData => StatusCode::CorruptedData,
                _ => StatusCode::Io,
            },
            Self::InvalidMagic { .. } | Self::CrcMismatch { .. } | Self::Corrupted { .. } => {
                StatusCode::CorruptedData
            }
            Self::InvalidTag { .. } => StatusCode::CorruptedData,
            Self::UnsupportedVersion { .. } => StatusCode::UnsupportedVersion,
            Self::Compression { .. } => StatusCode::CompressionFailed,
            Self::SizeLimit { .. } => StatusCode::SizeLimit,
            Self::ReadOnly { .. } => StatusCode::ReadOnly,
            Self::NoSuchNode { .. } | Self::NoSuchEntry { .. } => StatusCode::NotFound,
            Self::NameTaken { .. } => StatusCode::AlreadyExists,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
