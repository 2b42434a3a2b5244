//! Ошибки save/load движков.
//!
//! `EncodeError` прерывает текущий вызов save, а `DecodeError` прерывает текущий вызов
//! load. Обе несут путь узла в контейнере, на котором произошёл сбой.

use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    #[error("Unsupported value at {path}: {reason}")]
    UnsupportedValue { path: String, reason: String },

    #[error("Field name '{name}' at {path} is reserved (names starting with '__' are internal)")]
    ReservedName { name: String, path: String },

    #[error("Object of type '{type_name}' at {path} is not registered")]
    UnregisteredType { type_name: String, path: String },

    #[error("Field '{name}' at {path} collides with an existing entry")]
    NameCollision { name: String, path: String },

    #[error("Maximum nesting depth {limit} exceeded at {path}")]
    DepthLimit { limit: usize, path: String },
}

#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("Unknown type tag '{tag}' at {path}")]
    UnknownType { tag: String, path: String },

    #[error("Dangling reference to node #{target} at {path}")]
    DanglingReference { target: u32, path: String },

    #[error("Type tag at {path} is not a valid UTF-8 string")]
    InvalidTypeTag { path: String },

    #[error("Cannot set field '{field}' of '{tag}' at {path}: {reason}")]
    Field {
        tag: String,
        field: String,
        path: String,
        reason: String,
    },

    #[error("Inconsistent node at {path}: {reason}")]
    Inconsistent { path: String, reason: String },

    #[error("Maximum nesting depth {limit} exceeded at {path}")]
    DepthLimit { limit: usize, path: String },

    #[error("Missing entry '{name}' at {path}")]
    MissingEntry { name: String, path: String },
}

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Type tag '{tag}' is already registered for {existing}")]
    DuplicateTag { tag: String, existing: String },

    #[error("Type {type_name} is already registered under tag '{existing}'")]
    DuplicateType { type_name: String, existing: String },

    #[error("Type '{tag}' declares field '{field}' more than once")]
    DuplicateField { tag: String, field: String },

    #[error("Type '{tag}' declares field '{field}' with a reserved or empty name")]
    ReservedField { tag: String, field: String },
}

impl ErrorExt for EncodeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ReservedName { .. } => StatusCode::ReservedName,
            Self::DepthLimit { .. } => StatusCode::DepthLimit,
            Self::NameCollision { .. } => StatusCode::AlreadyExists,
            _ => StatusCode::EncodingError,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for DecodeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownType { .. } => StatusCode::UnknownType,
            Self::DanglingReference { .. } => StatusCode::DanglingReference,
            Self::DepthLimit { .. } => StatusCode::DepthLimit,
            _ => StatusCode::DecodingError,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ErrorExt for RegistryError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ReservedField { .. } => StatusCode::ReservedName,
            _ => StatusCode::AlreadyExists,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_names_tag() {
        let err = DecodeError::UnknownType {
            tag: "SimpleSpikeSorter".into(),
            path: "/sorter".into(),
        };
        assert_eq!(err.status_code(), StatusCode::UnknownType);
        assert!(err.to_string().contains("'SimpleSpikeSorter'"));
        assert!(err.to_string().contains("/sorter"));
    }

    #[test]
    fn test_codec_status_codes() {
        let enc = EncodeError::ReservedName {
            name: "__x".into(),
            path: "/".into(),
        };
        assert_eq!(enc.status_code(), StatusCode::ReservedName);

        let dec = DecodeError::Inconsistent {
            path: "/a".into(),
            reason: "reference list length mismatch".into(),
        };
        assert_eq!(dec.status_code(), StatusCode::DecodingError);
        assert!(dec.status_code().is_codec_error());
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::DuplicateTag {
            tag: "Unit".into(),
            existing: "app::Unit".into(),
        };
        assert!(err.to_string().contains("app::Unit"));
        assert_eq!(err.status_code(), StatusCode::AlreadyExists);
    }
}
