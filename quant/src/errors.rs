use std::fmt;
use std::path::{Path, PathBuf};

use tract_core::prelude::*;

/// Failure kinds surfaced by qrun tools.
///
/// They travel inside `anyhow::Error` like every other tract error, and can
/// be recovered with `err.downcast_ref::<QrunError>()`.
#[derive(Clone, Debug, PartialEq)]
pub enum QrunError {
    FileNotFound(PathBuf),
    ParseError(String),
    UnsupportedFormat(String),
    UnsupportedDType(DatumType),
    /// Provided data does not fit a model input. Raw values report their
    /// count as a rank 1 shape.
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    MissingShape(String),
    DelegateUnavailable(String),
}

impl fmt::Display for QrunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QrunError::FileNotFound(p) => write!(f, "File not found: {}", p.display()),
            QrunError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            QrunError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {msg}"),
            QrunError::UnsupportedDType(dt) => write!(f, "Unsupported datum type: {dt:?}"),
            QrunError::ShapeMismatch { expected, got } => {
                write!(f, "Shape mismatch: expected {expected:?}, got {got:?}")
            }
            QrunError::MissingShape(what) => write!(f, "Missing tensor shape: {what}"),
            QrunError::DelegateUnavailable(name) => write!(f, "Delegate unavailable: {name}"),
        }
    }
}

impl std::error::Error for QrunError {}

/// Fails with `FileNotFound` unless `path` points to an existing file.
pub fn ensure_file_exists(path: impl AsRef<Path>) -> TractResult<()> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(QrunError::FileNotFound(path.to_path_buf()).into());
    }
    Ok(())
}

/// Extracts the qrun failure kind from an error chain, if any.
pub fn kind_of(err: &anyhow::Error) -> Option<&QrunError> {
    err.downcast_ref::<QrunError>().or_else(|| err.chain().find_map(|e| e.downcast_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn missing_file_is_reported() {
        let err = ensure_file_exists("/definitely/not/here.tflite").unwrap_err();
        assert_eq!(
            kind_of(&err),
            Some(&QrunError::FileNotFound(PathBuf::from("/definitely/not/here.tflite")))
        );
    }

    #[test]
    fn kind_survives_context() {
        let err: anyhow::Error = Err::<(), _>(QrunError::UnsupportedDType(DatumType::I64))
            .context("quantizing input")
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(&QrunError::UnsupportedDType(DatumType::I64)));
        assert_eq!(err.root_cause().to_string(), "Unsupported datum type: I64");
    }

    #[test]
    fn shape_mismatch_shows_shapes() {
        let err = QrunError::ShapeMismatch { expected: vec![1, 2, 2, 3], got: vec![1, 3, 2, 2] };
        assert_eq!(err.to_string(), "Shape mismatch: expected [1, 2, 2, 3], got [1, 3, 2, 2]");
    }
}
