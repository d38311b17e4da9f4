//! Error taxonomy shared by every pipeline stage.
//!
//! Backends fail in different ways (error codes, null returns, panics). The
//! orchestrator folds all of them into [`ErrorKind`] and reports a single
//! [`PipelineError`] per call, so no failure state outlives the call that
//! produced it.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::Stage;

/// Status code reported for a successful run.
pub const STATUS_SUCCESS: i32 = 0;

/// Failure categories reported by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum ErrorKind {
    /// Input could not be opened, was empty, or is not a recognized container.
    #[error("open failure")]
    OpenFailure,
    /// RAW sensor data could not be unpacked or demosaiced.
    #[error("unpack failure")]
    UnpackFailure,
    /// JPEG codec or raster decoder rejected the input.
    #[error("decode failure")]
    DecodeFailure,
    /// JPEG compression failed or produced an invalid stream.
    #[error("encode failure")]
    EncodeFailure,
    /// Output could not be written or exceeds the size ceiling.
    #[error("write failure")]
    WriteFailure,
    /// Decoded image has a channel count or bit depth the pipeline cannot carry.
    #[error("unsupported format")]
    UnsupportedFormat,
    /// Anything unexpected, including panics raised inside a backend.
    #[error("unknown failure")]
    UnknownFailure,
}

impl ErrorKind {
    /// Stable numeric status code for this kind.
    pub fn status_code(self) -> i32 {
        match self {
            ErrorKind::OpenFailure => 1,
            ErrorKind::UnpackFailure => 2,
            ErrorKind::DecodeFailure => 3,
            ErrorKind::WriteFailure => 4,
            ErrorKind::UnknownFailure => 5,
            ErrorKind::EncodeFailure => 6,
            ErrorKind::UnsupportedFormat => 7,
        }
    }
}

/// Failure of a single pipeline run.
///
/// `stage` is the last state the run reached before failing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} after {stage}: {message}")]
pub struct PipelineError {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

impl PipelineError {
    pub fn new(stage: Stage, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    /// Numeric status code for this failure.
    pub fn status_code(&self) -> i32 {
        self.kind.status_code()
    }
}

/// Failure reported by one of the external backends.
///
/// Backends only describe what went wrong; the orchestrator decides which
/// [`ErrorKind`] it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

/// Result alias for backend calls.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Result alias for pipeline runs.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Run a backend call, mapping both its error and any panic into the taxonomy.
///
/// Errors become `kind`; panics become [`ErrorKind::UnknownFailure`].
pub(crate) fn guarded<T, F>(stage: Stage, kind: ErrorKind, context: &str, call: F) -> Result<T>
where
    F: FnOnce() -> BackendResult<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(PipelineError::new(stage, kind, format!("{context}: {err}"))),
        Err(payload) => Err(PipelineError::new(
            stage,
            ErrorKind::UnknownFailure,
            format!("{context}: backend panicked: {}", PanicMessage(&*payload)),
        )),
    }
}

struct PanicMessage<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<&str>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else {
            f.write_str("non-string panic payload")
        }
    }
}
