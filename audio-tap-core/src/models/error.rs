use thiserror::Error;

/// Errors that can occur while establishing or running a capture session.
///
/// Platform subsystem failures are fatal for the session that hit them:
/// there is no retry or degraded mode. The failing call and the platform
/// error text are preserved for the report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device not available")]
    DeviceNotAvailable,

    #[error("no audio device at index {0}")]
    DeviceIndexOutOfRange(usize),

    #[error("unsupported mix format: {0}")]
    UnsupportedFormat(String),

    #[error("{call} failed: {detail}")]
    Platform { call: &'static str, detail: String },

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Wrap a failed platform call together with its error text.
    pub fn platform(call: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Platform {
            call,
            detail: error.to_string(),
        }
    }
}
