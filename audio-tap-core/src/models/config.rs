use serde::{Deserialize, Serialize};

/// Configuration for a capture session.
///
/// The selected index refers to a `DeviceDirectory` built by the platform
/// backend; supplying a valid index is a caller precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Index into the device directory of the endpoint to capture.
    pub device_index: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { device_index: 0 }
    }
}
