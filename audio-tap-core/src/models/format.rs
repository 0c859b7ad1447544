use serde::{Deserialize, Serialize};

/// Sample encoding of a capture stream.
///
/// Shared-mode engines mix in 32-bit float; that is the only encoding the
/// capture core negotiates. A device whose native mix format is anything
/// else fails session construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    F32,
}

/// Negotiated stream format, valid once a session reaches `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub format: SampleFormat,
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bytes per interleaved sample frame: `channels * 4`.
    pub bytes_per_sample: u32,
}
