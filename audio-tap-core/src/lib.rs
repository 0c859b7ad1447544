//! # audio-tap-core
//!
//! Platform-agnostic audio capture core library.
//!
//! Turns the irregular packet cadence of a hardware capture path into a
//! continuous, time-stamped byte stream that a consumer (typically a media
//! encoder) pulls at its own pace, with seeking into recent history.
//! Platform backends (Windows WASAPI) implement the `StreamProvider`
//! trait and plug into the generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! audio-tap-core (this crate)
//! ├── traits/       ← StreamProvider, CaptureStream, KeepAliveSink
//! ├── models/       ← CaptureError, CaptureConfig, CaptureState, AudioInfo,
//! │                   DeviceDirectory
//! ├── processing/   ← RingBuffer (byte ring with a time anchor)
//! └── session/      ← CaptureSession orchestrator + capture loop
//! ```
//!
//! Data flows one way: hardware → capture loop → ring → caller via
//! `read`/`jump_to_time`/`flush`. Control flows the other way: the caller
//! constructs and destroys the session, which drives the loop and the
//! keep-alive sink.

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::CaptureConfig;
pub use models::device::{DeviceDirectory, DeviceEntry, DeviceFlow};
pub use models::error::CaptureError;
pub use models::format::{AudioInfo, SampleFormat};
pub use models::state::CaptureState;
pub use processing::ring_buffer::RingBuffer;
pub use session::capture::CaptureSession;
pub use traits::keep_alive::KeepAliveSink;
pub use traits::stream_provider::{
    CapturePacket, CaptureStream, NegotiatedStream, StreamProvider, TICKS_PER_SECOND,
};
