//! # audio-tap-windows
//!
//! Windows WASAPI backend for audio-tap.
//!
//! Provides:
//! - `WasapiProvider` — capture streams via `IAudioCaptureClient`, loopback
//!   for render endpoints, direct for capture endpoints
//! - `SilentRenderSink` — keep-alive render stream for loopback sessions
//! - `enumerate_devices` — endpoint directory via the MMDevice API
//! - `com` — MTA initialization guard for caller threads
//!
//! ## Usage
//! ```ignore
//! use audio_tap_core::{CaptureConfig, CaptureSession};
//! use audio_tap_windows::{com, enumerate_devices, WasapiProvider};
//!
//! let _com = com::initialize_mta()?;
//! let directory = enumerate_devices()?;
//! let session =
//!     CaptureSession::start(&WasapiProvider, &directory, &CaptureConfig::default())?;
//! ```

#[cfg(target_os = "windows")]
pub mod com;
#[cfg(target_os = "windows")]
pub mod device_directory;
#[cfg(target_os = "windows")]
pub mod keep_alive;
#[cfg(target_os = "windows")]
pub mod provider;

#[cfg(target_os = "windows")]
pub use device_directory::{enumerate_devices, WasapiDevice};
#[cfg(target_os = "windows")]
pub use keep_alive::SilentRenderSink;
#[cfg(target_os = "windows")]
pub use provider::{WasapiCaptureStream, WasapiProvider};
