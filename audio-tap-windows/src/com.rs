//! COM lifetime helpers for caller threads.

use windows::Win32::System::Com::*;

use audio_tap_core::models::error::CaptureError;

/// RAII guard for a thread's COM initialization.
pub struct ComGuard(());

/// Join the multithreaded apartment on the calling thread.
///
/// Device enumeration and session construction require COM. Hold the
/// returned guard for as long as directory entries or sessions created on
/// this thread are alive.
pub fn initialize_mta() -> Result<ComGuard, CaptureError> {
    unsafe {
        CoInitializeEx(None, COINIT_MULTITHREADED)
            .ok()
            .map_err(|e| CaptureError::platform("CoInitializeEx", e))?;
    }
    Ok(ComGuard(()))
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}
