//! Silent render stream holding a shared-mode engine's graph open.
//!
//! Shared-mode engines may suspend their processing graph, and with it
//! loopback packet delivery, when nothing is rendering to the device. For
//! loopback sessions this sink opens a secondary render stream on the same
//! endpoint, primes one buffer of silence and starts playback before the
//! capture stream starts.

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audio_tap_core::models::error::CaptureError;
use audio_tap_core::traits::keep_alive::KeepAliveSink;

use crate::provider::BUFFER_DURATION;

/// Keep-alive render stream for one loopback session.
pub struct SilentRenderSink {
    client: IAudioClient,
    stopped: bool,
}

// SAFETY: the COM client lives in the multithreaded apartment; the sink
// stays with its owning session and is never used concurrently.
unsafe impl Send for SilentRenderSink {}

impl SilentRenderSink {
    /// Open a render stream on `device`, prime one buffer of silence and
    /// start playback.
    pub(crate) fn open(device: &IMMDevice) -> Result<Self, CaptureError> {
        unsafe {
            let client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| CaptureError::platform("IMMDevice::Activate", e))?;

            let format_ptr = client
                .GetMixFormat()
                .map_err(|e| CaptureError::platform("IAudioClient::GetMixFormat", e))?;
            let result = prime_and_start(&client, &*format_ptr);
            CoTaskMemFree(Some(format_ptr as *const _ as *const _));
            result?;

            Ok(Self {
                client,
                stopped: false,
            })
        }
    }
}

unsafe fn prime_and_start(
    client: &IAudioClient,
    format: &WAVEFORMATEX,
) -> Result<(), CaptureError> {
    client
        .Initialize(AUDCLNT_SHAREMODE_SHARED, 0, BUFFER_DURATION, 0, format, None)
        .map_err(|e| CaptureError::platform("IAudioClient::Initialize", e))?;

    let buffer_frames = client
        .GetBufferSize()
        .map_err(|e| CaptureError::platform("IAudioClient::GetBufferSize", e))?;

    let render_client: IAudioRenderClient = client
        .GetService()
        .map_err(|e| CaptureError::platform("IAudioClient::GetService", e))?;

    let buffer = render_client
        .GetBuffer(buffer_frames)
        .map_err(|e| CaptureError::platform("IAudioRenderClient::GetBuffer", e))?;
    std::ptr::write_bytes(buffer, 0, buffer_frames as usize * format.nBlockAlign as usize);
    render_client
        .ReleaseBuffer(buffer_frames, 0)
        .map_err(|e| CaptureError::platform("IAudioRenderClient::ReleaseBuffer", e))?;

    client
        .Start()
        .map_err(|e| CaptureError::platform("IAudioClient::Start", e))
}

impl KeepAliveSink for SilentRenderSink {
    fn stop(&mut self) -> Result<(), CaptureError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        unsafe { self.client.Stop() }
            .map_err(|e| CaptureError::platform("IAudioClient::Stop", e))
    }
}

impl Drop for SilentRenderSink {
    fn drop(&mut self) {
        if !self.stopped {
            if let Err(e) = unsafe { self.client.Stop() } {
                log::warn!("failed to stop keep-alive stream: {}", e);
            }
        }
    }
}
