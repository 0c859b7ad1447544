//! WASAPI capture stream provider.
//!
//! Activates an endpoint's `IAudioClient` in shared mode, loopback for
//! render endpoints, and drains `IAudioCaptureClient` packets together
//! with their QPC timestamps. Only the engine's native 32-bit float mix
//! format is accepted.

use std::slice;

use windows::core::GUID;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audio_tap_core::models::device::{DeviceEntry, DeviceFlow};
use audio_tap_core::models::error::CaptureError;
use audio_tap_core::models::format::{AudioInfo, SampleFormat};
use audio_tap_core::traits::stream_provider::{
    CapturePacket, CaptureStream, NegotiatedStream, StreamProvider,
};

use crate::device_directory::WasapiDevice;
use crate::keep_alive::SilentRenderSink;

/// REFERENCE_TIME units (100 ns) per second.
pub(crate) const REFTIMES_PER_SEC: i64 = 10_000_000;

/// Shared-mode buffering interval requested for capture and keep-alive
/// streams: 20 ms.
pub(crate) const BUFFER_DURATION: i64 = REFTIMES_PER_SEC / 50;

// mmreg.h format tags and the IEEE-float subformat GUID.
const WAVE_FORMAT_IEEE_FLOAT_TAG: u16 = 0x0003;
const WAVE_FORMAT_EXTENSIBLE_TAG: u16 = 0xFFFE;
const IEEE_FLOAT_SUBFORMAT: GUID = GUID::from_u128(0x00000003_0000_0010_8000_00aa00389b71);

/// Capture stream factory for WASAPI endpoints.
pub struct WasapiProvider;

impl StreamProvider for WasapiProvider {
    type Device = WasapiDevice;
    type Stream = WasapiCaptureStream;
    type KeepAlive = SilentRenderSink;

    fn open_capture(
        &self,
        entry: &DeviceEntry<WasapiDevice>,
    ) -> Result<NegotiatedStream<WasapiCaptureStream>, CaptureError> {
        unsafe {
            let client: IAudioClient = entry
                .handle
                .raw()
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| CaptureError::platform("IMMDevice::Activate", e))?;

            let mix_format = MixFormat::get(&client)?;
            let format = mix_format.as_wave_format();
            if !is_float_format(format) {
                return Err(CaptureError::UnsupportedFormat(format!(
                    "format tag {:#06x} is not 32-bit float",
                    format.wFormatTag
                )));
            }

            let channels = format.nChannels;
            let sample_rate = format.nSamplesPerSec;
            let bytes_per_sample = channels as u32 * format.wBitsPerSample as u32 / 8;

            // A render endpoint is captured as the mix being played to it.
            let stream_flags = if entry.flow == DeviceFlow::Output {
                AUDCLNT_STREAMFLAGS_LOOPBACK
            } else {
                0
            };

            client
                .Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    stream_flags,
                    BUFFER_DURATION,
                    0,
                    format,
                    None,
                )
                .map_err(|e| CaptureError::platform("IAudioClient::Initialize", e))?;

            let buffer_frames = client
                .GetBufferSize()
                .map_err(|e| CaptureError::platform("IAudioClient::GetBufferSize", e))?;

            let capture_client: IAudioCaptureClient = client
                .GetService()
                .map_err(|e| CaptureError::platform("IAudioClient::GetService", e))?;

            Ok(NegotiatedStream {
                info: AudioInfo {
                    format: SampleFormat::F32,
                    channels,
                    sample_rate,
                    bytes_per_sample,
                },
                buffer_frames,
                stream: WasapiCaptureStream {
                    client,
                    capture_client,
                    bytes_per_frame: bytes_per_sample as usize,
                },
            })
        }
    }

    fn open_keep_alive(
        &self,
        entry: &DeviceEntry<WasapiDevice>,
    ) -> Result<SilentRenderSink, CaptureError> {
        SilentRenderSink::open(entry.handle.raw())
    }
}

/// A WASAPI capture stream, started and drained from the capture loop
/// thread.
///
/// The loop thread performs no COM initialization of its own; it relies on
/// the process-wide multithreaded apartment held by the caller's
/// [`crate::com::ComGuard`] for the session's lifetime.
pub struct WasapiCaptureStream {
    client: IAudioClient,
    capture_client: IAudioCaptureClient,
    bytes_per_frame: usize,
}

// SAFETY: the COM clients live in the multithreaded apartment; the stream
// moves once onto the capture thread and is only used there afterwards.
unsafe impl Send for WasapiCaptureStream {}

impl CaptureStream for WasapiCaptureStream {
    fn start(&mut self) -> Result<(), CaptureError> {
        unsafe {
            self.client
                .Start()
                .map_err(|e| CaptureError::platform("IAudioClient::Start", e))
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        unsafe {
            self.client
                .Stop()
                .map_err(|e| CaptureError::platform("IAudioClient::Stop", e))
        }
    }

    fn drain(&mut self, sink: &mut dyn FnMut(CapturePacket<'_>)) -> Result<(), CaptureError> {
        unsafe {
            let mut packet_length = self
                .capture_client
                .GetNextPacketSize()
                .map_err(|e| CaptureError::platform("IAudioCaptureClient::GetNextPacketSize", e))?;

            while packet_length > 0 {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;
                let mut qpc_time: u64 = 0;

                self.capture_client
                    .GetBuffer(
                        &mut buffer_ptr,
                        &mut num_frames,
                        &mut flags,
                        None,
                        Some(&mut qpc_time),
                    )
                    .map_err(|e| CaptureError::platform("IAudioCaptureClient::GetBuffer", e))?;

                if num_frames > 0 && !buffer_ptr.is_null() {
                    let bytes = num_frames as usize * self.bytes_per_frame;
                    let data = slice::from_raw_parts(buffer_ptr, bytes);
                    sink(CapturePacket {
                        data,
                        silent: flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0,
                        ticks: qpc_time,
                    });
                }

                self.capture_client
                    .ReleaseBuffer(num_frames)
                    .map_err(|e| CaptureError::platform("IAudioCaptureClient::ReleaseBuffer", e))?;

                packet_length = self.capture_client.GetNextPacketSize().map_err(|e| {
                    CaptureError::platform("IAudioCaptureClient::GetNextPacketSize", e)
                })?;
            }
        }

        Ok(())
    }
}

/// Mix format pointer owned via `CoTaskMemFree`.
struct MixFormat(*mut WAVEFORMATEX);

impl MixFormat {
    unsafe fn get(client: &IAudioClient) -> Result<Self, CaptureError> {
        let ptr = client
            .GetMixFormat()
            .map_err(|e| CaptureError::platform("IAudioClient::GetMixFormat", e))?;
        Ok(Self(ptr))
    }

    unsafe fn as_wave_format(&self) -> &WAVEFORMATEX {
        &*self.0
    }
}

impl Drop for MixFormat {
    fn drop(&mut self) {
        unsafe { CoTaskMemFree(Some(self.0 as *const _ as *const _)) };
    }
}

unsafe fn is_float_format(format: &WAVEFORMATEX) -> bool {
    match format.wFormatTag {
        WAVE_FORMAT_IEEE_FLOAT_TAG => true,
        WAVE_FORMAT_EXTENSIBLE_TAG => {
            let ext = &*(format as *const WAVEFORMATEX as *const WAVEFORMATEXTENSIBLE);
            ext.SubFormat == IEEE_FLOAT_SUBFORMAT
        }
        _ => false,
    }
}
