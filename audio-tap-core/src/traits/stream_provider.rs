use crate::models::device::DeviceEntry;
use crate::models::error::CaptureError;
use crate::models::format::AudioInfo;
use crate::traits::keep_alive::KeepAliveSink;

/// Hardware packet timestamps are expressed in 100-nanosecond ticks of the
/// platform's performance clock.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// One packet drained from the hardware capture path.
pub struct CapturePacket<'a> {
    /// Interleaved sample bytes. Contents are undefined when `silent` is
    /// set; only the length is meaningful then.
    pub data: &'a [u8],
    /// The hardware reported this span as silence instead of delivering
    /// real samples.
    pub silent: bool,
    /// Capture-time position of the packet, in `TICKS_PER_SECOND` units.
    pub ticks: u64,
}

/// A capture stream opened on one endpoint, with its negotiated format and
/// the device-side buffer length the wake interval is derived from.
pub struct NegotiatedStream<S> {
    pub info: AudioInfo,
    /// Device-side buffer length in sample frames.
    pub buffer_frames: u32,
    pub stream: S,
}

/// Platform capture stream, driven by the capture loop on its own thread.
///
/// `start` and `stop` are invoked on the loop thread, so an implementation
/// may keep thread-affine platform state from `start` onwards.
pub trait CaptureStream: Send {
    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Visit every packet currently queued on the capture path.
    ///
    /// Packets may pile up between wakes; implementations hand each one to
    /// `sink` in arrival order and release it before fetching the next.
    fn drain(&mut self, sink: &mut dyn FnMut(CapturePacket<'_>)) -> Result<(), CaptureError>;
}

/// Factory for platform capture streams and keep-alive sinks.
///
/// Exactly one production implementation exists per target platform; tests
/// substitute scripted fakes.
pub trait StreamProvider {
    /// Platform device handle stored in directory entries.
    type Device;
    type Stream: CaptureStream + 'static;
    type KeepAlive: KeepAliveSink;

    /// Activate the endpoint and negotiate its native mix format.
    ///
    /// Fails with `CaptureError::UnsupportedFormat` when the native format
    /// is not 32-bit float; any platform failure is fatal for the session.
    fn open_capture(
        &self,
        entry: &DeviceEntry<Self::Device>,
    ) -> Result<NegotiatedStream<Self::Stream>, CaptureError>;

    /// Open a silent render stream on the endpoint to keep a shared-mode
    /// engine's clock running while its output is captured in loopback.
    fn open_keep_alive(
        &self,
        entry: &DeviceEntry<Self::Device>,
    ) -> Result<Self::KeepAlive, CaptureError>;
}
