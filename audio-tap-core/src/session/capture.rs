//! Capture session orchestration.
//!
//! Owns the whole capture lifecycle: endpoint selection, format
//! negotiation, ring sizing, keep-alive sink and capture loop. The
//! consumer surface (`read`, `jump_to_time`, `flush`, `info`) stays valid
//! for the lifetime of the `Running` state.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::CaptureConfig;
use crate::models::device::{DeviceDirectory, DeviceFlow};
use crate::models::error::CaptureError;
use crate::models::format::AudioInfo;
use crate::models::state::CaptureState;
use crate::processing::ring_buffer::RingBuffer;
use crate::session::capture_loop::{self, CaptureLoopHandle};
use crate::traits::keep_alive::KeepAliveSink;
use crate::traits::stream_provider::StreamProvider;

/// A running capture of one audio endpoint.
///
/// Construction performs the whole negotiation (device activation, float
/// format validation, ring sizing) and leaves the session `Running`;
/// `stop` or `Drop` tears everything down in producer-first order. There
/// is no pause/resume.
///
/// The session is the single producer's owner; the caller is the single
/// consumer. Consumer calls may come from any thread as long as they are
/// not concurrent with each other.
pub struct CaptureSession<P: StreamProvider> {
    info: AudioInfo,
    state: CaptureState,
    ring: Arc<Mutex<RingBuffer>>,
    capture_loop: Option<CaptureLoopHandle>,
    keep_alive: Option<P::KeepAlive>,
}

impl<P: StreamProvider> std::fmt::Debug for CaptureSession<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("info", &self.info)
            .field("state", &self.state)
            .field("running", &self.capture_loop.is_some())
            .field("has_keep_alive", &self.keep_alive.is_some())
            .finish()
    }
}

impl<P: StreamProvider> CaptureSession<P> {
    /// Negotiate the selected endpoint and start capturing into a ring
    /// holding one second of audio.
    ///
    /// Output endpoints are captured in loopback mode, which also opens a
    /// silent keep-alive stream on the device before the capture stream.
    /// Any platform failure here is fatal; nothing is retried.
    pub fn start(
        provider: &P,
        directory: &DeviceDirectory<P::Device>,
        config: &CaptureConfig,
    ) -> Result<Self, CaptureError> {
        let entry = directory
            .get(config.device_index)
            .ok_or(CaptureError::DeviceIndexOutOfRange(config.device_index))?;

        // Loopback only works while the engine's graph is held open.
        let keep_alive = if entry.flow == DeviceFlow::Output {
            Some(provider.open_keep_alive(entry)?)
        } else {
            None
        };

        let negotiated = provider.open_capture(entry)?;
        let info = negotiated.info;
        log::debug!(
            "negotiated {} ch @ {} Hz, {} bytes/frame, {} frame device buffer",
            info.channels,
            info.sample_rate,
            info.bytes_per_sample,
            negotiated.buffer_frames
        );

        let ring = Arc::new(Mutex::new(RingBuffer::new(
            info.sample_rate,
            info.bytes_per_sample,
        )));

        // Wake at half the device's buffering interval so a full buffer
        // can never slip past between two drains.
        let buffer_ms = 1_000u64 * negotiated.buffer_frames as u64 / info.sample_rate as u64;
        let wake = Duration::from_millis((buffer_ms / 2).max(1));
        let capture_loop = capture_loop::spawn(negotiated.stream, Arc::clone(&ring), wake)?;

        Ok(Self {
            info,
            state: CaptureState::Running,
            ring,
            capture_loop: Some(capture_loop),
            keep_alive,
        })
    }

    /// Negotiated stream format.
    pub fn info(&self) -> AudioInfo {
        self.info
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Copy out up to `dest.len()` captured bytes.
    ///
    /// Returns the bytes actually written and the absolute timestamp of
    /// the first one. Never blocks and never returns more than is
    /// currently buffered.
    pub fn read(&self, dest: &mut [u8]) -> (usize, f64) {
        self.ring.lock().read(dest)
    }

    /// Seek the consumer position to `target` seconds, clamped into the
    /// currently retained window.
    pub fn jump_to_time(&self, target: f64) {
        self.ring.lock().jump_to_time(target);
    }

    /// Discard all buffered, unread data.
    pub fn flush(&self) {
        self.ring.lock().flush();
    }

    /// Stop capturing. Idempotent.
    ///
    /// Order matters: the capture loop is signalled and joined first (it
    /// stops the stream on its way out), then the keep-alive sink is
    /// released.
    pub fn stop(&mut self) {
        if self.state.is_stopped() {
            return;
        }
        if let Some(mut handle) = self.capture_loop.take() {
            handle.stop();
        }
        if let Some(mut sink) = self.keep_alive.take() {
            if let Err(e) = sink.stop() {
                log::warn!("failed to stop keep-alive sink: {}", e);
            }
        }
        self.state = CaptureState::Stopped;
    }
}

impl<P: StreamProvider> Drop for CaptureSession<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device::DeviceEntry;
    use crate::models::format::SampleFormat;
    use crate::traits::stream_provider::{
        CapturePacket, CaptureStream, NegotiatedStream, TICKS_PER_SECOND,
    };
    use std::collections::VecDeque;
    use std::thread;
    use std::time::Instant;

    #[derive(Default)]
    struct World {
        events: Vec<&'static str>,
        packets: VecDeque<(Vec<u8>, bool, u64)>,
        fail_open: bool,
    }

    struct FakeStream(Arc<Mutex<World>>);

    impl CaptureStream for FakeStream {
        fn start(&mut self) -> Result<(), CaptureError> {
            self.0.lock().events.push("stream_start");
            Ok(())
        }

        fn stop(&mut self) -> Result<(), CaptureError> {
            self.0.lock().events.push("stream_stop");
            Ok(())
        }

        fn drain(&mut self, sink: &mut dyn FnMut(CapturePacket<'_>)) -> Result<(), CaptureError> {
            let mut world = self.0.lock();
            while let Some((data, silent, ticks)) = world.packets.pop_front() {
                sink(CapturePacket {
                    data: &data,
                    silent,
                    ticks,
                });
            }
            Ok(())
        }
    }

    struct FakeKeepAlive(Arc<Mutex<World>>);

    impl KeepAliveSink for FakeKeepAlive {
        fn stop(&mut self) -> Result<(), CaptureError> {
            self.0.lock().events.push("keep_alive_stop");
            Ok(())
        }
    }

    struct FakeProvider {
        world: Arc<Mutex<World>>,
    }

    impl StreamProvider for FakeProvider {
        type Device = ();
        type Stream = FakeStream;
        type KeepAlive = FakeKeepAlive;

        fn open_capture(
            &self,
            _entry: &DeviceEntry<()>,
        ) -> Result<NegotiatedStream<FakeStream>, CaptureError> {
            {
                let mut world = self.world.lock();
                world.events.push("open_capture");
                if world.fail_open {
                    return Err(CaptureError::UnsupportedFormat("16-bit PCM".into()));
                }
            }
            Ok(NegotiatedStream {
                info: AudioInfo {
                    format: SampleFormat::F32,
                    channels: 1,
                    sample_rate: 8_000,
                    bytes_per_sample: 4,
                },
                buffer_frames: 80, // 10 ms device buffer, 5 ms wake
                stream: FakeStream(Arc::clone(&self.world)),
            })
        }

        fn open_keep_alive(
            &self,
            _entry: &DeviceEntry<()>,
        ) -> Result<FakeKeepAlive, CaptureError> {
            self.world.lock().events.push("open_keep_alive");
            Ok(FakeKeepAlive(Arc::clone(&self.world)))
        }
    }

    fn directory() -> DeviceDirectory<()> {
        DeviceDirectory::new(vec![
            DeviceEntry {
                handle: (),
                flow: DeviceFlow::Output,
                is_default: true,
                name: "Default output (System Sound)".into(),
            },
            DeviceEntry {
                handle: (),
                flow: DeviceFlow::Input,
                is_default: true,
                name: "Default input (Microphone)".into(),
            },
        ])
    }

    fn provider() -> (FakeProvider, Arc<Mutex<World>>) {
        let world = Arc::new(Mutex::new(World::default()));
        (
            FakeProvider {
                world: Arc::clone(&world),
            },
            world,
        )
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn loopback_session_orders_keep_alive_around_the_stream() {
        let (provider, world) = provider();
        let mut session =
            CaptureSession::start(&provider, &directory(), &CaptureConfig { device_index: 0 })
                .unwrap();
        assert!(session.state().is_running());

        wait_until(|| world.lock().events.contains(&"stream_start"));
        session.stop();
        assert!(session.state().is_stopped());

        let events = world.lock().events.clone();
        let pos = |name| events.iter().position(|e| *e == name).unwrap();
        assert!(pos("open_keep_alive") < pos("open_capture"));
        assert!(pos("stream_stop") < pos("keep_alive_stop"));
    }

    #[test]
    fn direct_capture_skips_the_keep_alive_sink() {
        let (provider, world) = provider();
        let mut session =
            CaptureSession::start(&provider, &directory(), &CaptureConfig { device_index: 1 })
                .unwrap();
        session.stop();

        let events = world.lock().events.clone();
        assert!(!events.contains(&"open_keep_alive"));
        assert!(!events.contains(&"keep_alive_stop"));
        assert!(events.contains(&"stream_stop"));
    }

    #[test]
    fn read_returns_captured_bytes_with_timestamps() {
        let (provider, world) = provider();
        world
            .lock()
            .packets
            .push_back((vec![1, 2, 3, 4], false, TICKS_PER_SECOND));

        let session =
            CaptureSession::start(&provider, &directory(), &CaptureConfig { device_index: 1 })
                .unwrap();
        assert_eq!(session.info().sample_rate, 8_000);
        assert_eq!(session.info().format, SampleFormat::F32);

        let mut dest = [0u8; 16];
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let (n, time) = session.read(&mut dest);
            if n > 0 {
                assert_eq!(n, 4);
                assert_eq!(&dest[..n], &[1, 2, 3, 4]);
                assert!((time - 1.0).abs() < 1e-9);
                break;
            }
            assert!(Instant::now() < deadline, "no data reached the session");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn flush_discards_everything_buffered() {
        let (provider, world) = provider();
        world.lock().packets.push_back((vec![7; 64], false, 0));

        let session =
            CaptureSession::start(&provider, &directory(), &CaptureConfig { device_index: 1 })
                .unwrap();

        let mut dest = [0u8; 8];
        wait_until(|| {
            session.flush();
            let (n, _) = session.read(&mut dest);
            n == 0
        });
    }

    #[test]
    fn invalid_device_index_is_rejected() {
        let (provider, _world) = provider();
        let err =
            CaptureSession::start(&provider, &directory(), &CaptureConfig { device_index: 5 })
                .unwrap_err();
        assert_eq!(err, CaptureError::DeviceIndexOutOfRange(5));
    }

    #[test]
    fn non_float_negotiation_aborts_the_session() {
        let (provider, world) = provider();
        world.lock().fail_open = true;

        let err =
            CaptureSession::start(&provider, &directory(), &CaptureConfig { device_index: 0 })
                .unwrap_err();
        assert!(matches!(err, CaptureError::UnsupportedFormat(_)));
    }

    #[test]
    fn stop_is_idempotent() {
        let (provider, world) = provider();
        let mut session =
            CaptureSession::start(&provider, &directory(), &CaptureConfig { device_index: 0 })
                .unwrap();
        session.stop();
        session.stop();
        drop(session);

        let events = world.lock().events.clone();
        assert_eq!(events.iter().filter(|e| **e == "stream_stop").count(), 1);
        assert_eq!(
            events.iter().filter(|e| **e == "keep_alive_stop").count(),
            1
        );
    }
}
