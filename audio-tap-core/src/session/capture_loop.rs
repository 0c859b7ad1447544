//! Producer-side periodic drain of the hardware capture path.
//!
//! A dedicated thread wakes at half the device's internal buffering
//! interval and moves every queued packet into the ring. Cancellation is
//! cooperative: the wait on the stop channel either times out (a tick) or
//! returns the stop signal. The loop never blocks on the consumer.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::stream_provider::{CaptureStream, TICKS_PER_SECOND};

/// Handle used by the session to cancel the loop and join its thread.
pub(crate) struct CaptureLoopHandle {
    stop_tx: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl CaptureLoopHandle {
    /// Signal the loop to stop and wait for the thread to finish.
    ///
    /// The loop stops its stream before exiting, so after this returns the
    /// capture path is fully quiescent.
    pub(crate) fn stop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawn the capture loop for `stream`, waking every `wake` interval.
///
/// The stream is started on the loop thread before the first tick and
/// stopped there once the loop exits, keeping platform state confined to
/// its producer thread. A platform failure inside the loop is fatal for
/// the stream: it is logged and ends the loop.
pub(crate) fn spawn<S>(
    mut stream: S,
    ring: Arc<Mutex<RingBuffer>>,
    wake: Duration,
) -> Result<CaptureLoopHandle, CaptureError>
where
    S: CaptureStream + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel();

    let join = thread::Builder::new()
        .name("audio-capture".into())
        .spawn(move || {
            if let Err(e) = stream.start() {
                log::error!("failed to start capture stream: {}", e);
                return;
            }
            run(&mut stream, &ring, &stop_rx, wake);
            if let Err(e) = stream.stop() {
                log::warn!("failed to stop capture stream: {}", e);
            }
        })
        .map_err(|e| CaptureError::Unknown(format!("failed to spawn capture thread: {}", e)))?;

    Ok(CaptureLoopHandle {
        stop_tx,
        join: Some(join),
    })
}

fn run<S: CaptureStream>(
    stream: &mut S,
    ring: &Mutex<RingBuffer>,
    stop_rx: &Receiver<()>,
    wake: Duration,
) {
    loop {
        match stop_rx.recv_timeout(wake) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let drained = stream.drain(&mut |packet| {
            let time = packet.ticks as f64 / TICKS_PER_SECOND as f64;
            let mut ring = ring.lock();
            if packet.silent {
                ring.append_silence(packet.data.len(), time);
            } else {
                ring.append(packet.data, time);
            }
        });

        if let Err(e) = drained {
            log::error!("capture stream failed: {}", e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::stream_provider::CapturePacket;
    use std::collections::VecDeque;
    use std::time::Instant;

    #[derive(Default)]
    struct Script {
        packets: VecDeque<(Vec<u8>, bool, u64)>,
        started: bool,
        stopped: bool,
        fail_drain: bool,
    }

    struct FakeStream(Arc<Mutex<Script>>);

    impl CaptureStream for FakeStream {
        fn start(&mut self) -> Result<(), CaptureError> {
            self.0.lock().started = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), CaptureError> {
            self.0.lock().stopped = true;
            Ok(())
        }

        fn drain(&mut self, sink: &mut dyn FnMut(CapturePacket<'_>)) -> Result<(), CaptureError> {
            let mut script = self.0.lock();
            if script.fail_drain {
                return Err(CaptureError::Unknown("drain failure".into()));
            }
            while let Some((data, silent, ticks)) = script.packets.pop_front() {
                sink(CapturePacket {
                    data: &data,
                    silent,
                    ticks,
                });
            }
            Ok(())
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn test_ring() -> Arc<Mutex<RingBuffer>> {
        Arc::new(Mutex::new(RingBuffer::with_capacity(64, 8, 1)))
    }

    #[test]
    fn packets_reach_the_ring_with_converted_timestamps() {
        let script = Arc::new(Mutex::new(Script::default()));
        script
            .lock()
            .packets
            .push_back((vec![1, 2, 3, 4], false, 2 * TICKS_PER_SECOND));

        let ring = test_ring();
        let mut handle = spawn(
            FakeStream(Arc::clone(&script)),
            Arc::clone(&ring),
            Duration::from_millis(2),
        )
        .unwrap();

        wait_until(|| ring.lock().buffered() == 4);
        let mut dest = [0u8; 8];
        let (n, time) = ring.lock().read(&mut dest);
        assert_eq!(n, 4);
        assert_eq!(&dest[..n], &[1, 2, 3, 4]);
        assert!((time - 2.0).abs() < 1e-9);

        handle.stop();
        assert!(script.lock().started);
        assert!(script.lock().stopped);
    }

    #[test]
    fn silent_packets_are_zero_filled() {
        let script = Arc::new(Mutex::new(Script::default()));
        script
            .lock()
            .packets
            .push_back((vec![9, 9, 9, 9, 9, 9], true, 0));

        let ring = test_ring();
        let mut handle = spawn(
            FakeStream(Arc::clone(&script)),
            Arc::clone(&ring),
            Duration::from_millis(2),
        )
        .unwrap();

        wait_until(|| ring.lock().buffered() == 6);
        let mut dest = [0xffu8; 8];
        let (n, _) = ring.lock().read(&mut dest);
        assert_eq!(&dest[..n], &[0; 6]);

        handle.stop();
    }

    #[test]
    fn stop_joins_and_stops_the_stream() {
        let script = Arc::new(Mutex::new(Script::default()));
        let mut handle = spawn(
            FakeStream(Arc::clone(&script)),
            test_ring(),
            Duration::from_millis(2),
        )
        .unwrap();

        handle.stop();
        assert!(script.lock().stopped);
    }

    #[test]
    fn drain_failure_ends_the_loop() {
        let script = Arc::new(Mutex::new(Script {
            fail_drain: true,
            ..Script::default()
        }));
        let _handle = spawn(
            FakeStream(Arc::clone(&script)),
            test_ring(),
            Duration::from_millis(2),
        )
        .unwrap();

        // The loop breaks on the failed drain and still stops the stream.
        wait_until(|| script.lock().stopped);
    }

    #[test]
    fn queued_packets_drain_in_one_wake() {
        let script = Arc::new(Mutex::new(Script::default()));
        {
            let mut s = script.lock();
            for i in 0..4u8 {
                s.packets
                    .push_back((vec![i; 4], false, i as u64 * TICKS_PER_SECOND / 2));
            }
        }

        let ring = test_ring();
        let mut handle = spawn(
            FakeStream(Arc::clone(&script)),
            Arc::clone(&ring),
            Duration::from_millis(2),
        )
        .unwrap();

        wait_until(|| ring.lock().buffered() == 16);
        assert!(script.lock().packets.is_empty());
        handle.stop();
    }
}
