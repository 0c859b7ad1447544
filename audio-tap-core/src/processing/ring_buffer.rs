//! Circular byte store with a time anchor.
//!
//! Decouples the irregular delivery cadence of the hardware capture path
//! from a consumer that pulls at its own pace and may seek back into
//! recent history. Wrap in `Arc<parking_lot::Mutex<RingBuffer>>` for
//! cross-thread access; all cursor bookkeeping and the byte copy happen
//! under that one lock.
//!
//! Overflow policy: the oldest unread bytes are dropped to make room.
//! The consumer simply sees fewer bytes on its next read; no error is
//! raised on the producer side.

/// Fixed-capacity circular byte buffer with monotonic cursors and a
/// (byte offset, absolute time) anchor.
///
/// Cursors only grow; the physical storage position is `cursor % capacity`.
/// The anchor is re-recorded on every append, so the timestamp for any
/// cursor position is derived by linear extrapolation at bytes-per-second.
/// That is accurate between two producer appends because sample clocks are
/// locally stable over tens of milliseconds.
///
/// Invariant after every operation:
/// `read_cursor <= write_cursor <= read_cursor + capacity`.
#[derive(Debug)]
pub struct RingBuffer {
    storage: Vec<u8>,
    capacity: u64,
    read_cursor: u64,
    write_cursor: u64,
    anchor_offset: u64,
    anchor_time: f64,
    sample_rate: u32,
    bytes_per_sample: u32,
}

impl RingBuffer {
    /// Ring sized for one second of audio at the negotiated format.
    pub fn new(sample_rate: u32, bytes_per_sample: u32) -> Self {
        Self::with_capacity(
            sample_rate as usize * bytes_per_sample as usize,
            sample_rate,
            bytes_per_sample,
        )
    }

    /// Ring with an explicit capacity in bytes.
    ///
    /// `capacity`, `sample_rate` and `bytes_per_sample` must all be
    /// non-zero; the rate and frame size only drive timestamp math.
    pub fn with_capacity(capacity: usize, sample_rate: u32, bytes_per_sample: u32) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        assert!(sample_rate > 0 && bytes_per_sample > 0);
        Self {
            storage: vec![0; capacity],
            capacity: capacity as u64,
            read_cursor: 0,
            write_cursor: 0,
            anchor_offset: 0,
            anchor_time: 0.0,
            sample_rate,
            bytes_per_sample,
        }
    }

    /// Append one hardware packet captured at `time` (seconds, absolute).
    pub fn append(&mut self, payload: &[u8], time: f64) {
        self.append_inner(Some(payload), payload.len() as u64, time);
    }

    /// Append `len` bytes of silence captured at `time`.
    ///
    /// Used when the hardware flags a packet as silent instead of
    /// delivering real samples; whatever payload it hands out is garbage.
    pub fn append_silence(&mut self, len: usize, time: f64) {
        self.append_inner(None, len as u64, time);
    }

    fn append_inner(&mut self, payload: Option<&[u8]>, len: u64, time: f64) {
        if len == 0 {
            return;
        }

        // A packet larger than the whole window can only ever contribute
        // its trailing `capacity` bytes; shift the timestamp to match.
        let (payload, len, time) = if len > self.capacity {
            let dropped = len - self.capacity;
            (
                payload.map(|p| &p[dropped as usize..]),
                self.capacity,
                time + dropped as f64 / self.bytes_per_second(),
            )
        } else {
            (payload, len, time)
        };

        // Drop the oldest unread bytes if the packet does not fit.
        let available = self.capacity - (self.write_cursor - self.read_cursor);
        if len > available {
            self.read_cursor += len - available;
        }

        self.anchor_offset = self.write_cursor;
        self.anchor_time = time;

        let pos = (self.write_cursor % self.capacity) as usize;
        let first = len.min(self.capacity - pos as u64) as usize;
        let rest = len as usize - first;
        match payload {
            Some(p) => {
                self.storage[pos..pos + first].copy_from_slice(&p[..first]);
                self.storage[..rest].copy_from_slice(&p[first..]);
            }
            None => {
                self.storage[pos..pos + first].fill(0);
                self.storage[..rest].fill(0);
            }
        }
        self.write_cursor += len;

        // Keep the monotonic counters bounded.
        if self.read_cursor > self.capacity {
            self.write_cursor -= self.capacity;
            self.read_cursor -= self.capacity;
            self.anchor_offset -= self.capacity;
        }
    }

    /// Copy out up to `dest.len()` buffered bytes.
    ///
    /// Returns the byte count actually written and the absolute time of
    /// the first byte (the read cursor position before the copy). The
    /// timestamp is returned even when no bytes are available.
    pub fn read(&mut self, dest: &mut [u8]) -> (usize, f64) {
        let time = self.anchor_time
            + (self.read_cursor as f64 - self.anchor_offset as f64) / self.bytes_per_second();

        let len = (dest.len() as u64).min(self.write_cursor - self.read_cursor) as usize;
        let pos = (self.read_cursor % self.capacity) as usize;
        let first = len.min(self.capacity as usize - pos);
        dest[..first].copy_from_slice(&self.storage[pos..pos + first]);
        dest[first..len].copy_from_slice(&self.storage[..len - first]);
        self.read_cursor += len as u64;

        (len, time)
    }

    /// Move the read cursor to the byte nearest `target` (seconds).
    ///
    /// Seeking earlier than the oldest retained byte or later than the
    /// newest appended byte pins the cursor to that bound.
    pub fn jump_to_time(&mut self, target: f64) {
        let delta_samples = ((target - self.anchor_time) * self.sample_rate as f64).round() as i64;
        let target_offset =
            self.anchor_offset as i64 + delta_samples * self.bytes_per_sample as i64;
        self.read_cursor =
            target_offset.clamp(self.read_cursor as i64, self.write_cursor as i64) as u64;
    }

    /// Discard all buffered, unread data.
    pub fn flush(&mut self) {
        self.read_cursor = self.write_cursor;
    }

    /// Bytes currently buffered and unread.
    pub fn buffered(&self) -> usize {
        (self.write_cursor - self.read_cursor) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.write_cursor == self.read_cursor
    }

    /// Total capacity of the ring in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    fn bytes_per_second(&self) -> f64 {
        (self.sample_rate as u64 * self.bytes_per_sample as u64) as f64
    }
}
