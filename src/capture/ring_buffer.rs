//! Thread-safe ring buffer for audio samples.
//!
//! A single mutex guards all state; a condvar signals readers blocked in
//! [`RingBuffer::wait_for_data`]. Writes wrap around transparently and the
//! buffer tracks overruns (a single write larger than the whole buffer) and
//! underruns (a read that asked for more than was available).

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Snapshot of the buffer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// Samples written over the lifetime of the buffer
    pub total_samples: u64,
    /// Samples currently readable
    pub available_samples: usize,
    /// Buffer capacity in samples
    pub buffer_size: usize,
    /// Times a single write exceeded the buffer capacity
    pub overruns: u64,
    /// Times a read requested more than was available
    pub underruns: u64,
}

struct Inner {
    buffer: Vec<f32>,
    write_pos: usize,
    total_written: u64,
    overruns: u64,
    underruns: u64,
    data_ready: bool,
}

/// Bounded circular store of mono f32 samples.
pub struct RingBuffer {
    sample_rate: u32,
    capacity: usize,
    inner: Mutex<Inner>,
    data_cond: Condvar,
}

impl RingBuffer {
    /// Create a buffer holding at most `max_duration_seconds` of audio.
    pub fn new(max_duration_seconds: f64, sample_rate: u32) -> Self {
        let capacity = ((max_duration_seconds * f64::from(sample_rate)) as usize).max(1);
        Self {
            sample_rate,
            capacity,
            inner: Mutex::new(Inner {
                buffer: vec![0.0; capacity],
                write_pos: 0,
                total_written: 0,
                overruns: 0,
                underruns: 0,
                data_ready: false,
            }),
            data_cond: Condvar::new(),
        }
    }

    /// Append samples, overwriting the oldest data once full.
    pub fn write(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let mut inner = self.inner.lock().unwrap();
        let capacity = self.capacity;

        // A write larger than the whole buffer keeps only its tail.
        let src = if samples.len() > capacity {
            inner.overruns += 1;
            &samples[samples.len() - capacity..]
        } else {
            samples
        };

        let pos = inner.write_pos;
        if pos + src.len() <= capacity {
            inner.buffer[pos..pos + src.len()].copy_from_slice(src);
        } else {
            let first = capacity - pos;
            inner.buffer[pos..].copy_from_slice(&src[..first]);
            inner.buffer[..src.len() - first].copy_from_slice(&src[first..]);
        }

        inner.write_pos = (pos + src.len()) % capacity;
        inner.total_written += samples.len() as u64;
        inner.data_ready = true;
        drop(inner);
        self.data_cond.notify_all();
    }

    /// Read the most recent `duration_seconds` of audio.
    ///
    /// When less is available the read is short and counts as an underrun.
    /// Returns `None` when the buffer is empty.
    pub fn read_last(&self, duration_seconds: f64) -> Option<Vec<f32>> {
        let requested = (duration_seconds * f64::from(self.sample_rate)) as usize;
        let mut inner = self.inner.lock().unwrap();
        let available = (inner.total_written as usize).min(self.capacity);

        let n = if available < requested {
            inner.underruns += 1;
            available
        } else {
            requested
        };
        if n == 0 {
            return None;
        }

        Some(copy_last(&inner, self.capacity, n))
    }

    /// Read everything currently in the buffer.
    pub fn read_all(&self) -> Option<Vec<f32>> {
        let inner = self.inner.lock().unwrap();
        let available = (inner.total_written as usize).min(self.capacity);
        if available == 0 {
            return None;
        }
        Some(copy_last(&inner, self.capacity, available))
    }

    /// Seconds of audio currently readable.
    pub fn available_seconds(&self) -> f64 {
        let inner = self.inner.lock().unwrap();
        let available = (inner.total_written as usize).min(self.capacity);
        available as f64 / f64::from(self.sample_rate)
    }

    pub fn stats(&self) -> BufferStats {
        let inner = self.inner.lock().unwrap();
        BufferStats {
            total_samples: inner.total_written,
            available_samples: (inner.total_written as usize).min(self.capacity),
            buffer_size: self.capacity,
            overruns: inner.overruns,
            underruns: inner.underruns,
        }
    }

    /// Reset the buffer, counters, and the data signal.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.buffer.fill(0.0);
        inner.write_pos = 0;
        inner.total_written = 0;
        inner.overruns = 0;
        inner.underruns = 0;
        inner.data_ready = false;
    }

    /// Block until new data arrives or `timeout` elapses.
    ///
    /// Consumes the data signal, so each write wakes one round of waiters.
    /// Returns true when data was signalled, false on timeout.
    pub fn wait_for_data(&self, timeout: Duration) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let deadline = std::time::Instant::now() + timeout;
        while !inner.data_ready {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let (guard, result) = self.data_cond.wait_timeout(inner, remaining).unwrap();
            inner = guard;
            if result.timed_out() && !inner.data_ready {
                return false;
            }
        }
        inner.data_ready = false;
        true
    }

    /// Maximum duration the buffer can hold.
    pub fn duration_seconds(&self) -> f64 {
        self.capacity as f64 / f64::from(self.sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn copy_last(inner: &Inner, capacity: usize, n: usize) -> Vec<f32> {
    let read_pos = (inner.write_pos + capacity - n % capacity) % capacity;
    if read_pos + n <= capacity {
        inner.buffer[read_pos..read_pos + n].to_vec()
    } else {
        let first = capacity - read_pos;
        let mut out = Vec::with_capacity(n);
        out.extend_from_slice(&inner.buffer[read_pos..]);
        out.extend_from_slice(&inner.buffer[..n - first]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ramp(start: f32, len: usize) -> Vec<f32> {
        (0..len).map(|i| start + i as f32).collect()
    }

    #[test]
    fn read_returns_most_recent_samples() {
        let buf = RingBuffer::new(1.0, 10);
        buf.write(&ramp(0.0, 8));
        let got = buf.read_last(0.5).unwrap();
        assert_eq!(got, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn wrap_around_preserves_order() {
        let buf = RingBuffer::new(1.0, 10);
        buf.write(&ramp(0.0, 7));
        buf.write(&ramp(7.0, 6));
        // 13 written into capacity 10, the oldest 3 are gone
        let got = buf.read_all().unwrap();
        assert_eq!(got, ramp(3.0, 10));
    }

    #[test]
    fn empty_buffer_reads_none() {
        let buf = RingBuffer::new(1.0, 10);
        assert!(buf.read_last(0.5).is_none());
        assert!(buf.read_all().is_none());
        assert_eq!(buf.available_seconds(), 0.0);
    }

    #[test]
    fn short_read_counts_underrun() {
        let buf = RingBuffer::new(1.0, 10);
        buf.write(&ramp(0.0, 3));
        let got = buf.read_last(1.0).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(buf.stats().underruns, 1);
    }

    #[test]
    fn oversized_write_keeps_tail_and_counts_overrun() {
        let buf = RingBuffer::new(1.0, 10);
        buf.write(&ramp(0.0, 25));
        let stats = buf.stats();
        assert_eq!(stats.overruns, 1);
        assert_eq!(stats.total_samples, 25);
        assert_eq!(buf.read_all().unwrap(), ramp(15.0, 10));
    }

    #[test]
    fn clear_resets_everything() {
        let buf = RingBuffer::new(1.0, 10);
        buf.write(&ramp(0.0, 5));
        buf.clear();
        let stats = buf.stats();
        assert_eq!(stats.total_samples, 0);
        assert_eq!(stats.available_samples, 0);
        assert!(buf.read_all().is_none());
    }

    #[test]
    fn wait_times_out_without_data() {
        let buf = RingBuffer::new(1.0, 10);
        assert!(!buf.wait_for_data(Duration::from_millis(20)));
    }

    #[test]
    fn wait_wakes_on_write() {
        let buf = Arc::new(RingBuffer::new(1.0, 44100));
        let writer = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            writer.write(&[0.5; 128]);
        });
        assert!(buf.wait_for_data(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn concurrent_writers_never_corrupt_counts() {
        let buf = Arc::new(RingBuffer::new(2.0, 1000));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let b = Arc::clone(&buf);
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    b.write(&[1.0; 100]);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(buf.stats().total_samples, 4 * 50 * 100);
        assert_eq!(buf.read_all().unwrap().len(), 2000);
    }
}
