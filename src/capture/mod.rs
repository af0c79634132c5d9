//! Live-capture support
//!
//! A capture thread writes incoming samples into a [`RingBuffer`] while an
//! analysis thread reads the most recent window. No audio-device I/O lives
//! here; callers plug their own capture source in.

mod ring_buffer;

pub use ring_buffer::{BufferStats, RingBuffer};
