//! Packet framing over a TCP byte stream.
//!
//! TCP delivers bytes in arbitrary chunks. The [`Framer`] accumulates those
//! chunks and cuts complete packets out of them. Every packet on the wire is:
//!
//! ```text
//! +------+------+-----------------------+----------------+----------+
//! | 0x5A | 0xA5 | payload length u32 LE | payload        | checksum |
//! +------+------+-----------------------+----------------+----------+
//! ```
//!
//! The checksum is the wrapping 8-bit sum of the payload bytes.
//!
//! Bytes that do not start with the magic are dropped until the next magic
//! shows up, so a corrupted stream resynchronizes on its own. A header that
//! declares a payload larger than the configured maximum can never complete
//! within the buffer budget: the whole accumulated buffer is discarded and
//! parsing restarts with the next fed byte. The buffer therefore never holds
//! more than `max_buffer_size + FRAME_OVERHEAD` bytes between calls.

use thiserror::Error;

/// Stream synchronization marker that opens every packet.
pub const MAGIC: [u8; 2] = [0x5A, 0xA5];

/// Magic plus the 4-byte payload length.
pub const HEADER_SIZE: usize = 6;

/// Header plus the trailing checksum byte.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + 1;

/// Default maximum payload accepted by [`Framer::new`].
pub const DEFAULT_MAX_PAYLOAD: usize = 1024;

/// Errors raised while feeding bytes into a [`Framer`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// A packet would exceed the buffer limit. The buffer has been discarded.
    #[error("packet of {size} bytes exceeds the {limit} byte limit, discarded {discarded} buffered bytes")]
    Overflow {
        size: usize,
        limit: usize,
        discarded: usize,
    },

    /// The accumulation buffer could not grow.
    #[error("unable to reserve {0} bytes for the framing buffer")]
    ResourceExhausted(usize),
}

/// Summary of one [`Framer::feed`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedReport {
    /// Packets handed to the callback.
    pub delivered: usize,
    /// Packets whose checksum did not match.
    pub rejected: usize,
    /// Bytes thrown away while searching for the next magic.
    pub dropped_bytes: usize,
}

/// Result of looking at the buffer from a given offset.
enum Step {
    /// A verified packet: payload range and the offset just past it.
    Packet { start: usize, end: usize, next: usize },
    /// Drop this many bytes and look again.
    Skip(usize),
    /// Header found but the checksum is wrong; drop the magic and rescan.
    Corrupt,
    /// More bytes needed.
    Incomplete,
    /// The header declares a payload above the limit.
    Oversized(usize),
}

/// Stateful byte-stream accumulator.
#[derive(Debug, Clone)]
pub struct Framer {
    buffer: Vec<u8>,
    max_payload: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    /// Create a framer accepting payloads up to [`DEFAULT_MAX_PAYLOAD`] bytes.
    pub fn new() -> Self {
        Self::with_max_buffer_size(DEFAULT_MAX_PAYLOAD)
    }

    /// Create a framer accepting payloads up to `max` bytes.
    pub fn with_max_buffer_size(max: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_payload: max,
        }
    }

    /// Change the payload limit. Takes effect on the next `feed`.
    pub fn set_max_buffer_size(&mut self, max: usize) {
        self.max_payload = max;
    }

    pub fn max_buffer_size(&self) -> usize {
        self.max_payload
    }

    /// Number of bytes currently held back waiting for the rest of a packet.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop everything accumulated so far.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Wrap a payload into a wire packet.
    pub fn pack(payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
        frame.extend_from_slice(&MAGIC);
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);
        frame.push(checksum(payload));
        frame
    }

    /// Append `chunk` and hand every complete packet payload to `on_packet`,
    /// in arrival order.
    ///
    /// Unconsumed trailing bytes are kept for the next call. On
    /// [`FramingError::Overflow`] packets extracted earlier in the same call
    /// have already been delivered; everything after them is discarded.
    pub fn feed<F>(&mut self, chunk: &[u8], mut on_packet: F) -> Result<FeedReport, FramingError>
    where
        F: FnMut(&[u8]),
    {
        self.buffer
            .try_reserve(chunk.len())
            .map_err(|_| FramingError::ResourceExhausted(chunk.len()))?;
        self.buffer.extend_from_slice(chunk);

        let mut report = FeedReport::default();
        let mut pos = 0;

        loop {
            match self.step(pos) {
                Step::Packet { start, end, next } => {
                    on_packet(&self.buffer[start..end]);
                    report.delivered += 1;
                    pos = next;
                }
                Step::Skip(n) => {
                    report.dropped_bytes += n;
                    pos += n;
                }
                Step::Corrupt => {
                    report.rejected += 1;
                    report.dropped_bytes += MAGIC.len();
                    pos += MAGIC.len();
                }
                Step::Incomplete => break,
                Step::Oversized(size) => {
                    let discarded = self.buffer.len() - pos;
                    self.buffer.clear();
                    return Err(FramingError::Overflow {
                        size,
                        limit: self.max_payload,
                        discarded,
                    });
                }
            }
        }

        self.buffer.drain(..pos);
        Ok(report)
    }

    fn step(&self, pos: usize) -> Step {
        let buf = &self.buffer[pos..];
        if buf.is_empty() {
            return Step::Incomplete;
        }

        match find_magic(buf) {
            None => return Step::Skip(buf.len()),
            Some(0) => {}
            Some(offset) => return Step::Skip(offset),
        }

        if buf.len() < HEADER_SIZE {
            return Step::Incomplete;
        }

        let declared = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize;
        if declared > self.max_payload {
            return Step::Oversized(declared);
        }

        let total = FRAME_OVERHEAD + declared;
        if buf.len() < total {
            return Step::Incomplete;
        }

        let payload = &buf[HEADER_SIZE..HEADER_SIZE + declared];
        if checksum(payload) != buf[total - 1] {
            return Step::Corrupt;
        }

        Step::Packet {
            start: pos + HEADER_SIZE,
            end: pos + HEADER_SIZE + declared,
            next: pos + total,
        }
    }
}

/// Offset of the first possible magic. A lone trailing `0x5A` counts, since
/// the second magic byte may still be on its way.
fn find_magic(buf: &[u8]) -> Option<usize> {
    buf.iter().enumerate().position(|(i, &b)| {
        b == MAGIC[0] && buf.get(i + 1).map_or(true, |&next| next == MAGIC[1])
    })
}

fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}
