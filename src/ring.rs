//! Fixed-capacity circular byte buffer.
//!
//! [`RingBuffer`] is the storage behind the event log. Bytes are inserted at the head and
//! consumed from the tail; `head == tail` means empty, so one slot is always left unused and
//! a buffer of capacity `N` holds at most `N - 1` bytes.
//!
//! ## Contiguous runs
//!
//! [`data_available()`](RingBuffer::data_available) and [`free_space()`](RingBuffer::free_space)
//! only report the run that is contiguous up to the physical end of the storage. Once the data
//! has wrapped, the true total is larger. [`insert()`](RingBuffer::insert) and
//! [`read_with_drain()`](RingBuffer::read_with_drain) loop over runs, so they see everything;
//! any other caller of the two counters has to do the same.
//!
//! ## Example
//!
//! ```rust
//! use x10_bridge::ring::RingBuffer;
//!
//! let mut ring: RingBuffer<8> = RingBuffer::new();
//! assert_eq!(ring.insert(b"hello"), 5);
//!
//! let mut out = [0u8; 8];
//! assert_eq!(ring.read(&mut out), 5);
//! assert_eq!(&out[..5], b"hello");
//! ```

/// A circular FIFO over an owned `[u8; N]`.
///
/// Writes never overwrite unread data: an insert that does not fit is truncated and the
/// return value tells the caller how much was stored.
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    buf: [u8; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> RingBuffer<N> {
    /// Creates an empty ring buffer with zeroed storage.
    pub const fn new() -> Self {
        const { assert!(N > 1, "a ring buffer needs at least two slots") };
        Self {
            buf: [0; N],
            head: 0,
            tail: 0,
        }
    }

    /// Resets the buffer to empty and fills the storage with `fill`.
    pub fn initialize(&mut self, fill: u8) {
        self.buf = [fill; N];
        self.reset();
    }

    /// The size of the backing storage.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Marks the buffer empty. Stored bytes are left in place.
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    /// Returns `true` if there is nothing to read.
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Copies as much of `data` as fits, wrapping around the end of the storage.
    ///
    /// # Returns
    /// The number of leading bytes of `data` that were stored. Anything less than
    /// `data.len()` means the buffer is now full.
    pub fn insert(&mut self, data: &[u8]) -> usize {
        let mut written = 0;

        while written < data.len() {
            let space = self.free_space();
            if space == 0 {
                break;
            }

            let run = space.min(data.len() - written);
            self.buf[self.head..self.head + run].copy_from_slice(&data[written..written + run]);
            self.head += run;
            written += run;

            if self.head == N {
                self.head = 0;
            }
        }

        written
    }

    /// Bytes readable from the tail without wrapping.
    ///
    /// Undercounts once the data wraps past the end of the storage.
    pub fn data_available(&self) -> usize {
        if self.head >= self.tail {
            self.head - self.tail
        } else {
            N - self.tail
        }
    }

    /// Bytes writable at the head without wrapping or catching up with the tail.
    ///
    /// Undercounts when the free space wraps past the end of the storage.
    pub fn free_space(&self) -> usize {
        if self.tail > self.head {
            self.tail - self.head - 1
        } else if self.tail == 0 {
            N - self.head - 1
        } else {
            N - self.head
        }
    }

    /// Hands contiguous runs of buffered data to `drain` until the buffer is empty,
    /// `max` bytes have been consumed, or `drain` consumes nothing.
    ///
    /// `drain` receives a run starting at the tail and returns how many of its bytes it
    /// consumed; the tail advances by that much. A run never spans the end of the storage,
    /// so wrapped data arrives as two calls.
    ///
    /// # Returns
    /// The total number of bytes consumed.
    pub fn read_with_drain<F>(&mut self, max: usize, mut drain: F) -> usize
    where
        F: FnMut(&[u8]) -> usize,
    {
        let mut sent = 0;

        while sent < max {
            let mut run = self.data_available();
            if run == 0 {
                break;
            }
            run = run.min(max - sent);

            while run > 0 {
                let used = drain(&self.buf[self.tail..self.tail + run]).min(run);
                if used == 0 {
                    return sent;
                }

                run -= used;
                sent += used;
                self.tail += used;
                if self.tail >= N {
                    self.tail = 0;
                }
            }
        }

        sent
    }

    /// Copies buffered bytes into `out`, oldest first.
    ///
    /// # Returns
    /// The number of bytes copied, at most `out.len()`.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let mut pos = 0;
        self.read_with_drain(out.len(), |run| {
            out[pos..pos + run.len()].copy_from_slice(run);
            pos += run.len();
            run.len()
        })
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
