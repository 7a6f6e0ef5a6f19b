//! Fixed-capacity byte ring buffer

use alloc::{boxed::Box, vec};

/// A circular byte queue with one producer and one consumer
///
/// The read and write positions run over `0..2 * capacity`. Equal positions
/// mean empty; positions that differ by exactly `capacity` mean full. This works
/// for any capacity, not only powers of two.
///
/// `RingBuffer` has no interior synchronization. Callers share it behind a
/// critical section; see the [`DeviceAdapter`](crate::DeviceAdapter).
pub struct RingBuffer {
    storage: Box<[u8]>,
    read: usize,
    write: usize,
}

impl RingBuffer {
    /// Allocate a ring buffer that holds `capacity` bytes
    ///
    /// A zero capacity is rounded up to one byte.
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            storage: vec![0; capacity.max(1)].into_boxed_slice(),
            read: 0,
            write: 0,
        }
    }

    /// Returns the number of bytes this buffer can hold
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns the number of buffered bytes
    pub fn data_len(&self) -> usize {
        let wrap = 2 * self.capacity();
        (self.write + wrap - self.read) % wrap
    }

    /// Returns the number of bytes that can be `put` before the buffer is full
    pub fn space_len(&self) -> usize {
        self.capacity() - self.data_len()
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    pub fn is_full(&self) -> bool {
        self.data_len() == self.capacity()
    }

    /// Copy as much of `data` as fits into the buffer
    ///
    /// Returns the number of bytes copied, which is less than `data.len()`
    /// when the buffer runs out of space.
    pub fn put(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.space_len());
        let start = self.write % self.capacity();
        let first = count.min(self.capacity() - start);
        self.storage[start..start + first].copy_from_slice(&data[..first]);
        self.storage[..count - first].copy_from_slice(&data[first..count]);
        self.write = self.advance(self.write, count);
        count
    }

    /// Copy buffered bytes into `buffer` without consuming them
    ///
    /// Returns the number of bytes copied.
    pub fn peek(&self, buffer: &mut [u8]) -> usize {
        let count = buffer.len().min(self.data_len());
        let start = self.read % self.capacity();
        let first = count.min(self.capacity() - start);
        buffer[..first].copy_from_slice(&self.storage[start..start + first]);
        buffer[first..count].copy_from_slice(&self.storage[..count - first]);
        count
    }

    /// Move buffered bytes into `buffer`
    ///
    /// Returns the number of bytes moved.
    pub fn get(&mut self, buffer: &mut [u8]) -> usize {
        let count = self.peek(buffer);
        self.read = self.advance(self.read, count);
        count
    }

    /// Discard up to `count` buffered bytes
    ///
    /// Returns the number of bytes discarded.
    pub fn skip(&mut self, count: usize) -> usize {
        let count = count.min(self.data_len());
        self.read = self.advance(self.read, count);
        count
    }

    /// Keep the oldest `len` buffered bytes, and discard the rest
    pub fn truncate(&mut self, len: usize) {
        if len < self.data_len() {
            self.write = self.advance(self.read, len);
        }
    }

    /// Discard all buffered bytes
    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    fn advance(&self, position: usize, count: usize) -> usize {
        (position + count) % (2 * self.capacity())
    }
}
