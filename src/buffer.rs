//! A growable byte buffer used to collect encoder output in memory.

use std::{io, ops::Deref};

/// The geometric growth factor applied to the capacity on reallocation.
const GROWTH_FACTOR: f64 = 1.4;

/// An owned byte buffer with a logical length and a separately tracked capacity.
///
/// The capacity grows geometrically, to `max(requested, ceil(capacity * 1.4))`,
/// so a long series of small appends reallocates only a logarithmic number of times.
///
/// Cloning makes a deep copy. [`ByteBuffer::take`] moves the contents out
/// and leaves an empty buffer behind.
///
/// # Examples
/// ```
/// # use pngsqueeze::ByteBuffer;
/// let mut buffer = ByteBuffer::new();
/// buffer.append(b"IDAT");
/// buffer.append(&[0, 1, 2]);
/// assert_eq!(buffer.len(), 7);
/// assert_eq!(&buffer[..4], b"IDAT");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ByteBuffer {
    /// The allocated storage, always exactly `capacity` bytes long.
    storage: Vec<u8>,
    /// The number of bytes appended so far.
    len: usize,
}

impl ByteBuffer {
    /// Creates an empty buffer without allocating.
    #[must_use]
    pub const fn new() -> Self {
        Self { storage: Vec::new(), len: 0 }
    }

    /// Creates an empty buffer with exactly `capacity` bytes allocated.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { storage: vec![0; capacity], len: 0 }
    }

    /// The number of bytes written.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no bytes have been written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of bytes that can be held without reallocating.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Ensures the capacity is at least `capacity`.
    ///
    /// Returns whether a reallocation happened.
    pub fn reserve(&mut self, capacity: usize) -> bool {
        let current = self.capacity();
        if capacity <= current {
            return false;
        }

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let grown = (current as f64 * GROWTH_FACTOR).ceil() as usize;

        self.storage.resize(capacity.max(grown), 0);
        true
    }

    /// Appends `bytes`, growing the buffer if needed.
    pub fn append(&mut self, bytes: &[u8]) {
        let end = self.len + bytes.len();
        self.reserve(end);
        self.storage[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }

    /// Discards the contents, keeping the allocation.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Moves the contents out, leaving `self` empty with no capacity.
    #[must_use]
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// The bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Converts into a `Vec` holding exactly the bytes written.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        let Self { mut storage, len } = self;
        storage.truncate(len);
        storage
    }
}

impl Deref for ByteBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ByteBuffer {}

impl From<&[u8]> for ByteBuffer {
    fn from(bytes: &[u8]) -> Self {
        let mut buffer = Self::with_capacity(bytes.len());
        buffer.append(bytes);
        buffer
    }
}

impl From<ByteBuffer> for Vec<u8> {
    fn from(buffer: ByteBuffer) -> Self {
        buffer.into_vec()
    }
}

impl io::Write for ByteBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.append(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
