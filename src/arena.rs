//! Growable byte arena used to stage encoded output and decoded input
//!
//! An [`Arena`] grows by `capacity * 3 + requested` bytes whenever a reservation does not
//! fit, never beyond its configured maximum size. Reaching the maximum is an
//! [`JsonError::OutOfMemory`] error, unless a flush sink is attached in which case the
//! staged content is written to the sink and the arena starts over.
//!
//! [`ArenaPool`] keeps arenas around between calls so that their allocation is reused.
//! Arenas are checked out as [`PooledArena`] which returns the arena to the pool once it
//! is dropped, regardless of whether the call using it succeeded.

use std::{
    io::{Read, Write},
    ops::{Deref, DerefMut},
    sync::{Mutex, PoisonError},
};

use crate::error::JsonError;

/// Initial capacity of new arenas, unless configured differently
pub const DEFAULT_INITIAL_CAPACITY: usize = 256;
/// Default maximum arena size
///
/// This is effectively unbounded, but the check is still performed.
pub const DEFAULT_MAX_SIZE: usize = isize::MAX as usize;

const READ_CHUNK_SIZE: usize = 8 * 1024;
/// Number of arenas an [`ArenaPool`] keeps at most; one per concurrently running call
const MAX_POOLED_ARENAS: usize = 16;

/// Growable contiguous byte buffer with a hard size ceiling
#[derive(Debug)]
pub struct Arena {
    buf: Vec<u8>,
    /// Logical capacity; `buf.len() <= capacity <= max_size`
    capacity: usize,
    max_size: usize,
}

impl Arena {
    /// Creates an arena with the given initial capacity and maximum size
    ///
    /// The initial capacity is clamped to the maximum size.
    pub fn new(initial_capacity: usize, max_size: usize) -> Self {
        let capacity = initial_capacity.min(max_size);
        Arena {
            buf: Vec::with_capacity(capacity),
            capacity,
            max_size,
        }
    }

    /// Number of bytes currently staged
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether no bytes are staged
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured maximum size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Changes the maximum size; used when a pooled arena is checked out for a call with
    /// different settings
    pub(crate) fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.capacity = self.capacity.min(max_size).max(self.buf.len());
    }

    /// The staged bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Discards all staged bytes, keeping the capacity
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Ensures that `additional` more bytes fit into the arena
    ///
    /// If the bytes would not fit within the maximum size and a `sink` is provided, all
    /// staged bytes except for the last one are written to the sink first. The last byte is
    /// retained so that a trailing separator written just before can still be trimmed.
    pub fn reserve(
        &mut self,
        additional: usize,
        sink: Option<&mut (dyn Write + '_)>,
    ) -> Result<(), JsonError> {
        if self.buf.len() + additional <= self.capacity {
            return Ok(());
        }

        if let Some(sink) = sink {
            let at_limit = self.capacity == self.max_size
                || self.buf.len() + additional > self.max_size;
            if at_limit && self.buf.len() > 1 {
                let retained = self.buf.len() - 1;
                log::debug!("flushing {retained} arena bytes at maximum size {}", self.max_size);
                sink.write_all(&self.buf[..retained])?;
                self.buf.drain(..retained);
                if self.buf.len() + additional <= self.capacity {
                    return Ok(());
                }
            }
        }

        self.expand(additional)
    }

    fn expand(&mut self, additional: usize) -> Result<(), JsonError> {
        let new_capacity = self
            .capacity
            .saturating_mul(3)
            .saturating_add(additional)
            .min(self.max_size);
        if self.buf.len() + additional > new_capacity {
            return Err(JsonError::OutOfMemory {
                requested: additional,
                len: self.buf.len(),
                max_size: self.max_size,
            });
        }

        log::trace!("growing arena from {} to {new_capacity} bytes", self.capacity);
        self.buf.reserve_exact(new_capacity - self.buf.len());
        self.capacity = new_capacity;
        Ok(())
    }

    /// Appends bytes for which space was already reserved
    ///
    /// Writing more than was reserved still works, but is considered a bug.
    #[inline]
    pub(crate) fn push_reserved(&mut self, bytes: &[u8]) {
        debug_assert!(self.buf.len() + bytes.len() <= self.capacity);
        self.buf.extend_from_slice(bytes);
    }

    #[inline]
    pub(crate) fn push_byte_reserved(&mut self, byte: u8) {
        debug_assert!(self.buf.len() < self.capacity);
        self.buf.push(byte);
    }

    /// Reserves space and appends the bytes
    pub fn write_bytes(
        &mut self,
        bytes: &[u8],
        sink: Option<&mut (dyn Write + '_)>,
    ) -> Result<(), JsonError> {
        self.reserve(bytes.len(), sink)?;
        self.push_reserved(bytes);
        Ok(())
    }

    /// Removes the last byte if it equals `byte`
    ///
    /// Returns whether the byte was removed.
    pub(crate) fn trim_last(&mut self, byte: u8) -> bool {
        if self.buf.last() == Some(&byte) {
            self.buf.pop();
            true
        } else {
            false
        }
    }

    /// Writes all staged bytes to the sink and clears the arena
    pub fn flush_to(&mut self, sink: &mut dyn Write) -> Result<(), JsonError> {
        sink.write_all(&self.buf)?;
        self.buf.clear();
        sink.flush()?;
        Ok(())
    }

    /// Reads the complete `reader` into the arena, replacing any staged bytes
    ///
    /// Fails with [`JsonError::OutOfMemory`] if the input is larger than the maximum size.
    pub fn fill_from<R: Read>(&mut self, reader: &mut R) -> Result<(), JsonError> {
        self.buf.clear();
        let mut chunk = [0_u8; READ_CHUNK_SIZE];
        loop {
            let read_count = match reader.read(&mut chunk) {
                Ok(0) => return Ok(()),
                Ok(count) => count,
                // Retry if interrupted
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.write_bytes(&chunk[..read_count], None)?;
        }
    }

    /// Copies the staged bytes into a `String`
    ///
    /// Everything the serializer stages is UTF-8, so the conversion only fails
    /// for arenas filled from external input.
    pub fn to_string_checked(&self) -> Result<String, JsonError> {
        std::str::from_utf8(&self.buf)
            .map(str::to_owned)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
    }

    /// The staged bytes as `str`
    pub fn as_str_checked(&self) -> Result<&str, JsonError> {
        std::str::from_utf8(&self.buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
    }
}

/// Pool of reusable arenas
///
/// The pool can be shared between threads; every call checks out its own arena.
#[derive(Debug)]
pub struct ArenaPool {
    arenas: Mutex<Vec<Arena>>,
    initial_capacity: usize,
}

impl Default for ArenaPool {
    fn default() -> Self {
        ArenaPool::new(DEFAULT_INITIAL_CAPACITY)
    }
}

impl ArenaPool {
    /// Creates an empty pool whose new arenas start with the given capacity
    pub fn new(initial_capacity: usize) -> Self {
        ArenaPool {
            arenas: Mutex::new(Vec::new()),
            initial_capacity,
        }
    }

    /// Checks out an arena with the given maximum size
    ///
    /// The arena is returned to the pool when the returned guard is dropped.
    pub fn checkout(&self, max_size: usize) -> PooledArena<'_> {
        let pooled = self
            .arenas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let arena = match pooled {
            Some(mut arena) => {
                arena.set_max_size(max_size);
                arena
            }
            None => {
                log::trace!("arena pool is empty, creating new arena");
                Arena::new(self.initial_capacity, max_size)
            }
        };
        PooledArena {
            arena: Some(arena),
            pool: self,
        }
    }

    /// Number of arenas currently available in the pool
    pub fn available(&self) -> usize {
        self.arenas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn give_back(&self, mut arena: Arena) {
        arena.clear();
        let mut arenas = self.arenas.lock().unwrap_or_else(PoisonError::into_inner);
        if arenas.len() < MAX_POOLED_ARENAS {
            arenas.push(arena);
        }
    }
}

/// Arena checked out of an [`ArenaPool`], returned to the pool on drop
#[derive(Debug)]
pub struct PooledArena<'p> {
    // Only `None` during `drop`
    arena: Option<Arena>,
    pool: &'p ArenaPool,
}

impl Deref for PooledArena<'_> {
    type Target = Arena;

    fn deref(&self) -> &Arena {
        match &self.arena {
            Some(arena) => arena,
            None => unreachable!("arena is only taken on drop"),
        }
    }
}

impl DerefMut for PooledArena<'_> {
    fn deref_mut(&mut self) -> &mut Arena {
        match &mut self.arena {
            Some(arena) => arena,
            None => unreachable!("arena is only taken on drop"),
        }
    }
}

impl Drop for PooledArena<'_> {
    fn drop(&mut self) {
        if let Some(arena) = self.arena.take() {
            self.pool.give_back(arena);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn triple_growth() -> TestResult {
        let mut arena = Arena::new(4, 1000);
        arena.write_bytes(b"abcd", None)?;
        assert_eq!(4, arena.capacity());

        arena.write_bytes(b"e", None)?;
        // 4 * 3 + 1
        assert_eq!(13, arena.capacity());
        assert_eq!(b"abcde", arena.as_bytes());
        Ok(())
    }

    #[test]
    fn growth_clamped_to_max_size() -> TestResult {
        let mut arena = Arena::new(4, 10);
        arena.write_bytes(b"abcde", None)?;
        assert_eq!(10, arena.capacity());

        arena.write_bytes(b"fghij", None)?;
        match arena.write_bytes(b"k", None) {
            Err(JsonError::OutOfMemory {
                requested,
                len,
                max_size,
            }) => {
                assert_eq!((1, 10, 10), (requested, len, max_size));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(b"abcdefghij", arena.as_bytes());
        Ok(())
    }

    #[test]
    fn flush_at_max_size() -> TestResult {
        let mut sink = Vec::<u8>::new();
        let mut arena = Arena::new(4, 8);
        arena.write_bytes(b"12345678", Some(&mut sink))?;
        assert!(sink.is_empty());

        arena.write_bytes(b"9,", Some(&mut sink))?;
        // Last byte is retained
        assert_eq!(b"1234567", sink.as_slice());
        assert_eq!(b"89,", arena.as_bytes());

        assert_eq!(true, arena.trim_last(b','));
        assert_eq!(false, arena.trim_last(b','));
        arena.flush_to(&mut sink)?;
        assert_eq!(b"123456789", sink.as_slice());
        assert!(arena.is_empty());
        Ok(())
    }

    #[test]
    fn fill_from_reader() -> TestResult {
        let input = "x".repeat(20_000);
        let mut arena = Arena::new(16, DEFAULT_MAX_SIZE);
        arena.fill_from(&mut input.as_bytes())?;
        assert_eq!(input, arena.as_str_checked()?);

        let mut arena = Arena::new(16, 100);
        assert!(matches!(
            arena.fill_from(&mut input.as_bytes()),
            Err(JsonError::OutOfMemory { .. })
        ));
        Ok(())
    }

    #[test]
    fn invalid_utf8() {
        let mut arena = Arena::new(16, 100);
        arena.write_bytes(&[b'"', 0xFF, b'"'], None).unwrap();
        match arena.to_string_checked() {
            Err(JsonError::IoError(e)) => assert_eq!(std::io::ErrorKind::InvalidData, e.kind()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn pool_reuse() -> TestResult {
        let pool = ArenaPool::new(8);
        assert_eq!(0, pool.available());
        {
            let mut arena = pool.checkout(DEFAULT_MAX_SIZE);
            arena.write_bytes(&[b'a'; 100], None)?;
        }
        assert_eq!(1, pool.available());

        let arena = pool.checkout(DEFAULT_MAX_SIZE);
        assert_eq!(0, pool.available());
        assert!(arena.is_empty());
        // Allocation of the previous call is reused
        assert!(arena.capacity() >= 100);
        Ok(())
    }

    #[test]
    fn pool_return_on_error() {
        let pool = ArenaPool::new(8);
        let result: Result<(), JsonError> = (|| {
            let mut arena = pool.checkout(16);
            arena.write_bytes(&[b'a'; 100], None)?;
            Ok(())
        })();
        assert!(result.is_err());
        assert_eq!(1, pool.available());

        // Maximum size is applied again when checked out
        let arena = pool.checkout(4);
        assert_eq!(4, arena.max_size());
        assert!(arena.capacity() <= 4);
    }
}
