//! Backing-storage collaborator.
//!
//! The engine never obtains buffer bytes itself; it asks a [`BackingStore`]
//! for contiguous storage and hands it back at close. The engine makes no
//! assumption about buffer contents beyond being addressable storage of the
//! requested length.

use crate::error::{PoolError, PoolResult};

/// An owned, contiguous run of backing bytes.
///
/// Opaque to the engine: the pool tracks offsets and sizes within the
/// buffer but never reads or writes through it.
#[derive(Debug)]
pub struct BackingBuffer {
    data: Box<[u8]>,
}

impl BackingBuffer {
    /// Buffer length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer is zero length.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// View the buffer contents.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// View the buffer contents mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Capability for acquiring and releasing backing storage.
///
/// `Pool::open` uses [`SystemStore`] unless told otherwise; tests inject
/// failing stores to exercise the out-of-memory unwind paths.
pub trait BackingStore {
    /// Acquire `len` contiguous bytes of owned storage.
    fn acquire(&self, len: usize) -> PoolResult<BackingBuffer>;

    /// Release a buffer previously acquired from this store.
    fn release(&self, buffer: BackingBuffer) {
        drop(buffer);
    }
}

/// Backing store that draws zeroed storage from the process heap.
///
/// Acquisition is fallible: heap exhaustion reports
/// [`PoolError::OutOfMemory`] instead of aborting the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemStore;

impl BackingStore for SystemStore {
    fn acquire(&self, len: usize) -> PoolResult<BackingBuffer> {
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| PoolError::OutOfMemory)?;
        data.resize(len, 0);
        Ok(BackingBuffer {
            data: data.into_boxed_slice(),
        })
    }
}
