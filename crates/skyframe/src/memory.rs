use core::ops::DerefMut;

use log::debug;

/// Source of the one compressed-image buffer per fetch cycle.
///
/// The buffer is released when the returned value is dropped, so every exit
/// path of the fetch routine frees it without explicit bookkeeping.
pub trait BufferPool {
    type Buffer: DerefMut<Target = [u8]>;

    /// Largest single allocation the pool could satisfy right now.
    fn largest_free_block(&self) -> usize;

    /// Allocate exactly `len` zeroed bytes, or `None` if the pool cannot.
    fn allocate(&mut self, len: usize) -> Option<Self::Buffer>;
}

/// Pool backed by the global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapPool;

impl BufferPool for HeapPool {
    type Buffer = Vec<u8>;

    fn largest_free_block(&self) -> usize {
        isize::MAX as usize
    }

    fn allocate(&mut self, len: usize) -> Option<Vec<u8>> {
        let mut buf = Vec::new();
        if buf.try_reserve_exact(len).is_err() {
            debug!("heap pool: {} byte reservation refused", len);
            return None;
        }
        buf.resize(len, 0);
        Some(buf)
    }
}
