use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use log::debug;
use skyframe::memory::BufferPool;

const CAPS: u32 = esp_idf_sys::MALLOC_CAP_SPIRAM | esp_idf_sys::MALLOC_CAP_8BIT;

/// Compressed-image buffers carved out of external PSRAM.
#[derive(Debug, Default)]
pub struct PsramPool;

/// Zeroed PSRAM allocation, returned to the heap on drop.
pub struct PsramBuf {
    ptr: NonNull<u8>,
    len: usize,
}

impl Deref for PsramBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for PsramBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for PsramBuf {
    fn drop(&mut self) {
        unsafe { esp_idf_sys::heap_caps_free(self.ptr.as_ptr().cast()) };
        debug!("psram: freed {} bytes", self.len);
    }
}

impl BufferPool for PsramPool {
    type Buffer = PsramBuf;

    fn largest_free_block(&self) -> usize {
        unsafe { esp_idf_sys::heap_caps_get_largest_free_block(CAPS) }
    }

    fn allocate(&mut self, len: usize) -> Option<PsramBuf> {
        let raw = unsafe { esp_idf_sys::heap_caps_calloc(1, len.max(1), CAPS) };
        let ptr = NonNull::new(raw.cast::<u8>())?;
        debug!("psram: allocated {} bytes", len);
        Some(PsramBuf { ptr, len })
    }
}
