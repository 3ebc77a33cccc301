#![allow(unsafe_code)]
// SAFETY: 存储委托给 `GlobalSlots`，这里只做计数，内存块原样转交与归还。

use crate::allocator::{AllocError, GlobalSlots, SlotAllocator};
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// 统计申请与归还的分配器，存储来自全局堆。
#[derive(Clone, Default)]
pub struct CountingAllocator {
    inner: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
    bytes_in_use: AtomicUsize,
    largest_request: AtomicUsize,
    fail_next: AtomicBool,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocations(&self) -> usize {
        self.inner.allocations.load(Ordering::SeqCst)
    }

    pub fn deallocations(&self) -> usize {
        self.inner.deallocations.load(Ordering::SeqCst)
    }

    /// 尚未归还的内存块数。
    pub fn live(&self) -> usize {
        self.allocations().saturating_sub(self.deallocations())
    }

    pub fn is_balanced(&self) -> bool {
        self.allocations() == self.deallocations() && self.bytes_in_use() == 0
    }

    pub fn bytes_in_use(&self) -> usize {
        self.inner.bytes_in_use.load(Ordering::SeqCst)
    }

    /// 历次申请中最大的字节数。
    pub fn largest_request(&self) -> usize {
        self.inner.largest_request.load(Ordering::SeqCst)
    }

    /// 下一次申请失败。
    pub fn fail_next(&self) {
        self.inner.fail_next.store(true, Ordering::SeqCst);
    }
}

unsafe impl SlotAllocator for CountingAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if self.inner.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AllocError::new(layout, "injected failure"));
        }
        let block = GlobalSlots.allocate(layout)?;
        self.inner.allocations.fetch_add(1, Ordering::SeqCst);
        self.inner
            .bytes_in_use
            .fetch_add(layout.size(), Ordering::SeqCst);
        self.inner
            .largest_request
            .fetch_max(layout.size(), Ordering::SeqCst);
        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: 块由 `allocate` 经 `GlobalSlots` 以同一 `layout` 申请。
        unsafe { GlobalSlots.deallocate(ptr, layout) };
        self.inner
            .bytes_in_use
            .fetch_sub(layout.size(), Ordering::SeqCst);
        self.inner.deallocations.fetch_add(1, Ordering::SeqCst);
    }
}
