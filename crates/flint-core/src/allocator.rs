#![allow(unsafe_code)]
// SAFETY: 本模块直接向全局分配器申请原始内存块，供分离执行器原地构造槽位。
// ## 意图（Why）
// - 分离执行的“执行记录 + 自毁 Sink”必须存放在调用方给定的分配器提供的存储里，
//   存储的大小与对齐按具体槽位类型的 [`Layout`] 申请，这就是“重绑定到不同元素类型”；
// ## 契约（What）
// - `allocate` 成功返回的指针指向一块至少满足 `layout` 的、未初始化的独占内存；
// - 每块内存以申请时的同一个 `layout` 恰好交还一次 `deallocate`；
// - 所有 `unsafe` 块只调用 `std::alloc::{alloc, dealloc}`，且申请大小非零。

//! 分离执行器的槽位存储。
//!
//! # 契约说明（What）
//! - [`SlotAllocator`] 的形态与标准库 `GlobalAlloc` 一致：按 [`Layout`] 申请原始内存，
//!   以同一 `Layout` 归还；
//! - [`GlobalSlots`] 取自全局堆；[`BoundedSlots`] 在全局堆之上叠加字节预算，实际申请的
//!   每个字节都计入预算。

use parking_lot::Mutex;
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Arc;

/// 槽位分配失败。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("slot allocation of {size} bytes (align {align}) refused: {reason}")]
pub struct AllocError {
    size: usize,
    align: usize,
    reason: &'static str,
}

impl AllocError {
    pub fn new(layout: Layout, reason: &'static str) -> Self {
        Self {
            size: layout.size(),
            align: layout.align(),
            reason,
        }
    }

    /// 被拒绝的申请大小。
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn reason(&self) -> &'static str {
        self.reason
    }
}

/// 分离执行器使用的分配器。
///
/// # Safety
/// 实现者保证：`allocate` 返回的指针满足 `layout` 的大小与对齐，在交还之前不会被再次
/// 分配出去；克隆出的分配器共享同一存储来源，任一克隆都可以归还另一克隆申请的内存。
pub unsafe trait SlotAllocator: Clone + Send + Sync + 'static {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// 归还 [`allocate`](SlotAllocator::allocate) 申请的内存。
    ///
    /// # Safety
    /// `ptr` 必须由本分配器（或其克隆）以同一 `layout` 申请，且尚未归还。
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// 默认分配器：存储来自全局堆。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalSlots;

unsafe impl SlotAllocator for GlobalSlots {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Err(AllocError::new(layout, "zero-sized slot"));
        }
        // SAFETY: 申请大小非零。
        let raw = unsafe { std::alloc::alloc(layout) };
        NonNull::new(raw).ok_or_else(|| AllocError::new(layout, "global heap exhausted"))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: 由调用方保证 `ptr` 出自 `allocate(layout)` 且只归还一次。
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

/// 带字节预算的分配器。
///
/// 同一预算可被多个克隆共享；超出预算的申请被拒绝，归还后预算恢复。
#[derive(Clone, Debug)]
pub struct BoundedSlots {
    inner: Arc<Mutex<Budget>>,
}

#[derive(Debug)]
struct Budget {
    capacity: usize,
    in_use: usize,
    live: usize,
}

impl BoundedSlots {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Budget {
                capacity: capacity_bytes,
                in_use: 0,
                live: 0,
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// 当前占用的字节数。
    pub fn in_use(&self) -> usize {
        self.inner.lock().in_use
    }

    /// 尚未归还的内存块数量。
    pub fn live_blocks(&self) -> usize {
        self.inner.lock().live
    }
}

unsafe impl SlotAllocator for BoundedSlots {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let mut budget = self.inner.lock();
        let total = budget
            .in_use
            .checked_add(layout.size())
            .filter(|total| *total <= budget.capacity)
            .ok_or_else(|| AllocError::new(layout, "byte budget exhausted"))?;
        let block = GlobalSlots.allocate(layout)?;
        budget.in_use = total;
        budget.live += 1;
        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: 块由 `allocate` 经 `GlobalSlots` 以同一 `layout` 申请。
        unsafe { GlobalSlots.deallocate(ptr, layout) };
        let mut budget = self.inner.lock();
        budget.in_use = budget.in_use.saturating_sub(layout.size());
        budget.live = budget.live.saturating_sub(1);
    }
}
