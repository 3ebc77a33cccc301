#![allow(unsafe_code)]
// SAFETY: 分离执行器把槽位原地构造在分配器提供的原始内存里，槽位由 Sink 在终态时自行销毁。
// ## 意图（Why）
// - 槽位（头部 + 执行记录）只占用分配器给出的一块内存，申请的 `Layout` 即真实占用；
// ## 解析逻辑（How）
// 1. 头部位于 `#[repr(C)]` 槽位的首字段，指向头部的指针与指向内存块的指针相同；
// 2. 阶段字 `phase` 以原子交换决定唯一的销毁方：`RUNNING` 时由 Sink 销毁，`STARTING`
//    时由启动方在 `begin` 返回后销毁，`CONNECTING` 时由连接守卫归还内存；
// 3. 执行记录只在 `STARTING` 阶段被启动方以 `&mut` 访问，Sink 只读写头部的原子字段；
// ## 契约（What）
// - 赢得终态交换的一方之后，任何一方都不再访问槽位；
// - 读出销毁函数等头部字段总是先于阶段交换完成。

//! 分离执行器。
//!
//! # 设计背景（Why）
//! - 调用方只想“启动并遗忘”一个组合好的 Task：执行记录与自毁 Sink 存放在分配器提供的
//!   同一块存储里，由槽位在任意终态时自行回收，调用方不持有任何句柄。
//!
//! # 契约说明（What）
//! - 启动顺序：按槽位类型的布局申请存储 → 连接 → `begin` → 返回 `Ok(())`；
//! - 成功与取消都会销毁执行记录并恰好归还一次存储；
//! - 失败被视为未处理错误：记录 `error` 日志后终止进程；
//! - 申请失败返回 [`LaunchError`]，Task 不会被连接；连接阶段 panic 时存储先归还，
//!   panic 再传播给调用方；
//! - 引擎在未触发的情况下丢弃了 Sink，按取消处理并记录告警。
//!
//! # 风险提示（Trade-offs）
//! - `connect` 必须是纯构造：若它把 Sink 交给外部后再 panic，槽位无法安全归还，只记录
//!   错误日志并放弃这块存储。

use crate::allocator::SlotAllocator;
use crate::error::LaunchError;
use crate::sink::CompletionSink;
use crate::task::{Task, TaskState};
use std::alloc::Layout;
use std::fmt;
use std::mem::{self, MaybeUninit};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU8, Ordering};

const CONNECTING: u8 = 0;
const STARTING: u8 = 1;
const RUNNING: u8 = 2;
const FINISHED: u8 = 3;

/// 以 `allocator` 为槽位存储分离执行 `task`。
///
/// # 错误
/// - [`LaunchError::Allocation`]：分配器拒绝了申请。
///
/// # Panics
/// `task.connect` 中的 panic 原样传播，此前申请的存储已归还；`begin` 中的 panic 同样
/// 传播，槽位交由 Sink 收尾。
pub fn run_detached<T, A>(task: T, allocator: A) -> Result<(), LaunchError>
where
    T: Task,
    T::Error: fmt::Debug,
    A: SlotAllocator,
{
    let layout = Layout::new::<DetachedSlot<A, T::State<DetachedSink<A>>>>();
    let slot = allocator
        .allocate(layout)?
        .cast::<DetachedSlot<A, T::State<DetachedSink<A>>>>();
    // SAFETY: 内存块按该槽位类型的布局新申请，尚无任何别名。
    unsafe {
        slot.as_ptr().write(DetachedSlot {
            header: SlotHeader {
                phase: AtomicU8::new(CONNECTING),
                layout,
                allocator: allocator.clone(),
                destroy: destroy_slot::<A, T::State<DetachedSink<A>>>,
            },
            state: MaybeUninit::uninit(),
        });
    }
    let header = slot.cast::<SlotHeader<A>>();

    let guard = ConnectGuard { header };
    let state = task.connect(DetachedSink {
        allocator,
        slot: Some(SlotRef(header)),
    });
    mem::forget(guard);

    // SAFETY: 连接完成前没有任何一方访问执行记录字段。
    let state_ptr = unsafe { (&raw mut (*slot.as_ptr()).state).cast::<T::State<DetachedSink<A>>>() };
    unsafe { state_ptr.write(state) };
    // SAFETY: 槽位在 `STARTING` 阶段只可能由启动方销毁。
    unsafe { header.as_ref() }
        .phase
        .store(STARTING, Ordering::Release);
    tracing::debug!(bytes = layout.size(), "detached task launched");

    let handoff = BeginGuard { header };
    // SAFETY: `STARTING` 阶段只有启动方访问执行记录，Sink 只触碰头部原子字段。
    unsafe { (*state_ptr).begin() };
    drop(handoff);
    Ok(())
}

/// 槽位：头部在前，执行记录在后。
#[repr(C)]
struct DetachedSlot<A: SlotAllocator, St> {
    header: SlotHeader<A>,
    state: MaybeUninit<St>,
}

struct SlotHeader<A: SlotAllocator> {
    phase: AtomicU8,
    layout: Layout,
    allocator: A,
    /// 销毁执行记录并归还存储；擦除了执行记录的具体类型。
    destroy: unsafe fn(NonNull<SlotHeader<A>>),
}

/// 销毁已初始化的执行记录，再归还整块存储。
///
/// # Safety
/// 调用方赢得了终态交换，执行记录已初始化，且槽位类型为 `DetachedSlot<A, St>`。
unsafe fn destroy_slot<A: SlotAllocator, St>(header: NonNull<SlotHeader<A>>) {
    let slot = header.cast::<DetachedSlot<A, St>>();
    unsafe {
        ptr::drop_in_place((&raw mut (*slot.as_ptr()).state).cast::<St>());
        release_storage(header);
    }
}

/// 读出头部并归还整块存储；执行记录必须已销毁或从未初始化。
///
/// # Safety
/// 调用后槽位不可再被访问。
unsafe fn release_storage<A: SlotAllocator>(header: NonNull<SlotHeader<A>>) {
    let SlotHeader {
        layout, allocator, ..
    } = unsafe { header.as_ptr().read() };
    // SAFETY: 头部位于槽位首字段，其地址即内存块地址。
    unsafe { allocator.deallocate(header.cast(), layout) };
    tracing::debug!(bytes = layout.size(), "detached task storage released");
}

/// 连接阶段的守卫：只在 `connect` panic 时析构。
struct ConnectGuard<A: SlotAllocator> {
    header: NonNull<SlotHeader<A>>,
}

impl<A: SlotAllocator> Drop for ConnectGuard<A> {
    fn drop(&mut self) {
        // SAFETY: 执行记录从未初始化；Sink 在 `CONNECTING` 阶段析构时只写入阶段字。
        let phase = unsafe { self.header.as_ref() }.phase.load(Ordering::Acquire);
        if phase == FINISHED {
            unsafe { release_storage(self.header) };
        } else {
            tracing::error!("detached sink escaped a panicking connect; slot storage abandoned");
        }
    }
}

/// `begin` 之后的交接：若 Sink 已在 `begin` 期间触发，由启动方销毁槽位。
struct BeginGuard<A: SlotAllocator> {
    header: NonNull<SlotHeader<A>>,
}

impl<A: SlotAllocator> Drop for BeginGuard<A> {
    fn drop(&mut self) {
        // SAFETY: 交换成功前槽位不会被 Sink 销毁。
        let header = unsafe { self.header.as_ref() };
        let destroy = header.destroy;
        let handed_off = header
            .phase
            .compare_exchange(STARTING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !handed_off {
            unsafe { destroy(self.header) };
        }
    }
}

/// 指向槽位头部的所有权凭据，随 Sink 跨线程移动。
struct SlotRef<A: SlotAllocator>(NonNull<SlotHeader<A>>);

// SAFETY: 经由凭据只会访问头部的原子字段与 `Send + Sync` 的分配器；执行记录满足
// `TaskState: Send`，可以在任意驱动线程上被销毁。
unsafe impl<A: SlotAllocator> Send for SlotRef<A> {}

impl<A: SlotAllocator> SlotRef<A> {
    fn finish(self, channel: &'static str) {
        // SAFETY: 本凭据标记终态之前槽位不会被释放；交换之后不再读取头部。
        let header = unsafe { self.0.as_ref() };
        let destroy = header.destroy;
        match header.phase.swap(FINISHED, Ordering::AcqRel) {
            RUNNING => {
                tracing::debug!(channel, "detached task finished");
                unsafe { destroy(self.0) };
            }
            STARTING => tracing::debug!(channel, "detached task finished during begin"),
            _ => {}
        }
    }
}

/// 分离执行的终端 Sink：任一终态都会拆除所属槽位。
pub struct DetachedSink<A: SlotAllocator> {
    allocator: A,
    slot: Option<SlotRef<A>>,
}

impl<A: SlotAllocator> DetachedSink<A> {
    /// 启动时传入的分配器，供需要额外存储的组合子复用。
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    fn finish(mut self, channel: &'static str) {
        if let Some(slot) = self.slot.take() {
            slot.finish(channel);
        }
    }
}

impl<T, E, A> CompletionSink<T, E> for DetachedSink<A>
where
    T: Send + 'static,
    E: fmt::Debug + Send + 'static,
    A: SlotAllocator,
{
    fn on_success(self, _value: T) {
        self.finish("success");
    }

    fn on_failure(self, error: E) {
        tracing::error!(?error, "unhandled failure in detached task; aborting");
        std::process::abort();
    }

    fn on_cancel(self) {
        self.finish("cancel");
    }
}

impl<A: SlotAllocator> Drop for DetachedSink<A> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            tracing::warn!("detached sink dropped without completing; treating as cancelled");
            slot.finish("abandoned");
        }
    }
}
