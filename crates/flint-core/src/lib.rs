#![deny(unsafe_code)]
#![doc = r#"
# flint-core

## 设计动机（Why）
- **定位**：把“注册回调、回调恰好触发一次”的异步原语（accept/connect/read/write、
  域名解析、定时器、分层传输的握手与关闭）统一翻译为推送式的
  [`Task`] → [`TaskState`] → [`CompletionSink`] 三段契约；
- **架构角色**：本 crate 只定义契约与适配器，真正的 IO 引擎通过 [`engine`]
  模块中的 Trait 注入（参见 `flint-tokio`）。

## 核心契约（What）
- `connect` 只做构造，不触碰资源；`begin` 发起动作并立即返回；
- 每个被 `begin` 的 [`TaskState`] 恰好触发 `on_success`/`on_failure`/`on_cancel`
  之一，且只触发一次；
- [`detached::run_detached`] 让调用方无需持有句柄即可运行 Task，任意终态都会释放
  槽位；未处理的失败直接终止进程。

## 实现策略（How）
- 适配器把 Sink 移入引擎回调闭包，结果到通道的映射只在闭包内发生一次；
- 原语能力差异（原生整块读写、原生异步关闭）以 Trait 默认方法与关联常量在类型层面
  决议，不做运行期探测。
"#]

pub mod adapters;
pub mod allocator;
pub mod buffer;
pub mod combinator;
pub mod detached;
pub mod engine;
pub mod error;
pub mod future;
pub mod outcome;
pub mod scheduler;
pub mod sink;
pub mod task;
/// 测试桩命名空间：确定性的手动执行上下文、脚本化资源、记录型 Sink 与计数分配器。
///
/// 下游 crate 的集成测试同样复用这些桩，以保证契约断言口径一致。
pub mod test_stubs;

pub use adapters::{
    async_accept, async_close, async_connect, async_handshake, async_read, async_read_some,
    async_read_some_at, async_resolve, async_wait, async_wait_until, async_write,
    async_write_some, async_write_some_at,
};
pub use allocator::{AllocError, BoundedSlots, GlobalSlots, SlotAllocator};
pub use buffer::IoBuffer;
pub use combinator::{Just, LetValue, Then, UponError, just};
pub use detached::{DetachedSink, run_detached};
pub use engine::{
    Acceptor, AsyncReadStream, AsyncWriteStream, Callback, Closable, Connectable,
    ExecutionContext, Handshake, Job, RandomAccessRead, RandomAccessWrite, Resolver, WaitCallback,
    WaitError, WaitableTimer,
};
pub use error::{LaunchError, codes};
pub use future::TaskFuture;
pub use outcome::Outcome;
pub use scheduler::{Schedule, ScheduleAfter, ScheduleAt, Scheduler};
pub use sink::{CompletionSink, FnSink, deliver};
pub use task::{Task, TaskExt, TaskState};

/// 接口版本号：每合入一组契约变更递增一。
pub const API_VERSION: u32 = 3;

/// 形如 `flint/3` 的版本标识，便于日志与握手元数据引用。
pub const VERSION_STRING: &str = "flint/3";
