//! 外部异步引擎的消费接口。
//!
//! # 契约声明
//! * **单次回调：** 每个 `async_*` 入口接收一个 [`Callback`]，引擎保证恰好调用一次；
//! * **不阻塞：** 入口只登记动作并立即返回，回调在执行上下文的驱动线程上运行；
//! * **句柄语义：** 资源类型均为可克隆句柄，克隆即引用同一资源；资源寿命由调用方负责。
//!
//! 能力差异在类型层面决议：流是否原生整块读写由是否覆写
//! [`AsyncReadStream::async_read`] / [`AsyncWriteStream::async_write`] 决定，是否具备原生
//! 异步关闭由 [`Closable::ASYNC_CLOSE`] 声明。

pub mod transfer;

use crate::buffer::IoBuffer;
use std::io;
use std::time::{Duration, Instant};

/// 引擎的一次性完成回调。
pub type Callback<T> = Box<dyn FnOnce(io::Result<T>) + Send + 'static>;

/// 投递到执行上下文的零参数作业。
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// 定时器等待的完成回调。
pub type WaitCallback = Box<dyn FnOnce(Result<(), WaitError>) + Send + 'static>;

/// 定时器等待的非成功结局。
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// 等待在到期前被中止：定时器被取消、重新设定到期时间或被销毁。
    #[error("timer wait aborted")]
    Aborted,
    /// 定时器驱动报告的其他错误。
    #[error("timer driver error: {0}")]
    Driver(#[source] io::Error),
}

/// 执行上下文：事件循环式反应器的句柄。
///
/// # 契约说明（What）
/// - `post`：作业稍后在驱动线程上运行，绝不在 `post` 调用内同步执行；
/// - `make_timer`：创建绑定到本上下文的新定时器；
/// - `now`：上下文时钟（单调）；
/// - `same_context`：两个句柄是否指向同一上下文实例。
pub trait ExecutionContext: Clone + Send + Sync + 'static {
    type Timer: WaitableTimer;

    fn post(&self, job: Job);

    fn make_timer(&self) -> Self::Timer;

    fn now(&self) -> Instant;

    fn same_context(&self, other: &Self) -> bool;
}

/// 可等待定时器。
///
/// 重新设定到期时间会中止所有挂起的等待；最后一个句柄被丢弃时同样中止挂起等待。
pub trait WaitableTimer: Clone + Send + Sync + 'static {
    fn expires_at(&self, deadline: Instant);

    fn expires_after(&self, duration: Duration);

    fn async_wait(&self, callback: WaitCallback);

    /// 中止所有挂起的等待，返回被中止的数量。
    fn cancel(&self) -> usize;
}

/// 接受入站连接的监听器。
///
/// 成功负载类型由监听器的协议族决定（TCP、本地域套接字等），适配器无需改动即可复用。
pub trait Acceptor: Clone + Send + Sync + 'static {
    type Connection: Send + 'static;

    fn async_accept(&self, callback: Callback<Self::Connection>);
}

/// 可主动建连的流。
///
/// `async_connect` 按顺序尝试端点，成功时回调已连接的端点，全部失败时回调最后一个错误。
pub trait Connectable: Clone + Send + Sync + 'static {
    type Endpoint: Clone + Send + 'static;

    fn async_connect(&self, endpoints: Vec<Self::Endpoint>, callback: Callback<Self::Endpoint>);
}

/// 域名解析器。
pub trait Resolver: Send + Sync + 'static {
    type Endpoint: Send + 'static;

    /// 解析 `host` + `service`，成功时按解析器给出的顺序返回端点列表。
    fn async_resolve(&self, host: String, service: String, callback: Callback<Vec<Self::Endpoint>>);
}

/// 字节流读方向。
pub trait AsyncReadStream: Clone + Send + Sync + 'static {
    /// 读取至多 `buffer.len()` 字节；对端关闭时以 `Ok(0)` 回调。
    fn async_read_some(&self, buffer: IoBuffer, callback: Callback<usize>);

    /// 读满整个缓冲区。
    ///
    /// 默认委托给引擎的 [`transfer::read_full`]；原生整块读取的流应覆写此方法。
    /// 未读满即遇到流结束时以 `UnexpectedEof` 失败。
    fn async_read(&self, buffer: IoBuffer, callback: Callback<usize>) {
        transfer::read_full(self, buffer, callback);
    }
}

/// 字节流写方向。
pub trait AsyncWriteStream: Clone + Send + Sync + 'static {
    /// 写出至多 `buffer.len()` 字节。
    fn async_write_some(&self, buffer: IoBuffer, callback: Callback<usize>);

    /// 写完整个缓冲区。
    ///
    /// 默认委托给引擎的 [`transfer::write_full`]；原生整块写出的流应覆写此方法。
    fn async_write(&self, buffer: IoBuffer, callback: Callback<usize>) {
        transfer::write_full(self, buffer, callback);
    }
}

/// 按偏移随机读取的资源（文件等）。
pub trait RandomAccessRead: Clone + Send + Sync + 'static {
    fn async_read_some_at(&self, offset: u64, buffer: IoBuffer, callback: Callback<usize>);
}

/// 按偏移随机写入的资源。
pub trait RandomAccessWrite: Clone + Send + Sync + 'static {
    fn async_write_some_at(&self, offset: u64, buffer: IoBuffer, callback: Callback<usize>);
}

/// 分层传输的握手能力。
pub trait Handshake: Clone + Send + Sync + 'static {
    /// 握手参数（角色、期望的对端名称等）。
    type Args: Send + 'static;

    fn async_handshake(&self, args: Self::Args, callback: Callback<()>);
}

/// 可关闭的资源。
///
/// # 契约说明（What）
/// - `close` 为必备的同步关闭；
/// - `ASYNC_CLOSE` 为 `true` 时资源提供原生 [`async_close`](Self::async_close)（如发送
///   关闭通知的分层传输），关闭适配器直接调用它；
/// - `ASYNC_CLOSE` 为 `false` 时关闭适配器把同步 `close` 投递到执行上下文上执行。
pub trait Closable: Clone + Send + Sync + 'static {
    const ASYNC_CLOSE: bool = false;

    fn close(&self) -> io::Result<()>;

    fn async_close(&self, callback: Callback<()>) {
        callback(self.close());
    }
}
