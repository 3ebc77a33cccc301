//! 回调式字节流套接字的通用实现。
//!
//! # 设计背景（Why）
//! - TCP、本地域套接字、内存双工流与 TLS 会话共享同一套“读写各一个方向、回调恰好一次”
//!   的语义，差异只在底层 IO 类型；
//! - 每个方向的半流被在途操作“借出”，操作结束后归还：同方向的并发操作立即以
//!   `flint.tokio.stream_busy` 失败，而不是在锁上排队。
//!
//! # 契约说明（What）
//! - 未连接的套接字上的读写以 `flint.tokio.stream_unopened` 失败，已关闭的以
//!   `flint.tokio.stream_closed` 失败，两者均为 `NotConnected`；
//! - 同步 `close` 丢弃空闲的半流并中止在途操作（`flint.tokio.stream_aborted`）；
//! - 整块读写原生实现：读使用 `read_exact`，写使用 `write_all` 后 `flush`。
//!
//! # 风险提示（Trade-offs）
//! - 读写经由临时缓冲区拷贝进出 [`IoBuffer`]，换来回调期间不跨 `.await` 持有缓冲区锁。

use crate::context::IoExecutor;
use crate::error::{
    STREAM_ABORTED, STREAM_BUSY, STREAM_CLOSED, STREAM_UNOPENED, engine_error,
};
use flint_core::{AsyncReadStream, AsyncWriteStream, Callback, Closable, ExecutionContext, IoBuffer};
use parking_lot::Mutex;
use std::future::Future;
use std::io;
use std::mem;
use std::sync::Arc;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf, split,
};
use tokio::sync::watch;

/// 可承载于 [`StreamSocket`] 的底层 IO 类型。
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Transport for T {}

/// 回调式字节流套接字句柄。克隆引用同一套接字。
pub struct StreamSocket<IO> {
    executor: IoExecutor,
    inner: Arc<Mutex<Halves<IO>>>,
}

impl<IO> Clone for StreamSocket<IO> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    Unopened,
    Open,
    Closed,
}

enum Slot<H> {
    Idle(H),
    Busy,
    Gone,
}

struct Halves<IO> {
    lifecycle: Lifecycle,
    generation: u64,
    read: Slot<ReadHalf<IO>>,
    write: Slot<WriteHalf<IO>>,
    aborted: watch::Sender<bool>,
}

type SlotFn<IO, H> = fn(&mut Halves<IO>) -> &mut Slot<H>;

fn read_slot<IO>(halves: &mut Halves<IO>) -> &mut Slot<ReadHalf<IO>> {
    &mut halves.read
}

fn write_slot<IO>(halves: &mut Halves<IO>) -> &mut Slot<WriteHalf<IO>> {
    &mut halves.write
}

async fn wait_aborted(aborted: &mut watch::Receiver<bool>) {
    // 发送端被替换（重新连接）同样视为中止。
    let _ = aborted.wait_for(|closed| *closed).await;
}

struct Checkout<H> {
    half: H,
    generation: u64,
    aborted: watch::Receiver<bool>,
}

impl<IO: Transport> StreamSocket<IO> {
    /// 尚未连接的套接字。
    pub(crate) fn unopened(executor: &IoExecutor) -> Self {
        Self {
            executor: executor.clone(),
            inner: Arc::new(Mutex::new(Halves {
                lifecycle: Lifecycle::Unopened,
                generation: 0,
                read: Slot::Gone,
                write: Slot::Gone,
                aborted: watch::channel(false).0,
            })),
        }
    }

    /// 接管已连接的 IO。
    pub fn from_io(executor: &IoExecutor, io: IO) -> Self {
        let socket = Self::unopened(executor);
        socket.install(io);
        socket
    }

    /// 以新连接替换当前连接；旧连接上的在途操作被中止。
    pub(crate) fn install(&self, io: IO) {
        let (read, write) = split(io);
        let (old_read, old_write) = {
            let mut halves = self.inner.lock();
            halves.aborted.send_replace(true);
            halves.aborted = watch::channel(false).0;
            halves.lifecycle = Lifecycle::Open;
            halves.generation += 1;
            (
                mem::replace(&mut halves.read, Slot::Idle(read)),
                mem::replace(&mut halves.write, Slot::Idle(write)),
            )
        };
        drop((old_read, old_write));
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().lifecycle == Lifecycle::Open
    }

    /// 取回底层 IO 并让套接字回到未连接状态；任一方向在途时以繁忙错误失败。
    pub fn take_stream(&self) -> io::Result<IO> {
        let mut halves = self.inner.lock();
        Self::ensure_open(halves.lifecycle)?;
        match (
            mem::replace(&mut halves.read, Slot::Gone),
            mem::replace(&mut halves.write, Slot::Gone),
        ) {
            (Slot::Idle(read), Slot::Idle(write)) => {
                halves.lifecycle = Lifecycle::Unopened;
                halves.generation += 1;
                Ok(read.unsplit(write))
            }
            (read, write) => {
                halves.read = read;
                halves.write = write;
                Err(engine_error(STREAM_BUSY, io::ErrorKind::WouldBlock))
            }
        }
    }

    pub(crate) fn executor(&self) -> &IoExecutor {
        &self.executor
    }

    fn ensure_open(lifecycle: Lifecycle) -> io::Result<()> {
        match lifecycle {
            Lifecycle::Open => Ok(()),
            Lifecycle::Unopened => Err(engine_error(STREAM_UNOPENED, io::ErrorKind::NotConnected)),
            Lifecycle::Closed => Err(engine_error(STREAM_CLOSED, io::ErrorKind::NotConnected)),
        }
    }

    fn checkout<H>(&self, slot: SlotFn<IO, H>) -> io::Result<Checkout<H>> {
        let mut halves = self.inner.lock();
        Self::ensure_open(halves.lifecycle)?;
        let generation = halves.generation;
        let aborted = halves.aborted.subscribe();
        match mem::replace(slot(&mut *halves), Slot::Busy) {
            Slot::Idle(half) => Ok(Checkout {
                half,
                generation,
                aborted,
            }),
            other => {
                *slot(&mut *halves) = other;
                Err(engine_error(STREAM_BUSY, io::ErrorKind::WouldBlock))
            }
        }
    }

    fn checkin<H>(&self, slot: SlotFn<IO, H>, generation: u64, half: H) {
        let stale = {
            let mut halves = self.inner.lock();
            let current = halves.generation == generation && halves.lifecycle == Lifecycle::Open;
            let target = slot(&mut *halves);
            if current && matches!(target, Slot::Busy) {
                *target = Slot::Idle(half);
                None
            } else {
                Some(half)
            }
        };
        drop(stale);
    }

    fn start<H, F, Fut>(&self, slot: SlotFn<IO, H>, callback: Callback<usize>, op: F)
    where
        H: Send + 'static,
        F: FnOnce(H) -> Fut + Send + 'static,
        Fut: Future<Output = (H, io::Result<usize>)> + Send + 'static,
    {
        let checkout = match self.checkout(slot) {
            Ok(checkout) => checkout,
            Err(error) => {
                self.executor.post(Box::new(move || callback(Err(error))));
                return;
            }
        };
        let socket = self.clone();
        self.executor.spawn_op(async move {
            let Checkout {
                half,
                generation,
                mut aborted,
            } = checkout;
            tokio::select! {
                (half, result) = op(half) => {
                    socket.checkin(slot, generation, half);
                    callback(result);
                }
                () = wait_aborted(&mut aborted) => {
                    callback(Err(engine_error(STREAM_ABORTED, io::ErrorKind::ConnectionAborted)));
                }
            }
        });
    }

    /// 同步关闭：丢弃空闲半流并中止在途操作。
    pub(crate) fn close_now(&self) {
        let released = {
            let mut halves = self.inner.lock();
            if halves.lifecycle == Lifecycle::Open {
                halves.lifecycle = Lifecycle::Closed;
            }
            halves.aborted.send_replace(true);
            (
                mem::replace(&mut halves.read, Slot::Gone),
                mem::replace(&mut halves.write, Slot::Gone),
            )
        };
        drop(released);
    }

    /// 先关闭写方向（分层传输借此发送关闭通知），再同步关闭。
    pub(crate) fn shutdown_then_close(&self, callback: Callback<()>) {
        let checkout = match self.checkout(write_slot::<IO>) {
            Ok(checkout) => checkout,
            Err(error) => {
                tracing::debug!(%error, "graceful shutdown skipped");
                self.close_now();
                self.executor.post(Box::new(move || callback(Ok(()))));
                return;
            }
        };
        let socket = self.clone();
        self.executor.spawn_op(async move {
            let mut half = checkout.half;
            let result = half.shutdown().await;
            drop(half);
            socket.close_now();
            callback(result);
        });
    }
}

impl<IO: Transport> AsyncReadStream for StreamSocket<IO> {
    fn async_read_some(&self, buffer: IoBuffer, callback: Callback<usize>) {
        self.start(read_slot::<IO>, callback, move |mut half: ReadHalf<IO>| async move {
            let mut scratch = vec![0u8; buffer.len()];
            let result = half
                .read(&mut scratch)
                .await
                .map(|n| buffer.copy_in(&scratch[..n]));
            (half, result)
        });
    }

    fn async_read(&self, buffer: IoBuffer, callback: Callback<usize>) {
        self.start(read_slot::<IO>, callback, move |mut half: ReadHalf<IO>| async move {
            let mut scratch = vec![0u8; buffer.len()];
            let result = half
                .read_exact(&mut scratch)
                .await
                .map(|_| buffer.copy_in(&scratch));
            (half, result)
        });
    }
}

impl<IO: Transport> AsyncWriteStream for StreamSocket<IO> {
    fn async_write_some(&self, buffer: IoBuffer, callback: Callback<usize>) {
        self.start(write_slot::<IO>, callback, move |mut half: WriteHalf<IO>| async move {
            let bytes = buffer.to_vec();
            let result = match half.write(&bytes).await {
                Ok(n) => half.flush().await.map(|()| n),
                Err(error) => Err(error),
            };
            (half, result)
        });
    }

    fn async_write(&self, buffer: IoBuffer, callback: Callback<usize>) {
        self.start(write_slot::<IO>, callback, move |mut half: WriteHalf<IO>| async move {
            let bytes = buffer.to_vec();
            let result = match half.write_all(&bytes).await {
                Ok(()) => half.flush().await.map(|()| bytes.len()),
                Err(error) => Err(error),
            };
            (half, result)
        });
    }
}

impl<IO: Transport> Closable for StreamSocket<IO> {
    fn close(&self) -> io::Result<()> {
        self.close_now();
        Ok(())
    }
}
