use super::context::ManualContext;
use crate::buffer::IoBuffer;
use crate::engine::{
    Acceptor, Callback, Closable, Connectable, ExecutionContext, Handshake, RandomAccessRead,
    RandomAccessWrite, Resolver,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 排队中的引擎回调，由测试显式完成。
pub struct CallbackQueue<T> {
    inner: Arc<Mutex<VecDeque<Callback<T>>>>,
}

impl<T> Clone for CallbackQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for CallbackQueue<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl<T> CallbackQueue<T> {
    pub fn push(&self, callback: Callback<T>) {
        self.inner.lock().push_back(callback);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 以 `result` 完成最早登记的回调；队列为空时返回 `false`。
    pub fn complete_next(&self, result: io::Result<T>) -> bool {
        let next = self.inner.lock().pop_front();
        match next {
            Some(callback) => {
                callback(result);
                true
            }
            None => false,
        }
    }

    /// 不触发地丢弃全部回调，模拟引擎销毁资源，返回丢弃的数量。
    pub fn abandon_all(&self) -> usize {
        let abandoned: Vec<_> = self.inner.lock().drain(..).collect();
        abandoned.len()
    }
}

macro_rules! delegate_queue {
    ($ty:ident<$param:ident>, $payload:ty) => {
        impl<$param> $ty<$param> {
            /// 挂起的回调数量。
            pub fn pending(&self) -> usize {
                self.queue.len()
            }

            pub fn complete_next(&self, result: io::Result<$payload>) -> bool {
                self.queue.complete_next(result)
            }

            pub fn abandon_all(&self) -> usize {
                self.queue.abandon_all()
            }
        }
    };
}

/// 脚本化监听器，连接类型由测试选择。
pub struct ScriptedAcceptor<C> {
    queue: CallbackQueue<C>,
}

impl<C> Clone for ScriptedAcceptor<C> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<C> ScriptedAcceptor<C> {
    pub fn new() -> Self {
        Self {
            queue: CallbackQueue::default(),
        }
    }
}

delegate_queue!(ScriptedAcceptor<C>, C);

impl<C: Send + 'static> Acceptor for ScriptedAcceptor<C> {
    type Connection = C;

    fn async_accept(&self, callback: Callback<C>) {
        self.queue.push(callback);
    }
}

/// 脚本化建连流，记录每次收到的端点集合。
pub struct ScriptedConnector<E> {
    attempts: Arc<Mutex<Vec<Vec<E>>>>,
    queue: CallbackQueue<E>,
}

impl<E> Clone for ScriptedConnector<E> {
    fn clone(&self) -> Self {
        Self {
            attempts: Arc::clone(&self.attempts),
            queue: self.queue.clone(),
        }
    }
}

impl<E: Clone> ScriptedConnector<E> {
    pub fn new() -> Self {
        Self {
            attempts: Arc::default(),
            queue: CallbackQueue::default(),
        }
    }

    pub fn attempts(&self) -> Vec<Vec<E>> {
        self.attempts.lock().clone()
    }
}

delegate_queue!(ScriptedConnector<E>, E);

impl<E: Clone + Send + Sync + 'static> Connectable for ScriptedConnector<E> {
    type Endpoint = E;

    fn async_connect(&self, endpoints: Vec<E>, callback: Callback<E>) {
        self.attempts.lock().push(endpoints);
        self.queue.push(callback);
    }
}

/// 脚本化解析器，记录每次查询。
pub struct ScriptedResolver<E> {
    queries: Mutex<Vec<(String, String)>>,
    queue: CallbackQueue<Vec<E>>,
}

impl<E> ScriptedResolver<E> {
    pub fn new() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            queue: CallbackQueue::default(),
        }
    }

    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().clone()
    }
}

delegate_queue!(ScriptedResolver<E>, Vec<E>);

impl<E: Send + 'static> Resolver for ScriptedResolver<E> {
    type Endpoint = E;

    fn async_resolve(&self, host: String, service: String, callback: Callback<Vec<E>>) {
        self.queries.lock().push((host, service));
        self.queue.push(callback);
    }
}

/// 脚本化分层传输，记录握手参数。
pub struct ScriptedHandshake<A> {
    args: Arc<Mutex<Vec<A>>>,
    queue: CallbackQueue<()>,
}

impl<A> Clone for ScriptedHandshake<A> {
    fn clone(&self) -> Self {
        Self {
            args: Arc::clone(&self.args),
            queue: self.queue.clone(),
        }
    }
}

impl<A: Clone> ScriptedHandshake<A> {
    pub fn new() -> Self {
        Self {
            args: Arc::default(),
            queue: CallbackQueue::default(),
        }
    }

    pub fn args(&self) -> Vec<A> {
        self.args.lock().clone()
    }
}

delegate_queue!(ScriptedHandshake<A>, ());

impl<A: Send + 'static> Handshake for ScriptedHandshake<A> {
    type Args = A;

    fn async_handshake(&self, args: A, callback: Callback<()>) {
        self.args.lock().push(args);
        self.queue.push(callback);
    }
}

/// 具备原生异步关闭的脚本化资源。
#[derive(Clone, Default)]
pub struct NativeCloser {
    sync_closes: Arc<AtomicUsize>,
    queue: CallbackQueue<()>,
}

impl NativeCloser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同步 `close` 被调用的次数。
    pub fn sync_closes(&self) -> usize {
        self.sync_closes.load(Ordering::SeqCst)
    }

    pub fn complete_next(&self, result: io::Result<()>) -> bool {
        self.queue.complete_next(result)
    }
}

impl Closable for NativeCloser {
    const ASYNC_CLOSE: bool = true;

    fn close(&self) -> io::Result<()> {
        self.sync_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn async_close(&self, callback: Callback<()>) {
        self.queue.push(callback);
    }
}

/// 内存文件：按偏移读写，完成投递到上下文。越过末尾的读取得到 `0` 字节；
/// 越过末尾的写入以零字节填充空洞。
#[derive(Clone)]
pub struct MemoryFile {
    context: ManualContext,
    data: Arc<Mutex<Vec<u8>>>,
}

impl MemoryFile {
    pub fn from_bytes(context: &ManualContext, bytes: &[u8]) -> Self {
        Self {
            context: context.clone(),
            data: Arc::new(Mutex::new(bytes.to_vec())),
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().clone()
    }
}

impl RandomAccessRead for MemoryFile {
    fn async_read_some_at(&self, offset: u64, buffer: IoBuffer, callback: Callback<usize>) {
        let n = {
            let data = self.data.lock();
            match usize::try_from(offset) {
                Ok(start) if start < data.len() => buffer.copy_in(&data[start..]),
                _ => 0,
            }
        };
        self.context.post(Box::new(move || callback(Ok(n))));
    }
}

impl RandomAccessWrite for MemoryFile {
    fn async_write_some_at(&self, offset: u64, buffer: IoBuffer, callback: Callback<usize>) {
        let result = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))
            .map(|start| {
                let mut data = self.data.lock();
                let bytes = buffer.to_vec();
                let end = start + bytes.len();
                if data.len() < end {
                    data.resize(end, 0);
                }
                data[start..end].copy_from_slice(&bytes);
                bytes.len()
            });
        self.context.post(Box::new(move || callback(result)));
    }
}
