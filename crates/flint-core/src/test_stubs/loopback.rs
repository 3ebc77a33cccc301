use super::context::ManualContext;
use crate::buffer::IoBuffer;
use crate::engine::{AsyncReadStream, AsyncWriteStream, Callback, Closable, ExecutionContext};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

/// 内存回环字节流的一端。
///
/// # 契约说明（What）
/// - 一端写入的字节按序出现在另一端；每次 `*_some` 至多搬运 `chunk` 字节，用于模拟短读写；
/// - 所有完成都投递到 [`ManualContext`]，不会在发起调用内同步触发；
/// - 未提供原生异步关闭，`close` 同步关闭本端并向对端发送流结束。
#[derive(Clone)]
pub struct LoopbackStream {
    context: ManualContext,
    inbound: Arc<Pipe>,
    outbound: Arc<Pipe>,
    local: Arc<Mutex<Local>>,
    chunk: usize,
}

#[derive(Default)]
struct Local {
    closed: bool,
    fail_close: Option<io::ErrorKind>,
}

#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
}

#[derive(Default)]
struct PipeState {
    bytes: VecDeque<u8>,
    write_closed: bool,
    reader: Option<(IoBuffer, Callback<usize>)>,
}

impl PipeState {
    fn drain_into(&mut self, buffer: &IoBuffer, chunk: usize) -> usize {
        let n = buffer.len().min(chunk).min(self.bytes.len());
        let bytes: Vec<u8> = self.bytes.drain(..n).collect();
        buffer.copy_in(&bytes)
    }
}

impl LoopbackStream {
    /// 一对相连的端点。
    pub fn pair(context: &ManualContext) -> (Self, Self) {
        Self::pair_with_chunk(context, usize::MAX)
    }

    /// 每次 `*_some` 至多搬运 `chunk` 字节的一对端点。
    pub fn pair_with_chunk(context: &ManualContext, chunk: usize) -> (Self, Self) {
        let a = Arc::new(Pipe::default());
        let b = Arc::new(Pipe::default());
        let chunk = chunk.max(1);
        let left = Self {
            context: context.clone(),
            inbound: Arc::clone(&a),
            outbound: Arc::clone(&b),
            local: Arc::default(),
            chunk,
        };
        let right = Self {
            context: context.clone(),
            inbound: b,
            outbound: a,
            local: Arc::default(),
            chunk,
        };
        (left, right)
    }

    /// 绕过写路径，直接把字节送到对端。
    pub fn inject(&self, bytes: &[u8]) {
        let mut pipe = self.outbound.state.lock();
        pipe.bytes.extend(bytes.iter().copied());
        self.wake_reader(&mut pipe);
    }

    /// 关闭写方向，对端在读完已缓冲的字节后读到 `0`。
    pub fn shutdown_write(&self) {
        let mut pipe = self.outbound.state.lock();
        pipe.write_closed = true;
        self.wake_reader(&mut pipe);
    }

    /// 取走本端尚未被读取的全部入站字节。
    pub fn drain_inbound(&self) -> Vec<u8> {
        self.inbound.state.lock().bytes.drain(..).collect()
    }

    pub fn is_open(&self) -> bool {
        !self.local.lock().closed
    }

    /// 下一次 `close` 以 `kind` 失败（本端仍被关闭）。
    pub fn fail_next_close(&self, kind: io::ErrorKind) {
        self.local.lock().fail_close = Some(kind);
    }

    fn wake_reader(&self, pipe: &mut PipeState) {
        let Some((buffer, callback)) = pipe.reader.take() else {
            return;
        };
        if pipe.bytes.is_empty() && !pipe.write_closed {
            pipe.reader = Some((buffer, callback));
            return;
        }
        let n = pipe.drain_into(&buffer, self.chunk);
        self.context.post(Box::new(move || callback(Ok(n))));
    }

    fn not_connected(&self, callback: Callback<usize>) {
        self.context.post(Box::new(move || {
            callback(Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "loopback endpoint closed",
            )))
        }));
    }
}

impl AsyncReadStream for LoopbackStream {
    fn async_read_some(&self, buffer: IoBuffer, callback: Callback<usize>) {
        if !self.is_open() {
            return self.not_connected(callback);
        }
        let mut pipe = self.inbound.state.lock();
        if pipe.reader.is_some() {
            drop(pipe);
            self.context.post(Box::new(move || {
                callback(Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "loopback read already in flight",
                )))
            }));
            return;
        }
        if buffer.is_empty() || !pipe.bytes.is_empty() || pipe.write_closed {
            let n = pipe.drain_into(&buffer, self.chunk);
            self.context.post(Box::new(move || callback(Ok(n))));
        } else {
            pipe.reader = Some((buffer, callback));
        }
    }
}

impl AsyncWriteStream for LoopbackStream {
    fn async_write_some(&self, buffer: IoBuffer, callback: Callback<usize>) {
        if !self.is_open() {
            return self.not_connected(callback);
        }
        let mut pipe = self.outbound.state.lock();
        if pipe.write_closed {
            drop(pipe);
            self.context.post(Box::new(move || {
                callback(Err(io::ErrorKind::BrokenPipe.into()))
            }));
            return;
        }
        let n = buffer.len().min(self.chunk);
        buffer.with_bytes(|bytes| pipe.bytes.extend(bytes[..n].iter().copied()));
        self.wake_reader(&mut pipe);
        self.context.post(Box::new(move || callback(Ok(n))));
    }
}

impl Closable for LoopbackStream {
    fn close(&self) -> io::Result<()> {
        let fail = {
            let mut local = self.local.lock();
            local.closed = true;
            local.fail_close.take()
        };
        self.shutdown_write();
        let pending = self.inbound.state.lock().reader.take();
        if let Some((_, callback)) = pending {
            self.context.post(Box::new(move || {
                callback(Err(io::ErrorKind::ConnectionAborted.into()))
            }));
        }
        match fail {
            Some(kind) => Err(kind.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskExt, TaskState};
    use crate::test_stubs::Recorder;
    use crate::{async_read, async_read_some, async_write};

    #[test]
    fn ping_pong_between_two_endpoints() {
        let ctx = ManualContext::new();
        let (client, server) = LoopbackStream::pair_with_chunk(&ctx, 2);
        let recorder = Recorder::<Vec<u8>, io::Error>::new();

        let ping_in = IoBuffer::new(4);
        let pong_in = IoBuffer::new(4);
        let (server_tx, client_rx) = (server.clone(), client.clone());
        let (ping_view, pong_view) = (ping_in.clone(), pong_in.clone());
        let mut state = async_write(&client, IoBuffer::from("PING"))
            .let_value(move |_| async_read(&server, ping_in))
            .let_value(move |_| async_write(&server_tx, IoBuffer::from("PONG")))
            .let_value(move |_| async_read(&client_rx, pong_in))
            .then(move |_| pong_view.to_vec())
            .connect(recorder.sink());
        state.begin();
        ctx.run_pending();

        assert_eq!(ping_view.to_vec(), b"PING");
        assert_eq!(recorder.successes(), vec![b"PONG".to_vec()]);
        assert_eq!(recorder.fired(), 1);
    }

    #[test]
    fn pending_read_is_aborted_by_close() {
        let ctx = ManualContext::new();
        let (left, _right) = LoopbackStream::pair(&ctx);
        let recorder = Recorder::<usize, io::Error>::new();
        let mut state = async_read_some(&left, IoBuffer::new(4)).connect(recorder.sink());
        state.begin();
        ctx.run_pending();
        assert_eq!(recorder.fired(), 0);

        left.close().expect("close");
        ctx.run_pending();
        assert_eq!(
            recorder.failure_kinds(),
            vec![io::ErrorKind::ConnectionAborted]
        );
    }
}
