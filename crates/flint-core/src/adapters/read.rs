use crate::buffer::IoBuffer;
use crate::engine::{AsyncReadStream, RandomAccessRead};
use crate::sink::{CompletionSink, deliver};
use crate::task::{Task, TaskState, take_sink};
use std::io;

/// 读满 `buffer`。
///
/// 调用流的 [`AsyncReadStream::async_read`]：原生整块读取的流直接完成，其余流由引擎的
/// 传输辅助循环推进。未读满即遇到流结束时以 `UnexpectedEof` 失败。
pub fn async_read<R: AsyncReadStream>(stream: &R, buffer: IoBuffer) -> AsyncRead<R> {
    AsyncRead {
        stream: stream.clone(),
        buffer,
    }
}

/// 读取至多 `buffer.len()` 字节。
pub fn async_read_some<R: AsyncReadStream>(stream: &R, buffer: IoBuffer) -> AsyncReadSome<R> {
    AsyncReadSome {
        stream: stream.clone(),
        buffer,
    }
}

/// 从 `offset` 起读取至多 `buffer.len()` 字节。
pub fn async_read_some_at<F: RandomAccessRead>(
    file: &F,
    offset: u64,
    buffer: IoBuffer,
) -> AsyncReadSomeAt<F> {
    AsyncReadSomeAt {
        file: file.clone(),
        offset,
        buffer,
    }
}

pub struct AsyncRead<R> {
    stream: R,
    buffer: IoBuffer,
}

pub struct AsyncReadState<R, S> {
    stream: R,
    buffer: IoBuffer,
    sink: Option<S>,
}

impl<R: AsyncReadStream> Task for AsyncRead<R> {
    type Output = usize;
    type Error = io::Error;
    type State<S>
        = AsyncReadState<R, S>
    where
        S: CompletionSink<usize, io::Error>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<usize, io::Error>,
    {
        AsyncReadState {
            stream: self.stream,
            buffer: self.buffer,
            sink: Some(sink),
        }
    }
}

impl<R, S> TaskState for AsyncReadState<R, S>
where
    R: AsyncReadStream,
    S: CompletionSink<usize, io::Error>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "read") else {
            return;
        };
        self.stream
            .async_read(self.buffer.clone(), Box::new(move |result| deliver(sink, result)));
    }
}

pub struct AsyncReadSome<R> {
    stream: R,
    buffer: IoBuffer,
}

pub struct AsyncReadSomeState<R, S> {
    stream: R,
    buffer: IoBuffer,
    sink: Option<S>,
}

impl<R: AsyncReadStream> Task for AsyncReadSome<R> {
    type Output = usize;
    type Error = io::Error;
    type State<S>
        = AsyncReadSomeState<R, S>
    where
        S: CompletionSink<usize, io::Error>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<usize, io::Error>,
    {
        AsyncReadSomeState {
            stream: self.stream,
            buffer: self.buffer,
            sink: Some(sink),
        }
    }
}

impl<R, S> TaskState for AsyncReadSomeState<R, S>
where
    R: AsyncReadStream,
    S: CompletionSink<usize, io::Error>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "read_some") else {
            return;
        };
        self.stream
            .async_read_some(self.buffer.clone(), Box::new(move |result| deliver(sink, result)));
    }
}

pub struct AsyncReadSomeAt<F> {
    file: F,
    offset: u64,
    buffer: IoBuffer,
}

pub struct AsyncReadSomeAtState<F, S> {
    file: F,
    offset: u64,
    buffer: IoBuffer,
    sink: Option<S>,
}

impl<F: RandomAccessRead> Task for AsyncReadSomeAt<F> {
    type Output = usize;
    type Error = io::Error;
    type State<S>
        = AsyncReadSomeAtState<F, S>
    where
        S: CompletionSink<usize, io::Error>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<usize, io::Error>,
    {
        AsyncReadSomeAtState {
            file: self.file,
            offset: self.offset,
            buffer: self.buffer,
            sink: Some(sink),
        }
    }
}

impl<F, S> TaskState for AsyncReadSomeAtState<F, S>
where
    F: RandomAccessRead,
    S: CompletionSink<usize, io::Error>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "read_some_at") else {
            return;
        };
        self.file.async_read_some_at(
            self.offset,
            self.buffer.clone(),
            Box::new(move |result| deliver(sink, result)),
        );
    }
}
