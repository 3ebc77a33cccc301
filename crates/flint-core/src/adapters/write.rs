use crate::buffer::IoBuffer;
use crate::engine::{AsyncWriteStream, RandomAccessWrite};
use crate::sink::{CompletionSink, deliver};
use crate::task::{Task, TaskState, take_sink};
use std::io;

/// 写完 `buffer`。
///
/// 调用流的 [`AsyncWriteStream::async_write`]，成功负载等于 `buffer.len()`。
pub fn async_write<R: AsyncWriteStream>(stream: &R, buffer: IoBuffer) -> AsyncWrite<R> {
    AsyncWrite {
        stream: stream.clone(),
        buffer,
    }
}

/// 写出至多 `buffer.len()` 字节。
pub fn async_write_some<R: AsyncWriteStream>(stream: &R, buffer: IoBuffer) -> AsyncWriteSome<R> {
    AsyncWriteSome {
        stream: stream.clone(),
        buffer,
    }
}

/// 从 `offset` 起写入至多 `buffer.len()` 字节。
pub fn async_write_some_at<F: RandomAccessWrite>(
    file: &F,
    offset: u64,
    buffer: IoBuffer,
) -> AsyncWriteSomeAt<F> {
    AsyncWriteSomeAt {
        file: file.clone(),
        offset,
        buffer,
    }
}

pub struct AsyncWrite<R> {
    stream: R,
    buffer: IoBuffer,
}

pub struct AsyncWriteState<R, S> {
    stream: R,
    buffer: IoBuffer,
    sink: Option<S>,
}

impl<R: AsyncWriteStream> Task for AsyncWrite<R> {
    type Output = usize;
    type Error = io::Error;
    type State<S>
        = AsyncWriteState<R, S>
    where
        S: CompletionSink<usize, io::Error>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<usize, io::Error>,
    {
        AsyncWriteState {
            stream: self.stream,
            buffer: self.buffer,
            sink: Some(sink),
        }
    }
}

impl<R, S> TaskState for AsyncWriteState<R, S>
where
    R: AsyncWriteStream,
    S: CompletionSink<usize, io::Error>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "write") else {
            return;
        };
        self.stream
            .async_write(self.buffer.clone(), Box::new(move |result| deliver(sink, result)));
    }
}

pub struct AsyncWriteSome<R> {
    stream: R,
    buffer: IoBuffer,
}

pub struct AsyncWriteSomeState<R, S> {
    stream: R,
    buffer: IoBuffer,
    sink: Option<S>,
}

impl<R: AsyncWriteStream> Task for AsyncWriteSome<R> {
    type Output = usize;
    type Error = io::Error;
    type State<S>
        = AsyncWriteSomeState<R, S>
    where
        S: CompletionSink<usize, io::Error>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<usize, io::Error>,
    {
        AsyncWriteSomeState {
            stream: self.stream,
            buffer: self.buffer,
            sink: Some(sink),
        }
    }
}

impl<R, S> TaskState for AsyncWriteSomeState<R, S>
where
    R: AsyncWriteStream,
    S: CompletionSink<usize, io::Error>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "write_some") else {
            return;
        };
        self.stream
            .async_write_some(self.buffer.clone(), Box::new(move |result| deliver(sink, result)));
    }
}

pub struct AsyncWriteSomeAt<F> {
    file: F,
    offset: u64,
    buffer: IoBuffer,
}

pub struct AsyncWriteSomeAtState<F, S> {
    file: F,
    offset: u64,
    buffer: IoBuffer,
    sink: Option<S>,
}

impl<F: RandomAccessWrite> Task for AsyncWriteSomeAt<F> {
    type Output = usize;
    type Error = io::Error;
    type State<S>
        = AsyncWriteSomeAtState<F, S>
    where
        S: CompletionSink<usize, io::Error>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<usize, io::Error>,
    {
        AsyncWriteSomeAtState {
            file: self.file,
            offset: self.offset,
            buffer: self.buffer,
            sink: Some(sink),
        }
    }
}

impl<F, S> TaskState for AsyncWriteSomeAtState<F, S>
where
    F: RandomAccessWrite,
    S: CompletionSink<usize, io::Error>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "write_some_at") else {
            return;
        };
        self.file.async_write_some_at(
            self.offset,
            self.buffer.clone(),
            Box::new(move |result| deliver(sink, result)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Closable;
    use crate::test_stubs::{LoopbackStream, ManualContext, MemoryFile, Recorder};

    #[test]
    fn write_transfers_the_whole_buffer_in_chunks() {
        let ctx = ManualContext::new();
        let (left, right) = LoopbackStream::pair_with_chunk(&ctx, 2);
        let recorder = Recorder::<usize, io::Error>::new();
        let mut state = async_write(&left, IoBuffer::from("hello")).connect(recorder.sink());
        state.begin();
        ctx.run_pending();

        assert_eq!(recorder.successes(), vec![5]);
        assert_eq!(right.drain_inbound(), b"hello");
    }

    #[test]
    fn write_some_stops_at_one_chunk() {
        let ctx = ManualContext::new();
        let (left, right) = LoopbackStream::pair_with_chunk(&ctx, 3);
        let recorder = Recorder::<usize, io::Error>::new();
        let mut state = async_write_some(&left, IoBuffer::from("abcdef")).connect(recorder.sink());
        state.begin();
        ctx.run_pending();
        assert_eq!(recorder.successes(), vec![3]);
        assert_eq!(right.drain_inbound(), b"abc");
    }

    #[test]
    fn write_on_a_closed_stream_fails() {
        let ctx = ManualContext::new();
        let (left, _right) = LoopbackStream::pair(&ctx);
        left.close().expect("close");
        let recorder = Recorder::<usize, io::Error>::new();
        let mut state = async_write(&left, IoBuffer::from("late")).connect(recorder.sink());
        state.begin();
        ctx.run_pending();
        assert_eq!(recorder.failure_kinds(), vec![io::ErrorKind::NotConnected]);
    }

    #[test]
    fn write_some_at_extends_the_file() {
        let ctx = ManualContext::new();
        let file = MemoryFile::from_bytes(&ctx, b"abc");
        let recorder = Recorder::<usize, io::Error>::new();
        let mut state =
            async_write_some_at(&file, 5, IoBuffer::from("xy")).connect(recorder.sink());
        state.begin();
        ctx.run_pending();
        assert_eq!(recorder.successes(), vec![2]);
        assert_eq!(file.contents(), b"abc\0\0xy");
    }
}
