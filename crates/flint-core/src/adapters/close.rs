use crate::engine::{Closable, ExecutionContext};
use crate::sink::{CompletionSink, deliver};
use crate::task::{Task, TaskState, take_sink};
use std::io;

/// 关闭路径，由资源类型的 [`Closable::ASYNC_CLOSE`] 在构造时决定。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseMode {
    /// 调用资源的原生 `async_close`。
    Native,
    /// 把同步 `close` 投递到执行上下文上执行。
    Posted,
}

impl CloseMode {
    pub const fn of<R: Closable>() -> Self {
        if R::ASYNC_CLOSE {
            CloseMode::Native
        } else {
            CloseMode::Posted
        }
    }
}

/// 关闭资源。
///
/// 无论哪条路径，成功或失败恰好触发一次，且资源最终处于关闭状态。`context` 只在
/// [`CloseMode::Posted`] 路径上使用。
pub fn async_close<R, C>(stream: &R, context: &C) -> AsyncClose<R, C>
where
    R: Closable,
    C: ExecutionContext,
{
    AsyncClose {
        stream: stream.clone(),
        context: context.clone(),
        mode: CloseMode::of::<R>(),
    }
}

pub struct AsyncClose<R, C> {
    stream: R,
    context: C,
    mode: CloseMode,
}

impl<R, C> AsyncClose<R, C> {
    pub fn mode(&self) -> CloseMode {
        self.mode
    }
}

pub struct AsyncCloseState<R, C, S> {
    stream: R,
    context: C,
    mode: CloseMode,
    sink: Option<S>,
}

impl<R, C> Task for AsyncClose<R, C>
where
    R: Closable,
    C: ExecutionContext,
{
    type Output = ();
    type Error = io::Error;
    type State<S>
        = AsyncCloseState<R, C, S>
    where
        S: CompletionSink<(), io::Error>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<(), io::Error>,
    {
        AsyncCloseState {
            stream: self.stream,
            context: self.context,
            mode: self.mode,
            sink: Some(sink),
        }
    }
}

impl<R, C, S> TaskState for AsyncCloseState<R, C, S>
where
    R: Closable,
    C: ExecutionContext,
    S: CompletionSink<(), io::Error>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "close") else {
            return;
        };
        match self.mode {
            CloseMode::Native => self
                .stream
                .async_close(Box::new(move |result| deliver(sink, result))),
            CloseMode::Posted => {
                let stream = self.stream.clone();
                self.context
                    .post(Box::new(move || deliver(sink, stream.close())));
            }
        }
    }
}
