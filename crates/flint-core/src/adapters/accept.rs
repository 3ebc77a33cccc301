use crate::engine::Acceptor;
use crate::sink::{CompletionSink, deliver};
use crate::task::{Task, TaskState, take_sink};
use std::io;

/// 接受一个入站连接。
///
/// 成功负载为监听器的 [`Acceptor::Connection`]。
pub fn async_accept<A: Acceptor>(acceptor: &A) -> AsyncAccept<A> {
    AsyncAccept {
        acceptor: acceptor.clone(),
    }
}

pub struct AsyncAccept<A> {
    acceptor: A,
}

pub struct AsyncAcceptState<A, S> {
    acceptor: A,
    sink: Option<S>,
}

impl<A: Acceptor> Task for AsyncAccept<A> {
    type Output = A::Connection;
    type Error = io::Error;
    type State<S>
        = AsyncAcceptState<A, S>
    where
        S: CompletionSink<A::Connection, io::Error>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<A::Connection, io::Error>,
    {
        AsyncAcceptState {
            acceptor: self.acceptor,
            sink: Some(sink),
        }
    }
}

impl<A, S> TaskState for AsyncAcceptState<A, S>
where
    A: Acceptor,
    S: CompletionSink<A::Connection, io::Error>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "accept") else {
            return;
        };
        self.acceptor
            .async_accept(Box::new(move |result| deliver(sink, result)));
    }
}
