use crate::engine::Handshake;
use crate::sink::{CompletionSink, deliver};
use crate::task::{Task, TaskState, take_sink};
use std::io;

/// 在分层传输上执行握手。
pub fn async_handshake<H: Handshake>(stream: &H, args: H::Args) -> AsyncHandshake<H> {
    AsyncHandshake {
        stream: stream.clone(),
        args,
    }
}

pub struct AsyncHandshake<H: Handshake> {
    stream: H,
    args: H::Args,
}

pub struct AsyncHandshakeState<H: Handshake, S> {
    stream: H,
    args: Option<H::Args>,
    sink: Option<S>,
}

impl<H: Handshake> Task for AsyncHandshake<H> {
    type Output = ();
    type Error = io::Error;
    type State<S>
        = AsyncHandshakeState<H, S>
    where
        S: CompletionSink<(), io::Error>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<(), io::Error>,
    {
        AsyncHandshakeState {
            stream: self.stream,
            args: Some(self.args),
            sink: Some(sink),
        }
    }
}

impl<H, S> TaskState for AsyncHandshakeState<H, S>
where
    H: Handshake,
    S: CompletionSink<(), io::Error>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "handshake") else {
            return;
        };
        let Some(args) = self.args.take() else {
            return;
        };
        self.stream
            .async_handshake(args, Box::new(move |result| deliver(sink, result)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_stubs::{Recorder, ScriptedHandshake};

    #[test]
    fn forwards_arguments_and_reports_unit_success() {
        let stream = ScriptedHandshake::<&'static str>::new();
        let recorder = Recorder::<(), io::Error>::new();
        let mut state = async_handshake(&stream, "client").connect(recorder.sink());
        state.begin();
        assert_eq!(stream.args(), vec!["client"]);

        stream.complete_next(Ok(()));
        assert_eq!(recorder.successes(), vec![()]);
        assert_eq!(recorder.fired(), 1);
    }

    #[test]
    fn handshake_failure_is_forwarded() {
        let stream = ScriptedHandshake::<&'static str>::new();
        let recorder = Recorder::<(), io::Error>::new();
        let mut state = async_handshake(&stream, "server").connect(recorder.sink());
        state.begin();
        stream.complete_next(Err(io::ErrorKind::InvalidData.into()));
        assert_eq!(recorder.failure_kinds(), vec![io::ErrorKind::InvalidData]);
    }
}
