use crate::engine::Connectable;
use crate::sink::{CompletionSink, deliver};
use crate::task::{Task, TaskState, take_sink};
use std::io;

/// 依次尝试 `endpoints` 建立连接，成功负载为实际连上的端点。
pub fn async_connect<C: Connectable>(
    stream: &C,
    endpoints: impl IntoIterator<Item = C::Endpoint>,
) -> AsyncConnect<C> {
    AsyncConnect {
        stream: stream.clone(),
        endpoints: endpoints.into_iter().collect(),
    }
}

pub struct AsyncConnect<C: Connectable> {
    stream: C,
    endpoints: Vec<C::Endpoint>,
}

pub struct AsyncConnectState<C: Connectable, S> {
    stream: C,
    endpoints: Vec<C::Endpoint>,
    sink: Option<S>,
}

impl<C: Connectable> Task for AsyncConnect<C> {
    type Output = C::Endpoint;
    type Error = io::Error;
    type State<S>
        = AsyncConnectState<C, S>
    where
        S: CompletionSink<C::Endpoint, io::Error>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<C::Endpoint, io::Error>,
    {
        AsyncConnectState {
            stream: self.stream,
            endpoints: self.endpoints,
            sink: Some(sink),
        }
    }
}

impl<C, S> TaskState for AsyncConnectState<C, S>
where
    C: Connectable,
    S: CompletionSink<C::Endpoint, io::Error>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "connect") else {
            return;
        };
        let endpoints = std::mem::take(&mut self.endpoints);
        self.stream
            .async_connect(endpoints, Box::new(move |result| deliver(sink, result)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_stubs::{Recorder, ScriptedConnector};
    use std::net::SocketAddr;

    #[test]
    fn passes_the_endpoint_set_and_reports_the_connected_one() {
        let connector = ScriptedConnector::<SocketAddr>::new();
        let first: SocketAddr = "127.0.0.1:7001".parse().expect("addr");
        let second: SocketAddr = "127.0.0.1:7002".parse().expect("addr");
        let recorder = Recorder::<SocketAddr, io::Error>::new();

        let mut state = async_connect(&connector, [first, second]).connect(recorder.sink());
        state.begin();
        assert_eq!(connector.attempts(), vec![vec![first, second]]);

        connector.complete_next(Ok(second));
        assert_eq!(recorder.successes(), vec![second]);
    }

    #[test]
    fn refused_connection_is_a_failure() {
        let connector = ScriptedConnector::<SocketAddr>::new();
        let recorder = Recorder::<SocketAddr, io::Error>::new();
        let mut state = async_connect(&connector, Vec::new()).connect(recorder.sink());
        state.begin();
        connector.complete_next(Err(io::ErrorKind::ConnectionRefused.into()));
        assert_eq!(
            recorder.failure_kinds(),
            vec![io::ErrorKind::ConnectionRefused]
        );
        assert_eq!(recorder.fired(), 1);
    }
}
