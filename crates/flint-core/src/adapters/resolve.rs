use crate::engine::Resolver;
use crate::sink::{CompletionSink, deliver};
use crate::task::{Task, TaskState, take_sink};
use std::io;
use std::sync::Arc;

/// 解析 `host` + `service`。
///
/// 成功负载为解析器给出的有序端点列表；解析失败原样进入失败通道。
pub fn async_resolve<R: Resolver>(
    resolver: Arc<R>,
    host: impl Into<String>,
    service: impl Into<String>,
) -> AsyncResolve<R> {
    AsyncResolve {
        resolver,
        host: host.into(),
        service: service.into(),
    }
}

pub struct AsyncResolve<R> {
    resolver: Arc<R>,
    host: String,
    service: String,
}

pub struct AsyncResolveState<R, S> {
    resolver: Arc<R>,
    query: Option<(String, String)>,
    sink: Option<S>,
}

impl<R: Resolver> Task for AsyncResolve<R> {
    type Output = Vec<R::Endpoint>;
    type Error = io::Error;
    type State<S>
        = AsyncResolveState<R, S>
    where
        S: CompletionSink<Vec<R::Endpoint>, io::Error>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<Vec<R::Endpoint>, io::Error>,
    {
        AsyncResolveState {
            resolver: self.resolver,
            query: Some((self.host, self.service)),
            sink: Some(sink),
        }
    }
}

impl<R, S> TaskState for AsyncResolveState<R, S>
where
    R: Resolver,
    S: CompletionSink<Vec<R::Endpoint>, io::Error>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "resolve") else {
            return;
        };
        let (host, service) = self.query.take().unwrap_or_default();
        self.resolver
            .async_resolve(host, service, Box::new(move |result| deliver(sink, result)));
    }
}
