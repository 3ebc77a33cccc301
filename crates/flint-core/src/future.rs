//! Task 到 `Future` 的桥接。

use crate::outcome::Outcome;
use crate::sink::CompletionSink;
use crate::task::{Task, TaskState};
use futures::channel::oneshot;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// 首次轮询时连接并启动 Task 的 `Future`。
///
/// # 契约说明（What）
/// - 解析为 [`Outcome`]：三通道一一对应；
/// - 执行记录由 Future 持有，Future 被丢弃即丢弃执行记录（定时器类 Task 因此被中止）；
/// - 若引擎在未触发的情况下丢弃了 Sink，解析为 [`Outcome::Cancelled`]。
pub struct TaskFuture<T: Task> {
    task: Option<T>,
    state: Option<Box<dyn TaskState>>,
    outcome: Option<oneshot::Receiver<Outcome<T::Output, T::Error>>>,
}

// 任何字段都不会被原地引用，`T` 只在首次轮询时被移出。
impl<T: Task> Unpin for TaskFuture<T> {}

impl<T: Task> TaskFuture<T> {
    pub fn new(task: T) -> Self {
        Self {
            task: Some(task),
            state: None,
            outcome: None,
        }
    }
}

struct OneshotSink<T, E> {
    tx: oneshot::Sender<Outcome<T, E>>,
}

impl<T, E> OneshotSink<T, E> {
    fn send(self, outcome: Outcome<T, E>) {
        // 接收端已丢弃时结果无人关心。
        let _ = self.tx.send(outcome);
    }
}

impl<T: Send + 'static, E: Send + 'static> CompletionSink<T, E> for OneshotSink<T, E> {
    fn on_success(self, value: T) {
        self.send(Outcome::Success(value))
    }

    fn on_failure(self, error: E) {
        self.send(Outcome::Failure(error))
    }

    fn on_cancel(self) {
        self.send(Outcome::Cancelled)
    }
}

impl<T: Task> Future for TaskFuture<T> {
    type Output = Outcome<T::Output, T::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(task) = this.task.take() {
            let (tx, rx) = oneshot::channel();
            let mut state: Box<dyn TaskState> = Box::new(task.connect(OneshotSink { tx }));
            this.outcome = Some(rx);
            state.begin();
            this.state = Some(state);
        }
        let Some(rx) = this.outcome.as_mut() else {
            return Poll::Ready(Outcome::Cancelled);
        };
        match Pin::new(rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                this.outcome = None;
                this.state = None;
                Poll::Ready(result.unwrap_or(Outcome::Cancelled))
            }
        }
    }
}
