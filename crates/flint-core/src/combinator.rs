//! 组合子：在任何资源被触碰之前变换 Task。
//!
//! `then`/`upon_error` 只包装 Sink，不引入额外状态；`let_value` 需要在第一个 Task
//! 成功后构造并持有第二个执行记录，它被存放在外层执行记录里，随外层一同销毁。

use crate::sink::CompletionSink;
use crate::task::{Task, TaskState, take_sink};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::Arc;

/// 立即以 `value` 成功的 Task。
pub fn just<T: Send + 'static>(value: T) -> Just<T> {
    Just { value }
}

pub struct Just<T> {
    value: T,
}

pub struct JustState<T, S> {
    value: Option<T>,
    sink: Option<S>,
}

impl<T: Send + 'static> Task for Just<T> {
    type Output = T;
    type Error = Infallible;
    type State<S>
        = JustState<T, S>
    where
        S: CompletionSink<T, Infallible>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<T, Infallible>,
    {
        JustState {
            value: Some(self.value),
            sink: Some(sink),
        }
    }
}

impl<T, S> TaskState for JustState<T, S>
where
    T: Send + 'static,
    S: CompletionSink<T, Infallible>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "just") else {
            return;
        };
        if let Some(value) = self.value.take() {
            sink.on_success(value);
        }
    }
}

/// 成功值映射。
pub struct Then<T, F> {
    inner: T,
    f: F,
}

impl<T, F> Then<T, F> {
    pub fn new(inner: T, f: F) -> Self {
        Self { inner, f }
    }
}

pub struct ThenSink<F, S> {
    f: F,
    sink: S,
}

impl<A, U, E, F, S> CompletionSink<A, E> for ThenSink<F, S>
where
    F: FnOnce(A) -> U + Send + 'static,
    S: CompletionSink<U, E>,
{
    fn on_success(self, value: A) {
        self.sink.on_success((self.f)(value))
    }

    fn on_failure(self, error: E) {
        self.sink.on_failure(error)
    }

    fn on_cancel(self) {
        self.sink.on_cancel()
    }
}

impl<T, F, U> Task for Then<T, F>
where
    T: Task,
    F: FnOnce(T::Output) -> U + Send + 'static,
    U: Send + 'static,
{
    type Output = U;
    type Error = T::Error;
    type State<S>
        = T::State<ThenSink<F, S>>
    where
        S: CompletionSink<U, T::Error>;

    const SENDS_CANCEL: bool = T::SENDS_CANCEL;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<U, T::Error>,
    {
        self.inner.connect(ThenSink { f: self.f, sink })
    }
}

/// 失败恢复：失败值经映射转为成功值。
pub struct UponError<T, F> {
    inner: T,
    f: F,
}

impl<T, F> UponError<T, F> {
    pub fn new(inner: T, f: F) -> Self {
        Self { inner, f }
    }
}

pub struct UponErrorSink<F, S> {
    f: F,
    sink: S,
}

impl<V, E, F, S> CompletionSink<V, E> for UponErrorSink<F, S>
where
    V: Send + 'static,
    F: FnOnce(E) -> V + Send + 'static,
    S: CompletionSink<V, Infallible>,
{
    fn on_success(self, value: V) {
        self.sink.on_success(value)
    }

    fn on_failure(self, error: E) {
        self.sink.on_success((self.f)(error))
    }

    fn on_cancel(self) {
        self.sink.on_cancel()
    }
}

impl<T, F> Task for UponError<T, F>
where
    T: Task,
    F: FnOnce(T::Error) -> T::Output + Send + 'static,
{
    type Output = T::Output;
    type Error = Infallible;
    type State<S>
        = T::State<UponErrorSink<F, S>>
    where
        S: CompletionSink<T::Output, Infallible>;

    const SENDS_CANCEL: bool = T::SENDS_CANCEL;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<T::Output, Infallible>,
    {
        self.inner.connect(UponErrorSink { f: self.f, sink })
    }
}

/// 顺序组合：第一个 Task 的成功值构造第二个 Task。
pub struct LetValue<T, F> {
    inner: T,
    f: F,
}

impl<T, F> LetValue<T, F> {
    pub fn new(inner: T, f: F) -> Self {
        Self { inner, f }
    }
}

type SecondSlot = Arc<Mutex<Option<Box<dyn TaskState>>>>;

pub struct LetSink<F, S> {
    f: F,
    sink: S,
    second: SecondSlot,
}

impl<V, E, F, N, S> CompletionSink<V, E> for LetSink<F, S>
where
    F: FnOnce(V) -> N + Send + 'static,
    N: Task<Error = E>,
    S: CompletionSink<N::Output, E>,
    E: Send + 'static,
{
    fn on_success(self, value: V) {
        let next = (self.f)(value);
        let mut state: Box<dyn TaskState> = Box::new(next.connect(self.sink));
        state.begin();
        *self.second.lock() = Some(state);
    }

    fn on_failure(self, error: E) {
        self.sink.on_failure(error)
    }

    fn on_cancel(self) {
        self.sink.on_cancel()
    }
}

/// `let_value` 的执行记录：第一阶段记录加上第二阶段记录的存放位。
pub struct LetValueState<P> {
    first: P,
    _second: SecondSlot,
}

impl<P: TaskState> TaskState for LetValueState<P> {
    fn begin(&mut self) {
        self.first.begin()
    }
}

impl<T, F, N> Task for LetValue<T, F>
where
    T: Task,
    F: FnOnce(T::Output) -> N + Send + 'static,
    N: Task<Error = T::Error>,
{
    type Output = N::Output;
    type Error = T::Error;
    type State<S>
        = LetValueState<T::State<LetSink<F, S>>>
    where
        S: CompletionSink<N::Output, T::Error>;

    const SENDS_CANCEL: bool = T::SENDS_CANCEL || N::SENDS_CANCEL;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<N::Output, T::Error>,
    {
        let second: SecondSlot = Arc::new(Mutex::new(None));
        let first = self.inner.connect(LetSink {
            f: self.f,
            sink,
            second: Arc::clone(&second),
        });
        LetValueState {
            first,
            _second: second,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskExt;
    use crate::test_stubs::{ManualContext, Recorder};
    use crate::{ExecutionContext, IoBuffer, Scheduler, WaitableTimer, async_wait};
    use std::time::Duration;

    #[test]
    fn then_maps_the_success_value() {
        let recorder = Recorder::<String, Infallible>::new();
        let mut state = just(21u32)
            .then(|v| v * 2)
            .then(|v| v.to_string())
            .connect(recorder.sink());
        state.begin();
        assert_eq!(recorder.successes(), vec!["42".to_string()]);
    }

    #[test]
    fn upon_error_recovers_failures() {
        let ctx = ManualContext::new();
        let (left, _right) = crate::test_stubs::LoopbackStream::pair(&ctx);
        crate::Closable::close(&left).expect("关闭回环流");

        let recorder = Recorder::<usize, Infallible>::new();
        let mut state = crate::async_write_some(&left, IoBuffer::from("x"))
            .upon_error(|_| usize::MAX)
            .connect(recorder.sink());
        state.begin();
        ctx.run_pending();
        assert_eq!(recorder.successes(), vec![usize::MAX]);
    }

    #[test]
    fn let_value_runs_the_second_task_after_the_first() {
        let ctx = ManualContext::new();
        let scheduler = Scheduler::new(ctx.clone());
        let recorder = Recorder::<&'static str, Infallible>::new();
        let mut state = scheduler
            .schedule()
            .let_value(|()| just("second"))
            .connect(recorder.sink());
        state.begin();
        assert_eq!(recorder.fired(), 0, "schedule 投递而不是同步完成");
        ctx.run_pending();
        assert_eq!(recorder.successes(), vec!["second"]);
    }

    #[test]
    fn let_value_keeps_an_asynchronous_second_stage_alive() {
        let ctx = ManualContext::new();
        let timer = ctx.make_timer();
        let recorder = Recorder::<(), Infallible>::new();
        let waiter = timer.clone();
        let mut state = just(())
            .let_value(move |()| async_wait(&waiter, Duration::from_millis(5)))
            .connect(recorder.sink());
        state.begin();
        ctx.advance(Duration::from_millis(5));
        ctx.run_pending();
        assert_eq!(recorder.successes(), vec![()]);
        assert_eq!(timer.cancel(), 0);
    }

    #[test]
    fn let_value_propagates_cancel_from_the_second_stage() {
        let ctx = ManualContext::new();
        let timer = ctx.make_timer();
        let recorder = Recorder::<(), Infallible>::new();
        let waiter = timer.clone();
        let mut state = just(())
            .let_value(move |()| async_wait(&waiter, Duration::from_secs(60)))
            .connect(recorder.sink());
        state.begin();
        assert_eq!(timer.cancel(), 1);
        ctx.run_pending();
        assert_eq!(recorder.cancels(), 1);
        assert_eq!(recorder.fired(), 1);
    }
}
