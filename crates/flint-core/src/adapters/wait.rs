//! 定时等待。
//!
//! 等待被中止（取消、重设到期时间、定时器销毁）映射为取消通道；其余完成，包括定时器
//! 驱动报告的错误，一律映射为成功。失败通道因此为 [`Infallible`]：驱动错误只记录在
//! `debug` 级别日志里。
//!
//! [`async_wait`] 借用调用方的定时器：`begin` 挂上等待后即放下自己的句柄，调用方销毁
//! 定时器便中止等待。调度器自建的定时器则由执行记录持有到完成。

use crate::engine::{WaitError, WaitableTimer};
use crate::sink::CompletionSink;
use crate::task::{Task, TaskState, take_sink};
use std::convert::Infallible;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub(crate) enum Arm {
    After(Duration),
    At(Instant),
}

/// 在调用方持有的定时器上等待 `duration`。
pub fn async_wait<Tm: WaitableTimer>(timer: &Tm, duration: Duration) -> AsyncWait<Tm> {
    AsyncWait::borrowed(timer.clone(), Arm::After(duration), "wait")
}

/// 在调用方持有的定时器上等待到 `deadline`。
pub fn async_wait_until<Tm: WaitableTimer>(timer: &Tm, deadline: Instant) -> AsyncWait<Tm> {
    AsyncWait::borrowed(timer.clone(), Arm::At(deadline), "wait_until")
}

pub struct AsyncWait<Tm> {
    timer: Tm,
    arm: Arm,
    op: &'static str,
    owned: bool,
}

impl<Tm> AsyncWait<Tm> {
    /// 执行记录持有 `timer` 直到等待完成。
    pub(crate) fn owned(timer: Tm, arm: Arm, op: &'static str) -> Self {
        Self {
            timer,
            arm,
            op,
            owned: true,
        }
    }

    /// 等待挂上后放下 `timer`，其生命周期归调用方。
    pub(crate) fn borrowed(timer: Tm, arm: Arm, op: &'static str) -> Self {
        Self {
            timer,
            arm,
            op,
            owned: false,
        }
    }
}

/// 等待的执行记录。
///
/// 自有定时器的记录持有其句柄，丢弃记录即中止等待；借用的句柄在 `begin` 之后即释放。
pub struct AsyncWaitState<Tm, S> {
    timer: Option<Tm>,
    arm: Arm,
    op: &'static str,
    owned: bool,
    sink: Option<S>,
}

impl<Tm: WaitableTimer> Task for AsyncWait<Tm> {
    type Output = ();
    type Error = Infallible;
    type State<S>
        = AsyncWaitState<Tm, S>
    where
        S: CompletionSink<(), Infallible>;

    const SENDS_CANCEL: bool = true;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<(), Infallible>,
    {
        AsyncWaitState {
            timer: Some(self.timer),
            arm: self.arm,
            op: self.op,
            owned: self.owned,
            sink: Some(sink),
        }
    }
}

impl<Tm, S> TaskState for AsyncWaitState<Tm, S>
where
    Tm: WaitableTimer,
    S: CompletionSink<(), Infallible>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, self.op) else {
            return;
        };
        let Some(timer) = self.timer.as_ref() else {
            return;
        };
        match self.arm {
            Arm::After(duration) => timer.expires_after(duration),
            Arm::At(deadline) => timer.expires_at(deadline),
        }
        let op = self.op;
        timer.async_wait(Box::new(move |result| route_wait(sink, result, op)));
        if !self.owned {
            self.timer = None;
        }
    }
}

pub(crate) fn route_wait<S>(sink: S, result: Result<(), WaitError>, op: &'static str)
where
    S: CompletionSink<(), Infallible>,
{
    match result {
        Ok(()) => sink.on_success(()),
        Err(WaitError::Aborted) => sink.on_cancel(),
        Err(WaitError::Driver(error)) => {
            tracing::debug!(op, %error, "timer driver error treated as expiry");
            sink.on_success(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExecutionContext;
    use crate::test_stubs::{ManualContext, Recorder};
    use tracing_test::traced_test;

    #[test]
    fn expiry_is_success() {
        let ctx = ManualContext::new();
        let timer = ctx.make_timer();
        let recorder = Recorder::<(), Infallible>::new();
        let mut state = async_wait(&timer, Duration::from_millis(20)).connect(recorder.sink());
        state.begin();

        ctx.advance(Duration::from_millis(19));
        ctx.run_pending();
        assert_eq!(recorder.fired(), 0);
        ctx.advance(Duration::from_millis(1));
        ctx.run_pending();
        assert_eq!(recorder.successes(), vec![()]);
    }

    #[test]
    fn cancelled_timer_fires_the_cancel_channel() {
        let ctx = ManualContext::new();
        let timer = ctx.make_timer();
        let recorder = Recorder::<(), Infallible>::new();
        let mut state = async_wait(&timer, Duration::from_secs(5)).connect(recorder.sink());
        state.begin();
        assert_eq!(timer.cancel(), 1);
        ctx.run_pending();
        assert_eq!(recorder.cancels(), 1);
        assert_eq!(recorder.fired(), 1);
    }

    #[test]
    fn destroying_the_timer_cancels_the_wait() {
        let ctx = ManualContext::new();
        let timer = ctx.make_timer();
        let recorder = Recorder::<(), Infallible>::new();
        let mut state = async_wait(&timer, Duration::from_secs(5)).connect(recorder.sink());
        state.begin();
        assert_eq!(timer.waiters(), 1);

        drop(timer);
        ctx.run_pending();
        assert_eq!(recorder.cancels(), 1);
        assert_eq!(recorder.fired(), 1);
        drop(state);
    }

    #[test]
    fn past_deadline_completes_on_the_next_turn() {
        let ctx = ManualContext::new();
        let timer = ctx.make_timer();
        let recorder = Recorder::<(), Infallible>::new();
        let deadline = ctx.now();
        ctx.advance(Duration::from_secs(1));
        let mut state = async_wait_until(&timer, deadline).connect(recorder.sink());
        state.begin();
        ctx.run_pending();
        assert_eq!(recorder.successes(), vec![()]);
    }

    #[test]
    #[traced_test]
    fn driver_error_is_swallowed_as_success() {
        let ctx = ManualContext::new();
        let timer = ctx.make_timer();
        timer.fail_next_wait(std::io::ErrorKind::Other);
        let recorder = Recorder::<(), Infallible>::new();
        let mut state = async_wait(&timer, Duration::from_millis(1)).connect(recorder.sink());
        state.begin();
        ctx.advance(Duration::from_millis(1));
        ctx.run_pending();
        assert_eq!(recorder.successes(), vec![()]);
        assert!(logs_contain("timer driver error treated as expiry"));
    }
}
