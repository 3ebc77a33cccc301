//! 调度器：以执行上下文构造定时 Task。
//!
//! # 设计背景（Why）
//! - 时间维度与 IO 原语共享同一 Task 形态，组合子与分离执行器无需区别对待；
//! - 定时 Task 在构造时向上下文申请一个专属定时器，执行记录独占它：丢弃执行记录即
//!   销毁定时器并中止等待。
//!
//! # 契约说明（What）
//! - [`Scheduler::schedule`]：向上下文投递一次零负载成功，从不同步完成；
//! - [`Scheduler::schedule_at`] / [`Scheduler::schedule_after`]：中止 → `on_cancel`，
//!   其余完成 → `on_success(())`，失败通道为 [`Infallible`]；
//! - 两个调度器相等当且仅当指向同一执行上下文。

use crate::adapters::wait::{Arm, AsyncWait, AsyncWaitState};
use crate::engine::{ExecutionContext, WaitableTimer};
use crate::sink::CompletionSink;
use crate::task::{Task, TaskState, take_sink};
use std::convert::Infallible;
use std::fmt;
use std::time::{Duration, Instant};

/// 执行上下文的轻量句柄。
#[derive(Clone)]
pub struct Scheduler<C> {
    context: C,
}

impl<C: ExecutionContext> Scheduler<C> {
    pub fn new(context: C) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// 上下文时钟的当前时刻。
    pub fn now(&self) -> Instant {
        self.context.now()
    }

    /// 在上下文上“立即”运行。
    pub fn schedule(&self) -> Schedule<C> {
        Schedule {
            context: self.context.clone(),
        }
    }

    /// 在绝对时刻 `deadline` 运行。
    pub fn schedule_at(&self, deadline: Instant) -> ScheduleAt<C::Timer> {
        ScheduleAt {
            wait: AsyncWait::owned(self.context.make_timer(), Arm::At(deadline), "schedule_at"),
        }
    }

    /// 在 `duration` 之后运行。
    pub fn schedule_after(&self, duration: Duration) -> ScheduleAfter<C::Timer> {
        ScheduleAfter {
            wait: AsyncWait::owned(
                self.context.make_timer(),
                Arm::After(duration),
                "schedule_after",
            ),
        }
    }
}

impl<C: ExecutionContext> PartialEq for Scheduler<C> {
    fn eq(&self, other: &Self) -> bool {
        self.context.same_context(&other.context)
    }
}

impl<C: ExecutionContext> Eq for Scheduler<C> {}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

pub struct Schedule<C> {
    context: C,
}

pub struct ScheduleState<C, S> {
    context: C,
    sink: Option<S>,
}

impl<C: ExecutionContext> Task for Schedule<C> {
    type Output = ();
    type Error = Infallible;
    type State<S>
        = ScheduleState<C, S>
    where
        S: CompletionSink<(), Infallible>;

    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<(), Infallible>,
    {
        ScheduleState {
            context: self.context,
            sink: Some(sink),
        }
    }
}

impl<C, S> TaskState for ScheduleState<C, S>
where
    C: ExecutionContext,
    S: CompletionSink<(), Infallible>,
{
    fn begin(&mut self) {
        let Some(sink) = take_sink(&mut self.sink, "schedule") else {
            return;
        };
        self.context.post(Box::new(move || sink.on_success(())));
    }
}

/// 绝对时刻定时 Task，独占一个新建的定时器。
pub struct ScheduleAt<Tm> {
    wait: AsyncWait<Tm>,
}

/// 相对时长定时 Task，独占一个新建的定时器。
pub struct ScheduleAfter<Tm> {
    wait: AsyncWait<Tm>,
}

impl<Tm: WaitableTimer> Task for ScheduleAt<Tm> {
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
        self.wait.connect(sink)
    }
}

impl<Tm: WaitableTimer> Task for ScheduleAfter<Tm> {
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
        self.wait.connect(sink)
    }
}
