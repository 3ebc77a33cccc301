//! Task / TaskState 形态：描述、连接、启动三段分离。

use crate::allocator::{GlobalSlots, SlotAllocator};
use crate::combinator::{LetValue, Then, UponError};
use crate::detached;
use crate::error::LaunchError;
use crate::future::TaskFuture;
use crate::sink::CompletionSink;
use std::fmt;

/// 尚未启动的异步动作描述。
///
/// # 设计背景（Why）
/// - 将“描述动作”“绑定接收方”“发起动作”拆成三步，组合子可以在任何资源被触碰前
///   对 Task 做变换；
/// - 负载形态在类型层面声明：`Output` 是成功通道负载，`Error` 是失败通道负载，
///   [`SENDS_CANCEL`](Task::SENDS_CANCEL) 声明取消通道是否可能被观察到。
///
/// # 契约说明（What）
/// - `connect` 消费 Task 并返回 [`TaskState`]，**不得**启动动作；
/// - `State<S>` 拥有 Task 捕获的资源句柄、参数以及 Sink。
///
/// # 风险提示（Trade-offs）
/// - 资源以可克隆句柄被“引用”，资源本身的生命周期由调用方负责。
pub trait Task: Send + Sized + 'static {
    /// 成功通道负载。
    type Output: Send + 'static;

    /// 失败通道负载。
    type Error: Send + 'static;

    /// 连接到 Sink 后得到的执行记录。
    type State<S>: TaskState
    where
        S: CompletionSink<Self::Output, Self::Error>;

    /// 取消通道是否可能触发。
    const SENDS_CANCEL: bool = false;

    /// 绑定 Sink，构造执行记录。
    fn connect<S>(self, sink: S) -> Self::State<S>
    where
        S: CompletionSink<Self::Output, Self::Error>;
}

/// 绑定了资源与 Sink 的执行记录。
///
/// # 契约说明（What）
/// - `begin` 至多调用一次；它要么向执行上下文投递零工作量的完成，要么向引擎登记回调后
///   立即返回，调用线程不会阻塞；
/// - 从 `begin` 到 Sink 触发期间，拥有者需保持执行记录存活：定时器类记录在被丢弃时会
///   中止等待并触发取消通道。
pub trait TaskState: Send + 'static {
    /// 发起动作。
    fn begin(&mut self);
}

impl TaskState for Box<dyn TaskState> {
    fn begin(&mut self) {
        (**self).begin()
    }
}

/// Task 的组合与启动糖。
pub trait TaskExt: Task {
    /// 成功值经 `f` 变换。
    fn then<F, U>(self, f: F) -> Then<Self, F>
    where
        F: FnOnce(Self::Output) -> U + Send + 'static,
        U: Send + 'static,
    {
        Then::new(self, f)
    }

    /// 失败值经 `f` 恢复为成功值，组合后不再有失败通道。
    fn upon_error<F>(self, f: F) -> UponError<Self, F>
    where
        F: FnOnce(Self::Error) -> Self::Output + Send + 'static,
    {
        UponError::new(self, f)
    }

    /// 成功值用于构造下一个 Task，其终态即组合后的终态。
    fn let_value<F, N>(self, f: F) -> LetValue<Self, F>
    where
        F: FnOnce(Self::Output) -> N + Send + 'static,
        N: Task<Error = Self::Error>,
    {
        LetValue::new(self, f)
    }

    /// 转换为在首次轮询时启动的 `Future`。
    fn into_future(self) -> TaskFuture<Self> {
        TaskFuture::new(self)
    }

    /// 以默认分配器分离执行。
    fn detach(self) -> Result<(), LaunchError>
    where
        Self::Error: fmt::Debug,
    {
        detached::run_detached(self, GlobalSlots)
    }

    /// 以指定分配器分离执行。
    fn detach_in<A>(self, allocator: A) -> Result<(), LaunchError>
    where
        A: SlotAllocator,
        Self::Error: fmt::Debug,
    {
        detached::run_detached(self, allocator)
    }
}

impl<T: Task> TaskExt for T {}

/// `begin` 的公共前奏：取出 Sink，重复启动时记录告警并返回 `None`。
pub(crate) fn take_sink<S>(slot: &mut Option<S>, op: &'static str) -> Option<S> {
    match slot.take() {
        Some(sink) => {
            tracing::trace!(op, "begin");
            Some(sink)
        }
        None => {
            tracing::warn!(op, "begin called more than once; ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::just;
    use crate::test_stubs::Recorder;
    use std::convert::Infallible;

    #[test]
    fn connect_does_not_start_the_action() {
        let recorder = Recorder::<u8, Infallible>::new();
        let state = just(5u8).connect(recorder.sink());
        assert_eq!(recorder.fired(), 0, "connect 只构造执行记录");
        drop(state);
        assert_eq!(recorder.fired(), 0);
    }

    #[test]
    fn second_begin_is_inert() {
        let recorder = Recorder::<u8, Infallible>::new();
        let mut state = just(5u8).connect(recorder.sink());
        state.begin();
        state.begin();
        assert_eq!(recorder.successes(), vec![5]);
        assert_eq!(recorder.fired(), 1);
    }

    #[test]
    fn boxed_state_forwards_begin() {
        let recorder = Recorder::<u8, Infallible>::new();
        let mut state: Box<dyn TaskState> = Box::new(just(1u8).connect(recorder.sink()));
        state.begin();
        assert_eq!(recorder.fired(), 1);
    }
}
