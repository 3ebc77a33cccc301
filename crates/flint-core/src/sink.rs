//! 完成契约：成功、失败、取消三通道。
//!
//! # 契约说明（What）
//! - 每个被 `begin` 的 [`TaskState`](crate::task::TaskState) 恰好调用一次三者之一；
//! - 三个方法均按值接收 `self`，触发即消费 Sink，第二次触发在类型层面不可表达；
//! - `on_cancel` 不携带负载，表示动作在产生值或可报告的失败之前被放弃。

use std::io;

/// 接收 Task 终态的三通道 Sink。
///
/// # 设计背景（Why）
/// - 回调式原语只报告一次“成功/失败”结果，定时器等原语额外区分“被中止”；
///   三通道足以无损表达全部情形。
///
/// # 契约说明（What）
/// - `T`：成功通道负载，由 Task 的 `Output` 决定；
/// - `E`：失败通道负载，由 Task 的 `Error` 决定；
/// - 实现者需满足 `Send + 'static`：Sink 会被移入引擎回调，在驱动线程上触发。
pub trait CompletionSink<T, E>: Send + 'static {
    /// 动作成功完成。
    fn on_success(self, value: T);

    /// 动作失败，`error` 原样来自引擎。
    fn on_failure(self, error: E);

    /// 动作被放弃。
    fn on_cancel(self);
}

/// 将引擎报告的 `io::Result` 路由到成功或失败通道。
///
/// IO 类适配器共享此路由；结果到通道的映射只在这里发生。
pub fn deliver<T, S>(sink: S, result: io::Result<T>)
where
    S: CompletionSink<T, io::Error>,
{
    match result {
        Ok(value) => sink.on_success(value),
        Err(error) => sink.on_failure(error),
    }
}

/// 由三个闭包拼装的 Sink，适合在应用代码里就地处理终态。
pub struct FnSink<S, F, C> {
    success: S,
    failure: F,
    cancel: C,
}

impl<S, F, C> FnSink<S, F, C> {
    /// 以三个闭包构造 Sink。
    pub fn new(success: S, failure: F, cancel: C) -> Self {
        Self {
            success,
            failure,
            cancel,
        }
    }
}

impl<T, E, S, F, C> CompletionSink<T, E> for FnSink<S, F, C>
where
    S: FnOnce(T) + Send + 'static,
    F: FnOnce(E) + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    fn on_success(self, value: T) {
        (self.success)(value)
    }

    fn on_failure(self, error: E) {
        (self.failure)(error)
    }

    fn on_cancel(self) {
        (self.cancel)()
    }
}
