use crate::sink::CompletionSink;

/// Task 的终态标签值。
///
/// # 契约说明（What）
/// - `Success`/`Failure`/`Cancelled` 与三通道一一对应；
/// - [`Outcome::fire`] 把标签值重放到任意 Sink，用于在 Future 与 Sink 两种消费方式间转换。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    Success(T),
    Failure(E),
    Cancelled,
}

impl<T, E> Outcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// 取出成功值。
    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            _ => None,
        }
    }

    /// 取出失败值。
    pub fn failure(self) -> Option<E> {
        match self {
            Outcome::Failure(error) => Some(error),
            _ => None,
        }
    }

    /// 转为 `Result`：取消映射为 `Ok(None)`。
    pub fn into_result(self) -> Result<Option<T>, E> {
        match self {
            Outcome::Success(value) => Ok(Some(value)),
            Outcome::Failure(error) => Err(error),
            Outcome::Cancelled => Ok(None),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U, E> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(error) => Outcome::Failure(error),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }

    /// 将终态重放到 `sink`。
    pub fn fire<S>(self, sink: S)
    where
        S: CompletionSink<T, E>,
    {
        match self {
            Outcome::Success(value) => sink.on_success(value),
            Outcome::Failure(error) => sink.on_failure(error),
            Outcome::Cancelled => sink.on_cancel(),
        }
    }
}
