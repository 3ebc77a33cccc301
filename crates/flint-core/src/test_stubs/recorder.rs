use crate::outcome::Outcome;
use crate::sink::CompletionSink;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

/// 记录三通道触发的观察者。
///
/// 同一 `Recorder` 可以签发多个 Sink；[`fired`](Self::fired) 统计所有通道的总触发次数，
/// 用于断言“恰好一次”。
pub struct Recorder<T, E> {
    inner: Arc<Mutex<Record<T, E>>>,
}

struct Record<T, E> {
    successes: Vec<T>,
    failures: Vec<E>,
    cancels: usize,
}

impl<T, E> Clone for Recorder<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Default for Recorder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Recorder<T, E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Record {
                successes: Vec::new(),
                failures: Vec::new(),
                cancels: 0,
            })),
        }
    }

    pub fn sink(&self) -> RecordingSink<T, E> {
        RecordingSink {
            inner: Arc::clone(&self.inner),
        }
    }

    /// 所有通道的触发总数。
    pub fn fired(&self) -> usize {
        let record = self.inner.lock();
        record.successes.len() + record.failures.len() + record.cancels
    }

    pub fn cancels(&self) -> usize {
        self.inner.lock().cancels
    }

    pub fn take_successes(&self) -> Vec<T> {
        std::mem::take(&mut self.inner.lock().successes)
    }

    pub fn take_failures(&self) -> Vec<E> {
        std::mem::take(&mut self.inner.lock().failures)
    }

    /// 唯一一次触发的终态；未触发或触发多次时返回 `None`。
    pub fn single_outcome(&self) -> Option<Outcome<T, E>> {
        let mut record = self.inner.lock();
        let total = record.successes.len() + record.failures.len() + record.cancels;
        if total != 1 {
            return None;
        }
        if let Some(value) = record.successes.pop() {
            return Some(Outcome::Success(value));
        }
        if let Some(error) = record.failures.pop() {
            return Some(Outcome::Failure(error));
        }
        record.cancels = 0;
        Some(Outcome::Cancelled)
    }
}

impl<T: Clone, E> Recorder<T, E> {
    pub fn successes(&self) -> Vec<T> {
        self.inner.lock().successes.clone()
    }
}

impl<T, E: Clone> Recorder<T, E> {
    pub fn failures(&self) -> Vec<E> {
        self.inner.lock().failures.clone()
    }
}

impl<T> Recorder<T, io::Error> {
    pub fn failure_kinds(&self) -> Vec<io::ErrorKind> {
        self.inner.lock().failures.iter().map(io::Error::kind).collect()
    }
}

/// [`Recorder`] 签发的 Sink。
pub struct RecordingSink<T, E> {
    inner: Arc<Mutex<Record<T, E>>>,
}

impl<T, E> CompletionSink<T, E> for RecordingSink<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn on_success(self, value: T) {
        self.inner.lock().successes.push(value);
    }

    fn on_failure(self, error: E) {
        self.inner.lock().failures.push(error);
    }

    fn on_cancel(self) {
        self.inner.lock().cancels += 1;
    }
}
