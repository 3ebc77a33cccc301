//! 稳态定时器。
//!
//! 每次等待是一个在途操作：它只持有到期时刻与一个中止信号的接收端。中止信号的发送端
//! 存放在定时器共享状态里：取消、重设到期时间时主动发送，最后一个句柄被丢弃时随状态一同
//! 丢弃，两种情形都让等待以 [`WaitError::Aborted`] 完成。

use crate::context::IoExecutor;
use flint_core::{WaitCallback, WaitError, WaitableTimer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// 绑定到 [`IoContext`](crate::IoContext) 的定时器句柄。
#[derive(Clone)]
pub struct SteadyTimer {
    executor: IoExecutor,
    shared: Arc<Mutex<TimerShared>>,
}

struct TimerShared {
    deadline: tokio::time::Instant,
    pending: Vec<oneshot::Sender<()>>,
}

impl TimerShared {
    fn abort_pending(&mut self) -> usize {
        self.pending
            .drain(..)
            .filter_map(|abort| abort.send(()).ok())
            .count()
    }
}

impl SteadyTimer {
    pub fn new(executor: &IoExecutor) -> Self {
        Self {
            executor: executor.clone(),
            shared: Arc::new(Mutex::new(TimerShared {
                deadline: tokio::time::Instant::now(),
                pending: Vec::new(),
            })),
        }
    }

    /// 当前到期时刻。
    pub fn expiry(&self) -> Instant {
        self.shared.lock().deadline.into_std()
    }
}

impl WaitableTimer for SteadyTimer {
    fn expires_at(&self, deadline: Instant) {
        let aborted = {
            let mut shared = self.shared.lock();
            shared.deadline = tokio::time::Instant::from_std(deadline);
            shared.abort_pending()
        };
        if aborted > 0 {
            tracing::trace!(aborted, "timer re-armed; pending waits aborted");
        }
    }

    fn expires_after(&self, duration: Duration) {
        self.expires_at(tokio::time::Instant::now().into_std() + duration);
    }

    fn async_wait(&self, callback: WaitCallback) {
        let (abort_tx, abort_rx) = oneshot::channel();
        let deadline = {
            let mut shared = self.shared.lock();
            shared.pending.retain(|abort| !abort.is_closed());
            shared.pending.push(abort_tx);
            shared.deadline
        };
        self.executor.spawn_op(async move {
            tokio::select! {
                biased;
                _ = abort_rx => callback(Err(WaitError::Aborted)),
                () = tokio::time::sleep_until(deadline) => callback(Ok(())),
            }
        });
    }

    fn cancel(&self) -> usize {
        self.shared.lock().abort_pending()
    }
}
