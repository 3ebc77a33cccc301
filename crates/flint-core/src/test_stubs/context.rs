use crate::engine::{ExecutionContext, Job, WaitCallback, WaitError, WaitableTimer};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// 由测试线程手动驱动的执行上下文。
///
/// 投递的作业进入 FIFO 队列，只在 [`run_pending`](Self::run_pending) 中执行；
/// 时钟是虚拟的，[`advance`](Self::advance) 前进时钟并把到期定时器的完成投递到队列。
#[derive(Clone)]
pub struct ManualContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    queue: Mutex<VecDeque<Job>>,
    clock: Mutex<Instant>,
    timers: Mutex<Vec<Weak<TimerCell>>>,
}

impl ManualContext {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                queue: Mutex::new(VecDeque::new()),
                clock: Mutex::new(Instant::now()),
                timers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// 排队中的作业数。
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// 运行队首作业。
    pub fn run_one(&self) -> bool {
        let job = self.inner.queue.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// 运行作业直到队列为空（包括运行期间新投递的作业），返回运行的数量。
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }

    /// 前进虚拟时钟，到期定时器的等待被投递为成功。
    pub fn advance(&self, by: Duration) {
        let now = {
            let mut clock = self.inner.clock.lock();
            *clock += by;
            *clock
        };
        let live: Vec<Arc<TimerCell>> = {
            let mut timers = self.inner.timers.lock();
            timers.retain(|cell| cell.strong_count() > 0);
            timers.iter().filter_map(Weak::upgrade).collect()
        };
        for cell in live {
            cell.fire_if_due(now);
        }
    }
}

impl Default for ManualContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext for ManualContext {
    type Timer = ManualTimer;

    fn post(&self, job: Job) {
        self.inner.queue.lock().push_back(job);
    }

    fn make_timer(&self) -> ManualTimer {
        let cell = Arc::new(TimerCell {
            context: self.clone(),
            state: Mutex::new(TimerState {
                deadline: self.now(),
                waiters: Vec::new(),
                inject: None,
            }),
        });
        self.inner.timers.lock().push(Arc::downgrade(&cell));
        ManualTimer { cell }
    }

    fn now(&self) -> Instant {
        *self.inner.clock.lock()
    }

    fn same_context(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// [`ManualContext`] 的定时器。克隆共享同一定时器；最后一个句柄被丢弃时挂起的等待被中止。
#[derive(Clone)]
pub struct ManualTimer {
    cell: Arc<TimerCell>,
}

struct TimerCell {
    context: ManualContext,
    state: Mutex<TimerState>,
}

struct TimerState {
    deadline: Instant,
    waiters: Vec<WaitCallback>,
    inject: Option<io::ErrorKind>,
}

impl TimerCell {
    fn abort_all(&self) -> usize {
        let waiters = std::mem::take(&mut self.state.lock().waiters);
        let count = waiters.len();
        for waiter in waiters {
            self.context
                .post(Box::new(move || waiter(Err(WaitError::Aborted))));
        }
        count
    }

    fn fire_if_due(&self, now: Instant) {
        let (waiters, inject) = {
            let mut state = self.state.lock();
            if state.deadline > now || state.waiters.is_empty() {
                return;
            }
            (std::mem::take(&mut state.waiters), state.inject.take())
        };
        for waiter in waiters {
            let result = match inject {
                Some(kind) => Err(WaitError::Driver(io::Error::new(kind, "injected"))),
                None => Ok(()),
            };
            self.context.post(Box::new(move || waiter(result)));
        }
    }
}

impl Drop for TimerCell {
    fn drop(&mut self) {
        self.abort_all();
    }
}

impl ManualTimer {
    /// 下一次到期以驱动错误而非成功完成。
    pub fn fail_next_wait(&self, kind: io::ErrorKind) {
        self.cell.state.lock().inject = Some(kind);
    }

    /// 挂起的等待数量。
    pub fn waiters(&self) -> usize {
        self.cell.state.lock().waiters.len()
    }
}

impl WaitableTimer for ManualTimer {
    fn expires_at(&self, deadline: Instant) {
        self.cell.abort_all();
        self.cell.state.lock().deadline = deadline;
    }

    fn expires_after(&self, duration: Duration) {
        self.expires_at(self.cell.context.now() + duration);
    }

    fn async_wait(&self, callback: WaitCallback) {
        self.cell.state.lock().waiters.push(callback);
        self.cell.fire_if_due(self.cell.context.now());
    }

    fn cancel(&self) -> usize {
        self.cell.abort_all()
    }
}
