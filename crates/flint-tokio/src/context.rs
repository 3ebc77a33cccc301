//! 以 Tokio 运行时驱动的执行上下文。
//!
//! # 设计背景（Why）
//! - 回调式原语需要一个“事件循环”语义的上下文：登记动作、在驱动线程上运行回调、
//!   在没有未完成工作时让 `run` 返回；
//! - Tokio 运行时提供反应器与定时器，这里补上“未完成工作计数”：每个在途操作持有一个
//!   计数守卫，计数归零即唤醒 `run`。
//!
//! # 契约说明（What）
//! - [`IoContext`] 拥有运行时，不可克隆；[`IoExecutor`] 是可克隆句柄，实现
//!   [`ExecutionContext`]；
//! - `run` 阻塞当前线程直到没有未完成工作或被 [`IoContext::stop`] 停止；`current_thread`
//!   风格下回调只在 `run`/`block_on` 期间执行；
//! - 上下文析构时以 `shutdown_background` 关闭运行时，不等待在途操作。

use crate::config::{ConfigError, IoContextConfig};
use crate::timer::SteadyTimer;
use flint_core::{ExecutionContext, Job, Scheduler};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::runtime::{EnterGuard, Handle, Runtime};
use tokio::sync::Notify;

/// 拥有 Tokio 运行时的 IO 上下文。
pub struct IoContext {
    runtime: Option<Runtime>,
    core: Arc<ContextCore>,
}

struct ContextCore {
    handle: Handle,
    outstanding: AtomicUsize,
    idle: Notify,
    stopped: AtomicBool,
}

impl IoContext {
    /// 以默认配置（单驱动线程）构造。
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_config(&IoContextConfig::default())
    }

    pub fn with_config(config: &IoContextConfig) -> Result<Self, ConfigError> {
        let runtime = config.build_runtime()?;
        let core = Arc::new(ContextCore {
            handle: runtime.handle().clone(),
            outstanding: AtomicUsize::new(0),
            idle: Notify::new(),
            stopped: AtomicBool::new(false),
        });
        tracing::debug!(flavor = ?config.flavor, "io context created");
        Ok(Self {
            runtime: Some(runtime),
            core,
        })
    }

    /// 可克隆的执行句柄。
    pub fn executor(&self) -> IoExecutor {
        IoExecutor {
            core: Arc::clone(&self.core),
        }
    }

    pub fn scheduler(&self) -> Scheduler<IoExecutor> {
        Scheduler::new(self.executor())
    }

    /// 驱动上下文直到没有未完成工作或被停止。
    pub fn run(&self) {
        tracing::debug!(outstanding = self.outstanding(), "io context run started");
        let core = Arc::clone(&self.core);
        self.block_on(async move {
            loop {
                let notified = core.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if core.stopped.load(Ordering::Acquire)
                    || core.outstanding.load(Ordering::Acquire) == 0
                {
                    break;
                }
                notified.await;
            }
        });
        tracing::debug!(outstanding = self.outstanding(), "io context run finished");
    }

    /// 让正在进行的 `run` 尽快返回；之后的 `run` 立即返回，直到 [`restart`](Self::restart)。
    pub fn stop(&self) {
        self.core.stopped.store(true, Ordering::Release);
        self.core.idle.notify_waiters();
    }

    pub fn restart(&self) {
        self.core.stopped.store(false, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.core.stopped.load(Ordering::Acquire)
    }

    /// 在上下文上阻塞运行一个 Future，期间同样驱动在途操作。
    ///
    /// # Panics
    /// 在 Tokio 运行时内部调用时 panic，与 `Runtime::block_on` 一致。
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        match &self.runtime {
            Some(runtime) => runtime.block_on(future),
            None => self.core.handle.block_on(future),
        }
    }

    /// 在途操作数量。
    pub fn outstanding(&self) -> usize {
        self.core.outstanding.load(Ordering::Acquire)
    }
}

impl Drop for IoContext {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// [`IoContext`] 的可克隆执行句柄。
#[derive(Clone)]
pub struct IoExecutor {
    core: Arc<ContextCore>,
}

impl IoExecutor {
    /// 把一个在途操作交给运行时；操作完成前计入未完成工作。
    pub(crate) fn spawn_op<F>(&self, op: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = WorkGuard::new(&self.core);
        self.core.handle.spawn(async move {
            let _guard = guard;
            op.await;
        });
    }

    /// 进入运行时上下文，供需要反应器的资源构造使用。
    pub(crate) fn enter(&self) -> EnterGuard<'_> {
        self.core.handle.enter()
    }

    pub fn handle(&self) -> &Handle {
        &self.core.handle
    }
}

impl ExecutionContext for IoExecutor {
    type Timer = SteadyTimer;

    fn post(&self, job: Job) {
        self.spawn_op(async move { job() });
    }

    fn make_timer(&self) -> SteadyTimer {
        SteadyTimer::new(self)
    }

    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn same_context(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

struct WorkGuard {
    core: Arc<ContextCore>,
}

impl WorkGuard {
    fn new(core: &Arc<ContextCore>) -> Self {
        core.outstanding.fetch_add(1, Ordering::AcqRel);
        Self {
            core: Arc::clone(core),
        }
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        if self.core.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.core.idle.notify_waiters();
        }
    }
}
