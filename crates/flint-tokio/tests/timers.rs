//! 定时器与调度器在真实运行时上的行为。

use flint_core::test_stubs::{CountingAllocator, Recorder};
use flint_core::{
    ExecutionContext, Task, TaskExt, TaskState, WaitableTimer, async_wait, async_wait_until,
};
use flint_tokio::IoContext;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn context() -> IoContext {
    IoContext::new().expect("构造 IO 上下文")
}

#[test]
fn schedule_after_waits_at_least_the_duration() {
    let ctx = context();
    let started = Instant::now();
    let fired_at = Arc::new(parking_lot::Mutex::new(None));
    let stamp = fired_at.clone();
    let recorder = Recorder::<(), Infallible>::new();
    let mut state = ctx
        .scheduler()
        .schedule_after(Duration::from_millis(40))
        .then(move |()| *stamp.lock() = Some(Instant::now()))
        .connect(recorder.sink());
    state.begin();
    ctx.run();

    let fired_at = (*fired_at.lock()).expect("定时器应已到期");
    assert!(fired_at.duration_since(started) >= Duration::from_millis(40));
    assert_eq!(recorder.successes(), vec![()]);
}

#[test]
fn schedule_at_fires_after_the_deadline() {
    let ctx = context();
    let scheduler = ctx.scheduler();
    let deadline = scheduler.now() + Duration::from_millis(25);
    let recorder = Recorder::<(), Infallible>::new();
    let mut state = scheduler.schedule_at(deadline).connect(recorder.sink());
    state.begin();
    ctx.run();

    assert!(scheduler.now() >= deadline);
    assert_eq!(recorder.successes(), vec![()]);
}

#[test]
fn past_deadline_completes_without_delay() {
    let ctx = context();
    let timer = ctx.executor().make_timer();
    let recorder = Recorder::<(), Infallible>::new();
    let mut state =
        async_wait_until(&timer, Instant::now() - Duration::from_millis(5)).connect(recorder.sink());
    state.begin();
    ctx.run();
    assert_eq!(recorder.successes(), vec![()]);
}

#[test]
fn cancel_releases_a_detached_wait() {
    let ctx = context();
    let timer = ctx.executor().make_timer();
    let allocator = CountingAllocator::new();
    async_wait(&timer, Duration::from_secs(60))
        .detach_in(allocator.clone())
        .expect("启动分离等待");
    assert_eq!(allocator.live(), 1);

    assert_eq!(timer.cancel(), 1);
    ctx.run();
    assert!(allocator.is_balanced());
    assert_eq!(ctx.outstanding(), 0);
}

#[test]
fn rearming_aborts_the_pending_wait() {
    let ctx = context();
    let timer = ctx.executor().make_timer();
    let first = Recorder::<(), Infallible>::new();
    let mut waiting = async_wait(&timer, Duration::from_secs(60)).connect(first.sink());
    waiting.begin();

    timer.expires_after(Duration::from_millis(1));
    ctx.run();
    assert_eq!(first.cancels(), 1);
    assert_eq!(first.fired(), 1);
}

#[test]
fn dropping_the_state_cancels_a_scheduled_wait() {
    let ctx = context();
    let recorder = Recorder::<(), Infallible>::new();
    let mut state = ctx
        .scheduler()
        .schedule_after(Duration::from_secs(60))
        .connect(recorder.sink());
    state.begin();
    drop(state);
    ctx.run();

    assert_eq!(recorder.cancels(), 1);
    assert_eq!(recorder.fired(), 1);
}

#[test]
fn destroying_the_timer_releases_a_detached_wait() {
    let ctx = context();
    let timer = ctx.executor().make_timer();
    let allocator = CountingAllocator::new();
    let expired = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = expired.clone();
    async_wait(&timer, Duration::from_secs(60))
        .then(move |()| flag.store(true, std::sync::atomic::Ordering::SeqCst))
        .detach_in(allocator.clone())
        .expect("启动分离等待");
    assert_eq!(allocator.live(), 1);

    drop(timer);
    ctx.run();
    assert!(!expired.load(std::sync::atomic::Ordering::SeqCst));
    assert!(allocator.is_balanced());
    assert_eq!(ctx.outstanding(), 0);
}

#[test]
fn destroying_the_timer_cancels_an_attached_wait() {
    let ctx = context();
    let timer = ctx.executor().make_timer();
    let recorder = Recorder::<(), Infallible>::new();
    let mut state = async_wait(&timer, Duration::from_secs(60)).connect(recorder.sink());
    state.begin();

    drop(timer);
    ctx.run();
    assert_eq!(recorder.cancels(), 1);
    assert_eq!(recorder.fired(), 1);
}
