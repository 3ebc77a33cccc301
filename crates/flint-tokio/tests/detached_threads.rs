//! 多驱动线程下的分离执行：槽位可能在任一工作线程上完成并归还。

use flint_core::TaskExt;
use flint_core::test_stubs::CountingAllocator;
use flint_tokio::{IoContext, IoContextConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const LAUNCHES: usize = 256;

fn multi_thread_context() -> IoContext {
    IoContext::with_config(&IoContextConfig::multi_thread().with_worker_threads(4))
        .expect("构造多线程 IO 上下文")
}

#[test]
fn scheduled_detaches_balance_across_worker_threads() {
    let ctx = multi_thread_context();
    let scheduler = ctx.scheduler();
    let allocator = CountingAllocator::new();
    let completed = Arc::new(AtomicUsize::new(0));

    for index in 0..LAUNCHES {
        let counter = completed.clone();
        let launched = if index % 2 == 0 {
            scheduler
                .schedule()
                .then(move |()| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .detach_in(allocator.clone())
        } else {
            scheduler
                .schedule_after(Duration::from_millis((index % 7) as u64))
                .then(move |()| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .detach_in(allocator.clone())
        };
        launched.expect("启动分离任务");
    }
    ctx.run();

    assert_eq!(completed.load(Ordering::SeqCst), LAUNCHES);
    assert_eq!(allocator.allocations(), LAUNCHES);
    assert!(allocator.is_balanced());
    assert_eq!(ctx.outstanding(), 0);
}

#[test]
fn detaches_launched_from_many_threads_balance() {
    let ctx = multi_thread_context();
    let allocator = CountingAllocator::new();
    let completed = Arc::new(AtomicUsize::new(0));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let scheduler = ctx.scheduler();
            let allocator = allocator.clone();
            let completed = completed.clone();
            scope.spawn(move || {
                for _ in 0..LAUNCHES / 4 {
                    let counter = completed.clone();
                    scheduler
                        .schedule_after(Duration::from_millis(1))
                        .then(move |()| {
                            counter.fetch_add(1, Ordering::SeqCst);
                        })
                        .detach_in(allocator.clone())
                        .expect("启动分离任务");
                }
            });
        }
    });
    ctx.run();

    assert_eq!(completed.load(Ordering::SeqCst), LAUNCHES);
    assert!(allocator.is_balanced());
}
