//! 从 TOML 构造 IO 上下文。

use flint_core::test_stubs::Recorder;
use flint_core::{Task, TaskExt, TaskState, just};
use flint_tokio::{IoContext, IoContextConfig, RuntimeFlavor};
use std::convert::Infallible;

#[test]
fn multi_thread_context_from_toml_runs_work() {
    let config = IoContextConfig::from_toml_str(
        r#"
        flavor = "multi_thread"
        worker_threads = 2
        thread_name = "flint-it"
        "#,
    )
    .expect("解析配置");
    assert_eq!(config.flavor, RuntimeFlavor::MultiThread);

    let ctx = IoContext::with_config(&config).expect("构造 IO 上下文");
    let recorder = Recorder::<&'static str, Infallible>::new();
    let mut state = ctx
        .scheduler()
        .schedule()
        .let_value(|()| just("ran"))
        .connect(recorder.sink());
    state.begin();
    ctx.run();
    assert_eq!(recorder.successes(), vec!["ran"]);
}

#[test]
fn zero_worker_threads_is_rejected() {
    let config = IoContextConfig::multi_thread().with_worker_threads(0);
    let error = IoContext::with_config(&config).err().expect("零线程配置应被拒绝");
    assert_eq!(error.code(), flint_tokio::codes::CONFIG_INVALID);
}
