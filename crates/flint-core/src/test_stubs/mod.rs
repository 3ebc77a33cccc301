//! 确定性测试桩。
//!
//! - [`ManualContext`]：手动驱动的执行上下文，虚拟时钟只在 [`ManualContext::advance`]
//!   时前进；
//! - [`LoopbackStream`]：成对的内存字节流，完成经由上下文投递；
//! - 脚本化资源：回调被排队，由测试显式完成或丢弃；
//! - [`Recorder`]：记录三通道触发次数与负载；
//! - [`CountingAllocator`]：统计分离执行器的申请与归还。

mod allocator;
mod context;
mod loopback;
mod recorder;
mod scripted;

pub use allocator::CountingAllocator;
pub use context::{ManualContext, ManualTimer};
pub use loopback::LoopbackStream;
pub use recorder::{Recorder, RecordingSink};
pub use scripted::{
    CallbackQueue, MemoryFile, NativeCloser, ScriptedAcceptor, ScriptedConnector,
    ScriptedHandshake, ScriptedResolver,
};

#[cfg(test)]
mod tests {
    use crate::{API_VERSION, VERSION_STRING};

    #[test]
    fn version_string_tracks_the_api_version() {
        assert_eq!(VERSION_STRING, format!("flint/{API_VERSION}"));
    }
}
