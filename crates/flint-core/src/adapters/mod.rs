//! 原语适配器：每个适配器把一次引擎回调翻译为一次完成契约触发。
//!
//! 所有适配器遵循同一形态：构造函数克隆资源句柄并捕获参数，`connect` 只组装执行记录，
//! `begin` 把 Sink 移入引擎回调并立即返回。适配器不重试、不改写引擎错误；定时等待是
//! 唯一例外，见 [`wait`]。

mod accept;
mod close;
mod connect;
mod handshake;
mod read;
mod resolve;
pub(crate) mod wait;
mod write;

pub use accept::{AsyncAccept, AsyncAcceptState, async_accept};
pub use close::{AsyncClose, AsyncCloseState, CloseMode, async_close};
pub use connect::{AsyncConnect, AsyncConnectState, async_connect};
pub use handshake::{AsyncHandshake, AsyncHandshakeState, async_handshake};
pub use read::{
    AsyncRead, AsyncReadSome, AsyncReadSomeAt, AsyncReadSomeAtState, AsyncReadSomeState,
    AsyncReadState, async_read, async_read_some, async_read_some_at,
};
pub use resolve::{AsyncResolve, AsyncResolveState, async_resolve};
pub use wait::{AsyncWait, AsyncWaitState, async_wait, async_wait_until};
pub use write::{
    AsyncWrite, AsyncWriteSome, AsyncWriteSomeAt, AsyncWriteSomeAtState, AsyncWriteSomeState,
    AsyncWriteState, async_write, async_write_some, async_write_some_at,
};
