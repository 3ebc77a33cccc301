#![deny(unsafe_code)]
#![doc = r#"
# flint-tokio

## 设计动机（Why）
- 为 `flint-core` 的原语适配器提供一个真实的回调式 IO 引擎：每个 `async_*` 入口登记一个
  Tokio 任务，任务结束时恰好调用一次回调；
- 执行上下文 [`IoContext`] 保留事件循环语义：`run` 驱动在途操作，直到没有未完成工作。

## 资源一览（What）
- TCP：[`TcpAcceptor`]、[`TcpSocket`]、[`TcpResolver`]；
- 本地域套接字：[`UnixAcceptor`]、[`UnixSocket`]（仅 Unix）；
- 内存双工流：[`DuplexSocket`]；
- 定时器：[`SteadyTimer`]；
- 随机读写文件：[`RandomAccessFile`]（仅 Unix）；
- TLS：[`TlsSocket`]，握手参数为 [`TlsRole`]。

## 配置（How）
- [`IoContextConfig`] 选择驱动线程模型，可由 TOML 解析；错误统一为 [`ConfigError`]。
"#]

mod config;
mod context;
pub mod error;
mod resolver;
mod socket;
mod tcp;
mod timer;
mod tls;

mod duplex;
#[cfg(unix)]
mod file;
#[cfg(unix)]
mod unix;

pub use config::{ConfigError, IoContextConfig, RuntimeFlavor};
pub use context::{IoContext, IoExecutor};
pub use duplex::DuplexSocket;
pub use error::{code_of, codes};
#[cfg(unix)]
pub use file::RandomAccessFile;
pub use resolver::{TcpResolver, service_port};
pub use socket::{StreamSocket, Transport};
pub use tcp::{TcpAcceptor, TcpSocket};
pub use timer::SteadyTimer;
pub use tls::{TlsRole, TlsSocket, crypto_provider};
#[cfg(unix)]
pub use unix::{UnixAcceptor, UnixSocket};
