use crate::context::IoExecutor;
use crate::socket::StreamSocket;
use tokio::io::DuplexStream;

/// 内存双工字节流，两端各自拥有 `max_buf_size` 字节的写缓冲。
pub type DuplexSocket = StreamSocket<DuplexStream>;

impl StreamSocket<DuplexStream> {
    pub fn pair(executor: &IoExecutor, max_buf_size: usize) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(max_buf_size);
        (Self::from_io(executor, a), Self::from_io(executor, b))
    }
}
