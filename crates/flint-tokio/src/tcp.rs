use crate::context::IoExecutor;
use crate::error::{NO_ENDPOINTS, engine_error};
use crate::socket::StreamSocket;
use flint_core::{Acceptor, Callback, Connectable};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// TCP 字节流套接字。
pub type TcpSocket = StreamSocket<TcpStream>;

impl StreamSocket<TcpStream> {
    /// 尚未连接的 TCP 套接字，经 [`Connectable::async_connect`] 建立连接。
    pub fn new(executor: &IoExecutor) -> Self {
        Self::unopened(executor)
    }
}

impl Connectable for StreamSocket<TcpStream> {
    type Endpoint = SocketAddr;

    fn async_connect(&self, endpoints: Vec<SocketAddr>, callback: Callback<SocketAddr>) {
        let socket = self.clone();
        self.executor().spawn_op(async move {
            let mut last_error = None;
            for endpoint in endpoints {
                match TcpStream::connect(endpoint).await {
                    Ok(stream) => {
                        if let Err(error) = stream.set_nodelay(true) {
                            tracing::debug!(%error, "TCP_NODELAY not applied");
                        }
                        socket.install(stream);
                        callback(Ok(endpoint));
                        return;
                    }
                    Err(error) => {
                        tracing::trace!(%endpoint, %error, "endpoint refused; trying next");
                        last_error = Some(error);
                    }
                }
            }
            callback(Err(last_error
                .unwrap_or_else(|| engine_error(NO_ENDPOINTS, io::ErrorKind::NotFound))));
        });
    }
}

/// TCP 监听器。
#[derive(Clone)]
pub struct TcpAcceptor {
    executor: IoExecutor,
    listener: Arc<TcpListener>,
    local_addr: SocketAddr,
}

impl TcpAcceptor {
    /// 同步绑定并开始监听。端口为 `0` 时由系统分配，实际地址见 [`local_addr`](Self::local_addr)。
    pub fn bind(executor: &IoExecutor, addr: SocketAddr) -> io::Result<Self> {
        let std_listener = std::net::TcpListener::bind(addr)?;
        std_listener.set_nonblocking(true)?;
        let listener = {
            let _enter = executor.enter();
            TcpListener::from_std(std_listener)?
        };
        let local_addr = listener.local_addr()?;
        tracing::debug!(%local_addr, "tcp acceptor bound");
        Ok(Self {
            executor: executor.clone(),
            listener: Arc::new(listener),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Acceptor for TcpAcceptor {
    type Connection = TcpSocket;

    fn async_accept(&self, callback: Callback<TcpSocket>) {
        let listener = Arc::clone(&self.listener);
        let executor = self.executor.clone();
        self.executor.spawn_op(async move {
            let result = listener.accept().await.map(|(stream, peer)| {
                tracing::trace!(%peer, "tcp connection accepted");
                if let Err(error) = stream.set_nodelay(true) {
                    tracing::debug!(%error, "TCP_NODELAY not applied");
                }
                TcpSocket::from_io(&executor, stream)
            });
            callback(result);
        });
    }
}

