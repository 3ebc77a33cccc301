use crate::context::IoExecutor;
use crate::error::{NO_ENDPOINTS, engine_error};
use crate::socket::StreamSocket;
use flint_core::{Acceptor, Callback, Connectable};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};

/// 本地域字节流套接字。
pub type UnixSocket = StreamSocket<UnixStream>;

impl StreamSocket<UnixStream> {
    pub fn new(executor: &IoExecutor) -> Self {
        Self::unopened(executor)
    }

    /// 一对已相连的本地域套接字。
    pub fn pair(executor: &IoExecutor) -> io::Result<(Self, Self)> {
        let (a, b) = {
            let _enter = executor.enter();
            UnixStream::pair()?
        };
        Ok((Self::from_io(executor, a), Self::from_io(executor, b)))
    }
}

impl Connectable for StreamSocket<UnixStream> {
    type Endpoint = PathBuf;

    fn async_connect(&self, endpoints: Vec<PathBuf>, callback: Callback<PathBuf>) {
        let socket = self.clone();
        self.executor().spawn_op(async move {
            let mut last_error = None;
            for endpoint in endpoints {
                match UnixStream::connect(&endpoint).await {
                    Ok(stream) => {
                        socket.install(stream);
                        callback(Ok(endpoint));
                        return;
                    }
                    Err(error) => last_error = Some(error),
                }
            }
            callback(Err(last_error
                .unwrap_or_else(|| engine_error(NO_ENDPOINTS, io::ErrorKind::NotFound))));
        });
    }
}

/// 本地域监听器。
#[derive(Clone)]
pub struct UnixAcceptor {
    executor: IoExecutor,
    listener: Arc<UnixListener>,
    path: PathBuf,
}

impl UnixAcceptor {
    pub fn bind(executor: &IoExecutor, path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let std_listener = std::os::unix::net::UnixListener::bind(&path)?;
        std_listener.set_nonblocking(true)?;
        let listener = {
            let _enter = executor.enter();
            UnixListener::from_std(std_listener)?
        };
        Ok(Self {
            executor: executor.clone(),
            listener: Arc::new(listener),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Acceptor for UnixAcceptor {
    type Connection = UnixSocket;

    fn async_accept(&self, callback: Callback<UnixSocket>) {
        let listener = Arc::clone(&self.listener);
        let executor = self.executor.clone();
        self.executor.spawn_op(async move {
            let result = listener
                .accept()
                .await
                .map(|(stream, _)| UnixSocket::from_io(&executor, stream));
            callback(result);
        });
    }
}
