//! TLS 分层传输。
//!
//! # 契约说明（What）
//! - [`TlsSocket`] 包装一个已连接的 [`TcpSocket`]：握手时取走底层 TCP 流，成功后读写
//!   全部经由 TLS 会话；
//! - 握手参数 [`TlsRole`] 必须与构造时的配置一致，否则以 `flint.tokio.tls_role_mismatch`
//!   失败且底层 TCP 流保持不变；
//! - 具备原生异步关闭：先发送 `close_notify` 并关闭写方向，再释放连接。
//!
//! 加密后端统一为 `ring`，见 [`crypto_provider`]。

use crate::error::{TLS_ROLE_MISMATCH, engine_error};
use crate::socket::StreamSocket;
use crate::tcp::TcpSocket;
use flint_core::{
    AsyncReadStream, AsyncWriteStream, Callback, Closable, ExecutionContext, Handshake, IoBuffer,
};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ServerConfig};
use std::io;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::{TlsAcceptor, TlsConnector, TlsStream};

/// 工作区统一使用的 `ring` 加密后端。
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// 握手角色。
#[derive(Clone, Debug)]
pub enum TlsRole {
    /// 以客户端身份握手，校验对端证书中的名称。
    Client(ServerName<'static>),
    Server,
}

#[derive(Clone)]
enum TlsSettings {
    Client(Arc<ClientConfig>),
    Server(Arc<ServerConfig>),
}

/// TLS 会话套接字。
#[derive(Clone)]
pub struct TlsSocket {
    lower: TcpSocket,
    settings: TlsSettings,
    session: StreamSocket<TlsStream<TcpStream>>,
}

impl TlsSocket {
    pub fn client(lower: &TcpSocket, config: Arc<ClientConfig>) -> Self {
        Self::with_settings(lower, TlsSettings::Client(config))
    }

    pub fn server(lower: &TcpSocket, config: Arc<ServerConfig>) -> Self {
        Self::with_settings(lower, TlsSettings::Server(config))
    }

    fn with_settings(lower: &TcpSocket, settings: TlsSettings) -> Self {
        Self {
            lower: lower.clone(),
            settings,
            session: StreamSocket::unopened(lower.executor()),
        }
    }

    /// 握手已完成且会话未关闭。
    pub fn is_established(&self) -> bool {
        self.session.is_open()
    }

    pub fn lower(&self) -> &TcpSocket {
        &self.lower
    }
}

impl Handshake for TlsSocket {
    type Args = TlsRole;

    fn async_handshake(&self, role: TlsRole, callback: Callback<()>) {
        let executor = self.lower.executor().clone();
        let matched = matches!(
            (&role, &self.settings),
            (TlsRole::Client(_), TlsSettings::Client(_)) | (TlsRole::Server, TlsSettings::Server(_))
        );
        if !matched {
            executor.post(Box::new(move || {
                callback(Err(engine_error(TLS_ROLE_MISMATCH, io::ErrorKind::InvalidInput)))
            }));
            return;
        }
        let stream = match self.lower.take_stream() {
            Ok(stream) => stream,
            Err(error) => {
                executor.post(Box::new(move || callback(Err(error))));
                return;
            }
        };
        let settings = self.settings.clone();
        let session = self.session.clone();
        executor.spawn_op(async move {
            let established = match (role, settings) {
                (TlsRole::Client(name), TlsSettings::Client(config)) => TlsConnector::from(config)
                    .connect(name, stream)
                    .await
                    .map(TlsStream::from),
                (_, TlsSettings::Server(config)) => TlsAcceptor::from(config)
                    .accept(stream)
                    .await
                    .map(TlsStream::from),
                (TlsRole::Server, TlsSettings::Client(_)) => {
                    Err(engine_error(TLS_ROLE_MISMATCH, io::ErrorKind::InvalidInput))
                }
            };
            match established {
                Ok(tls) => {
                    tracing::trace!("tls handshake completed");
                    session.install(tls);
                    callback(Ok(()));
                }
                Err(error) => {
                    tracing::debug!(%error, "tls handshake failed");
                    callback(Err(error));
                }
            }
        });
    }
}

impl AsyncReadStream for TlsSocket {
    fn async_read_some(&self, buffer: IoBuffer, callback: Callback<usize>) {
        self.session.async_read_some(buffer, callback);
    }

    fn async_read(&self, buffer: IoBuffer, callback: Callback<usize>) {
        self.session.async_read(buffer, callback);
    }
}

impl AsyncWriteStream for TlsSocket {
    fn async_write_some(&self, buffer: IoBuffer, callback: Callback<usize>) {
        self.session.async_write_some(buffer, callback);
    }

    fn async_write(&self, buffer: IoBuffer, callback: Callback<usize>) {
        self.session.async_write(buffer, callback);
    }
}

impl Closable for TlsSocket {
    const ASYNC_CLOSE: bool = true;

    fn close(&self) -> io::Result<()> {
        self.session.close()?;
        self.lower.close()
    }

    fn async_close(&self, callback: Callback<()>) {
        self.lower.close_now();
        self.session.shutdown_then_close(callback);
    }
}
