//! TLS 会话：自签名证书上的握手、往返与原生关闭。

use flint_core::test_stubs::Recorder;
use flint_core::{
    IoBuffer, Task, TaskExt, TaskState, async_accept, async_close, async_connect, async_handshake,
    async_read, async_read_some, async_write,
};
use flint_tokio::{
    IoContext, TcpAcceptor, TcpSocket, TlsRole, TlsSocket, code_of, codes, crypto_provider,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

/// 为 `localhost` 签发自签名证书，返回服务端配置与只信任该证书的客户端配置。
fn tls_configs() -> (Arc<ServerConfig>, Arc<ClientConfig>) {
    let certified =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).expect("签发证书");
    let cert: CertificateDer<'static> = certified.cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

    let server = ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .expect("协议版本")
        .with_no_client_auth()
        .with_single_cert(vec![cert.clone()], key)
        .expect("服务端配置");

    let mut roots = RootCertStore::empty();
    roots.add(cert).expect("加入根证书");
    let client = ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .expect("协议版本")
        .with_root_certificates(roots)
        .with_no_client_auth();

    (Arc::new(server), Arc::new(client))
}

fn server_name() -> ServerName<'static> {
    ServerName::try_from("localhost").expect("合法主机名")
}

#[test]
fn handshake_ping_pong_and_native_close() {
    let (server_config, client_config) = tls_configs();
    let ctx = IoContext::new().expect("构造 IO 上下文");
    let executor = ctx.executor();
    let loopback: SocketAddr = "127.0.0.1:0".parse().expect("地址");
    let acceptor = TcpAcceptor::bind(&executor, loopback).expect("绑定监听");
    let target = acceptor.local_addr();

    let request = IoBuffer::new(4);
    let request_slot = request.clone();
    let after_close = IoBuffer::new(1);
    let after_close_slot = after_close.clone();
    let served = Recorder::<usize, io::Error>::new();
    let mut serve = async_accept(&acceptor)
        .let_value(move |conn: TcpSocket| {
            let tls = TlsSocket::server(&conn, server_config);
            let reader = tls.clone();
            let writer = tls.clone();
            let drained = tls.clone();
            async_handshake(&tls, TlsRole::Server)
                .let_value(move |()| async_read(&reader, request_slot))
                .let_value(move |_| async_write(&writer, IoBuffer::from("PONG")))
                .let_value(move |_| async_read_some(&drained, after_close_slot))
        })
        .connect(served.sink());

    let tcp = TcpSocket::new(&executor);
    let client = TlsSocket::client(&tcp, client_config);
    let (shaker, writer, reader, closer) =
        (client.clone(), client.clone(), client.clone(), client.clone());
    let reply = IoBuffer::new(4);
    let reply_slot = reply.clone();
    let close_executor = executor.clone();
    let finished = Recorder::<(), io::Error>::new();
    let mut call = async_connect(&tcp, [target])
        .let_value(move |_| async_handshake(&shaker, TlsRole::Client(server_name())))
        .let_value(move |()| async_write(&writer, IoBuffer::from("PING")))
        .let_value(move |_| async_read(&reader, reply_slot))
        .let_value(move |_| async_close(&closer, &close_executor))
        .connect(finished.sink());

    serve.begin();
    call.begin();
    ctx.run();

    assert_eq!(request.to_vec(), b"PING");
    assert_eq!(reply.to_vec(), b"PONG");
    assert_eq!(finished.take_successes(), vec![()]);
    assert!(!client.is_established());
    assert_eq!(served.take_successes(), vec![0], "close_notify 之后对端读到流结束");
}

#[test]
fn mismatched_role_is_rejected_and_keeps_the_tcp_stream() {
    let (_, client_config) = tls_configs();
    let ctx = IoContext::new().expect("构造 IO 上下文");
    let executor = ctx.executor();
    let loopback: SocketAddr = "127.0.0.1:0".parse().expect("地址");
    let acceptor = TcpAcceptor::bind(&executor, loopback).expect("绑定监听");
    let target = acceptor.local_addr();

    let accepted = Recorder::<TcpSocket, io::Error>::new();
    let mut accept = async_accept(&acceptor).connect(accepted.sink());
    let tcp = TcpSocket::new(&executor);
    let tls = TlsSocket::client(&tcp, client_config);
    let shaker = tls.clone();
    let recorder = Recorder::<(), io::Error>::new();
    let mut call = async_connect(&tcp, [target])
        .let_value(move |_| async_handshake(&shaker, TlsRole::Server))
        .connect(recorder.sink());
    accept.begin();
    call.begin();
    ctx.run();

    let failures = recorder.take_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind(), io::ErrorKind::InvalidInput);
    assert_eq!(code_of(&failures[0]), Some(codes::TLS_ROLE_MISMATCH));
    assert!(tls.lower().is_open());
    assert!(!tls.is_established());
    assert_eq!(accepted.fired(), 1);
}

#[test]
fn handshake_on_an_unconnected_socket_fails() {
    let (_, client_config) = tls_configs();
    let ctx = IoContext::new().expect("构造 IO 上下文");
    let tcp = TcpSocket::new(&ctx.executor());
    let tls = TlsSocket::client(&tcp, client_config);
    let recorder = Recorder::<(), io::Error>::new();
    let mut state =
        async_handshake(&tls, TlsRole::Client(server_name())).connect(recorder.sink());
    state.begin();
    ctx.run();

    let failures = recorder.take_failures();
    assert_eq!(failures[0].kind(), io::ErrorKind::NotConnected);
    assert_eq!(code_of(&failures[0]), Some(codes::STREAM_UNOPENED));
}
