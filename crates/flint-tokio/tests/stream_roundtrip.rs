//! 字节流端到端行为：内存双工流与 TCP 上的 PING/PONG、繁忙检测与关闭回退。

use flint_core::adapters::CloseMode;
use flint_core::test_stubs::Recorder;
use flint_core::{
    IoBuffer, Task, TaskExt, TaskState, async_accept, async_close, async_connect, async_read,
    async_read_some, async_write,
};
use flint_tokio::{DuplexSocket, IoContext, TcpAcceptor, TcpSocket, TlsSocket, code_of, codes};
use std::io;
use std::net::SocketAddr;

fn context() -> IoContext {
    IoContext::new().expect("构造 IO 上下文")
}

#[test]
fn duplex_ping_pong() {
    let ctx = context();
    let (client, server) = DuplexSocket::pair(&ctx.executor(), 64);

    let request = IoBuffer::new(4);
    let responder = server.clone();
    let served = Recorder::<usize, io::Error>::new();
    let mut serve = async_read(&server, request.clone())
        .let_value(move |_| async_write(&responder, IoBuffer::from("PONG")))
        .connect(served.sink());

    let reply = IoBuffer::new(4);
    let reader = client.clone();
    let reply_slot = reply.clone();
    let answered = Recorder::<usize, io::Error>::new();
    let mut call = async_write(&client, IoBuffer::from("PING"))
        .let_value(move |_| async_read(&reader, reply_slot))
        .connect(answered.sink());

    serve.begin();
    call.begin();
    ctx.run();

    assert_eq!(request.to_vec(), b"PING");
    assert_eq!(reply.to_vec(), b"PONG");
    assert_eq!(served.take_successes(), vec![4]);
    assert_eq!(answered.take_successes(), vec![4]);
    assert_eq!(ctx.outstanding(), 0);
}

#[test]
fn tcp_accept_connect_ping_pong() {
    let ctx = context();
    let executor = ctx.executor();
    let loopback: SocketAddr = "127.0.0.1:0".parse().expect("地址");
    let acceptor = TcpAcceptor::bind(&executor, loopback).expect("绑定监听");
    let target = acceptor.local_addr();

    let request = IoBuffer::new(4);
    let request_slot = request.clone();
    let served = Recorder::<usize, io::Error>::new();
    let mut serve = async_accept(&acceptor)
        .let_value(move |conn: TcpSocket| {
            let responder = conn.clone();
            async_read(&conn, request_slot)
                .let_value(move |_| async_write(&responder, IoBuffer::from("PONG")))
        })
        .connect(served.sink());

    let client = TcpSocket::new(&executor);
    let writer = client.clone();
    let reader = client.clone();
    let reply = IoBuffer::new(4);
    let reply_slot = reply.clone();
    let answered = Recorder::<usize, io::Error>::new();
    let mut call = async_connect(&client, [target])
        .let_value(move |peer| {
            assert_eq!(peer, target);
            async_write(&writer, IoBuffer::from("PING"))
        })
        .let_value(move |_| async_read(&reader, reply_slot))
        .connect(answered.sink());

    serve.begin();
    call.begin();
    ctx.run();

    assert_eq!(request.to_vec(), b"PING");
    assert_eq!(reply.to_vec(), b"PONG");
    assert_eq!(served.fired(), 1);
    assert_eq!(answered.take_successes(), vec![4]);
    assert!(client.is_open());
}

#[test]
fn connect_without_endpoints_fails_not_found() {
    let ctx = context();
    let client = TcpSocket::new(&ctx.executor());
    let recorder = Recorder::<SocketAddr, io::Error>::new();
    let mut state = async_connect(&client, Vec::new()).connect(recorder.sink());
    state.begin();
    ctx.run();

    let failures = recorder.take_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind(), io::ErrorKind::NotFound);
    assert_eq!(code_of(&failures[0]), Some(codes::NO_ENDPOINTS));
    assert!(!client.is_open());
}

#[test]
fn concurrent_reads_in_one_direction_report_busy() {
    let ctx = context();
    let (left, right) = DuplexSocket::pair(&ctx.executor(), 16);

    let first = Recorder::<usize, io::Error>::new();
    let second = Recorder::<usize, io::Error>::new();
    let mut a = async_read_some(&left, IoBuffer::new(8)).connect(first.sink());
    let mut b = async_read_some(&left, IoBuffer::new(8)).connect(second.sink());
    let fed = Recorder::<usize, io::Error>::new();
    let mut feed = async_write(&right, IoBuffer::from("x")).connect(fed.sink());
    a.begin();
    b.begin();
    feed.begin();
    ctx.run();

    assert_eq!(first.take_successes(), vec![1]);
    assert_eq!(fed.take_successes(), vec![1]);
    let failures = second.take_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind(), io::ErrorKind::WouldBlock);
    assert_eq!(code_of(&failures[0]), Some(codes::STREAM_BUSY));
}

#[test]
fn plain_sockets_close_through_the_posted_fallback() {
    assert_eq!(CloseMode::of::<TcpSocket>(), CloseMode::Posted);
    assert_eq!(CloseMode::of::<TlsSocket>(), CloseMode::Native);

    let ctx = context();
    let executor = ctx.executor();
    let (left, _right) = DuplexSocket::pair(&executor, 16);
    let closed = Recorder::<(), io::Error>::new();
    let mut state = async_close(&left, &executor).connect(closed.sink());
    state.begin();
    assert_eq!(closed.fired(), 0, "关闭回退经上下文投递");
    ctx.run();

    assert_eq!(closed.take_successes(), vec![()]);
    assert!(!left.is_open());

    let after = Recorder::<usize, io::Error>::new();
    let mut read = async_read_some(&left, IoBuffer::new(1)).connect(after.sink());
    read.begin();
    ctx.run();
    let failures = after.take_failures();
    assert_eq!(failures[0].kind(), io::ErrorKind::NotConnected);
    assert_eq!(code_of(&failures[0]), Some(codes::STREAM_CLOSED));
}

#[test]
fn close_aborts_an_in_flight_read() {
    let ctx = context();
    let (left, _right) = DuplexSocket::pair(&ctx.executor(), 16);
    let pending = Recorder::<usize, io::Error>::new();
    let mut read = async_read(&left, IoBuffer::new(4)).connect(pending.sink());
    read.begin();
    flint_core::Closable::close(&left).expect("同步关闭");
    ctx.run();

    let failures = pending.take_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind(), io::ErrorKind::ConnectionAborted);
    assert_eq!(code_of(&failures[0]), Some(codes::STREAM_ABORTED));
}
