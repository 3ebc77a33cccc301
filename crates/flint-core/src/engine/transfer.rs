//! 引擎侧的“传输直到缓冲区耗尽”辅助。
//!
//! 只依赖 `*_some` 原语循环推进；适配器本身不含重试逻辑，整块语义由这里或流的原生实现提供。

use super::{AsyncReadStream, AsyncWriteStream, Callback};
use crate::buffer::IoBuffer;
use std::io;

/// 循环 `async_read_some` 直到读满 `buffer`。
///
/// - 成功时回调 `buffer.len()`；
/// - 中途读到 `0` 字节（流结束）时以 `UnexpectedEof` 失败；
/// - 空缓冲区立即以 `Ok(0)` 回调。
pub fn read_full<S>(stream: &S, buffer: IoBuffer, callback: Callback<usize>)
where
    S: AsyncReadStream,
{
    read_step(stream.clone(), buffer, 0, callback);
}

fn read_step<S>(stream: S, buffer: IoBuffer, done: usize, callback: Callback<usize>)
where
    S: AsyncReadStream,
{
    if done == buffer.len() {
        callback(Ok(done));
        return;
    }
    let rest = buffer.slice(done..);
    let next = stream.clone();
    stream.async_read_some(
        rest,
        Box::new(move |result| match result {
            Ok(0) => callback(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended before the buffer was filled",
            ))),
            Ok(n) => read_step(next, buffer, done + n, callback),
            Err(error) => callback(Err(error)),
        }),
    );
}

/// 循环 `async_write_some` 直到写完 `buffer`。
///
/// 某次写出 `0` 字节时以 `WriteZero` 失败。
pub fn write_full<S>(stream: &S, buffer: IoBuffer, callback: Callback<usize>)
where
    S: AsyncWriteStream,
{
    write_step(stream.clone(), buffer, 0, callback);
}

fn write_step<S>(stream: S, buffer: IoBuffer, done: usize, callback: Callback<usize>)
where
    S: AsyncWriteStream,
{
    if done == buffer.len() {
        callback(Ok(done));
        return;
    }
    let rest = buffer.slice(done..);
    let next = stream.clone();
    stream.async_write_some(
        rest,
        Box::new(move |result| match result {
            Ok(0) => callback(Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "stream accepted zero bytes",
            ))),
            Ok(n) => write_step(next, buffer, done + n, callback),
            Err(error) => callback(Err(error)),
        }),
    );
}
