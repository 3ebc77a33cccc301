//! 共享字节区间。
//!
//! 回调式引擎要求缓冲区在 `begin` 与回调之间持续有效；这里以引用计数的存储加区间
//! 表达“调用方持有、引擎借用”的缓冲视图。克隆共享同一块存储。

use parking_lot::Mutex;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

/// 定长、可共享的字节区间。
///
/// # 契约说明（What）
/// - 长度在构造后固定；读适配器报告的字节数永不超过 [`len`](Self::len)；
/// - [`slice`](Self::slice) 返回共享存储的子区间，写入子区间对原区间可见；
/// - 内部锁只在拷贝期间持有，引擎不会跨 `.await` 持锁。
#[derive(Clone)]
pub struct IoBuffer {
    storage: Arc<Mutex<Vec<u8>>>,
    start: usize,
    end: usize,
}

impl IoBuffer {
    /// 分配 `len` 字节的零填充区间。
    pub fn new(len: usize) -> Self {
        Self::from_vec(vec![0; len])
    }

    /// 接管已有字节。
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let end = bytes.len();
        Self {
            storage: Arc::new(Mutex::new(bytes)),
            start: 0,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// 取子区间。
    ///
    /// # Panics
    /// 区间越界或起点大于终点时 panic，与切片索引一致。
    pub fn slice(&self, range: impl RangeBounds<usize>) -> IoBuffer {
        let len = self.len();
        let from = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n + 1,
            Bound::Unbounded => 0,
        };
        let to = match range.end_bound() {
            Bound::Included(&n) => n + 1,
            Bound::Excluded(&n) => n,
            Bound::Unbounded => len,
        };
        assert!(
            from <= to && to <= len,
            "IoBuffer::slice {from}..{to} out of range for length {len}"
        );
        IoBuffer {
            storage: Arc::clone(&self.storage),
            start: self.start + from,
            end: self.start + to,
        }
    }

    /// 拷贝出区间内容。
    pub fn to_vec(&self) -> Vec<u8> {
        self.with_bytes(<[u8]>::to_vec)
    }

    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.storage.lock();
        f(&guard[self.start..self.end])
    }

    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.storage.lock();
        f(&mut guard[self.start..self.end])
    }

    /// 从区间头部写入 `src`，返回实际写入的字节数（不超过区间长度）。
    pub fn copy_in(&self, src: &[u8]) -> usize {
        self.with_bytes_mut(|dst| {
            let n = dst.len().min(src.len());
            dst[..n].copy_from_slice(&src[..n]);
            n
        })
    }

    /// 两个区间是否共享同一块存储。
    pub fn shares_storage(&self, other: &IoBuffer) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }
}

impl From<Vec<u8>> for IoBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}

impl From<&[u8]> for IoBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self::from_vec(bytes.to_vec())
    }
}

impl From<&str> for IoBuffer {
    fn from(text: &str) -> Self {
        Self::from_vec(text.as_bytes().to_vec())
    }
}

impl fmt::Debug for IoBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoBuffer")
            .field("start", &self.start)
            .field("len", &self.len())
            .finish()
    }
}
