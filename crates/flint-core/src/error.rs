//! 启动期错误。
//!
//! 引擎错误保持 `std::io::Error` 原样经失败通道传递；这里只涵盖在 Task 真正启动之前、
//! 由分离执行器自身产生的错误。

use crate::allocator::AllocError;

/// 稳定错误码。
pub mod codes {
    pub const DETACHED_ALLOC_FAILED: &str = "flint.detached.alloc_failed";
}

/// 分离执行在启动前失败。
///
/// 返回该错误时 Task 未被连接，分配器中没有残留的内存块。
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("detached task storage could not be allocated: {0}")]
    Allocation(#[from] AllocError),
}

impl LaunchError {
    pub fn code(&self) -> &'static str {
        match self {
            LaunchError::Allocation(_) => codes::DETACHED_ALLOC_FAILED,
        }
    }
}
