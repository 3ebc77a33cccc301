use crate::context::IoExecutor;
use crate::error::{BLOCKING_TASK_FAILED, engine_error};
use flint_core::{Callback, IoBuffer, RandomAccessRead, RandomAccessWrite};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;

/// 按偏移读写的文件句柄。
///
/// 读写在阻塞线程池上以 `pread`/`pwrite` 执行，回调回到驱动线程上运行；越过文件末尾的
/// 读取成功返回 `0` 字节。
#[derive(Clone)]
pub struct RandomAccessFile {
    executor: IoExecutor,
    file: Arc<File>,
}

impl RandomAccessFile {
    /// 以只读方式打开。
    pub fn open(executor: &IoExecutor, path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::from_std(executor, File::open(path)?))
    }

    /// 以读写方式打开，不存在时创建，已存在时截断。
    pub fn create(executor: &IoExecutor, path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::from_std(executor, file))
    }

    pub fn from_std(executor: &IoExecutor, file: File) -> Self {
        Self {
            executor: executor.clone(),
            file: Arc::new(file),
        }
    }

    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    fn run_blocking<F>(&self, callback: Callback<usize>, op: F)
    where
        F: FnOnce(&File) -> io::Result<usize> + Send + 'static,
    {
        let file = Arc::clone(&self.file);
        self.executor.spawn_op(async move {
            let result = tokio::task::spawn_blocking(move || op(&file))
                .await
                .unwrap_or_else(|join| {
                    tracing::error!(error = %join, "blocking file task failed");
                    Err(engine_error(BLOCKING_TASK_FAILED, io::ErrorKind::Other))
                });
            callback(result);
        });
    }
}

impl RandomAccessRead for RandomAccessFile {
    fn async_read_some_at(&self, offset: u64, buffer: IoBuffer, callback: Callback<usize>) {
        self.run_blocking(callback, move |file| {
            let mut scratch = vec![0u8; buffer.len()];
            let n = file.read_at(&mut scratch, offset)?;
            Ok(buffer.copy_in(&scratch[..n]))
        });
    }
}

impl RandomAccessWrite for RandomAccessFile {
    fn async_write_some_at(&self, offset: u64, buffer: IoBuffer, callback: Callback<usize>) {
        self.run_blocking(callback, move |file| {
            let bytes = buffer.to_vec();
            file.write_at(&bytes, offset)
        });
    }
}
