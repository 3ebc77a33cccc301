//! IO 上下文配置。
//!
//! 配置可以由构建器方法组装，也可以从 TOML 片段解析：
//!
//! ```toml
//! flavor = "multi_thread"
//! worker_threads = 4
//! thread_name = "edge-io"
//! ```

use crate::error::codes;
use serde::Deserialize;
use std::io;
use tokio::runtime::{Builder, Runtime};

/// 驱动线程模型。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeFlavor {
    /// 单驱动线程：调用 [`IoContext::run`](crate::IoContext::run) 的线程。
    #[default]
    CurrentThread,
    /// 工作线程池；回调可能在任一工作线程上运行。
    MultiThread,
}

/// [`IoContext`](crate::IoContext) 的构造参数。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IoContextConfig {
    pub flavor: RuntimeFlavor,
    /// 仅对 `multi_thread` 生效；缺省时由 Tokio 按 CPU 数决定。
    pub worker_threads: Option<usize>,
    pub thread_name: String,
    /// 文件读写所用阻塞线程池的上限。
    pub max_blocking_threads: Option<usize>,
}

impl Default for IoContextConfig {
    fn default() -> Self {
        Self {
            flavor: RuntimeFlavor::CurrentThread,
            worker_threads: None,
            thread_name: "flint-io".to_string(),
            max_blocking_threads: None,
        }
    }
}

/// 配置解析或运行时构建失败。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io context config is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("`{field}` must be at least 1")]
    ZeroThreads { field: &'static str },
    #[error("tokio runtime could not be built: {0}")]
    Runtime(#[source] io::Error),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Parse(_) => codes::CONFIG_PARSE,
            ConfigError::ZeroThreads { .. } => codes::CONFIG_INVALID,
            ConfigError::Runtime(_) => codes::CONFIG_RUNTIME,
        }
    }
}

impl IoContextConfig {
    pub fn current_thread() -> Self {
        Self::default()
    }

    pub fn multi_thread() -> Self {
        Self {
            flavor: RuntimeFlavor::MultiThread,
            ..Self::default()
        }
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = Some(threads);
        self
    }

    /// 从 TOML 解析并校验。
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == Some(0) {
            return Err(ConfigError::ZeroThreads {
                field: "worker_threads",
            });
        }
        if self.max_blocking_threads == Some(0) {
            return Err(ConfigError::ZeroThreads {
                field: "max_blocking_threads",
            });
        }
        Ok(())
    }

    pub(crate) fn build_runtime(&self) -> Result<Runtime, ConfigError> {
        self.validate()?;
        let mut builder = match self.flavor {
            RuntimeFlavor::CurrentThread => Builder::new_current_thread(),
            RuntimeFlavor::MultiThread => {
                let mut builder = Builder::new_multi_thread();
                if let Some(threads) = self.worker_threads {
                    builder.worker_threads(threads);
                }
                builder
            }
        };
        builder.enable_all().thread_name(self.thread_name.clone());
        if let Some(threads) = self.max_blocking_threads {
            builder.max_blocking_threads(threads);
        }
        builder.build().map_err(ConfigError::Runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = IoContextConfig::from_toml_str("").expect("空文档合法");
        assert_eq!(config, IoContextConfig::default());
        assert_eq!(config.flavor, RuntimeFlavor::CurrentThread);
    }

    #[test]
    fn parses_a_multi_thread_section() {
        let config = IoContextConfig::from_toml_str(
            r#"
            flavor = "multi_thread"
            worker_threads = 2
            thread_name = "edge-io"
            max_blocking_threads = 8
            "#,
        )
        .expect("合法配置");
        assert_eq!(
            config,
            IoContextConfig::multi_thread()
                .with_worker_threads(2)
                .with_thread_name("edge-io")
                .with_max_blocking_threads(8)
        );
    }

    #[test]
    fn zero_workers_are_rejected() {
        let error = IoContextConfig::from_toml_str("worker_threads = 0").expect_err("零线程非法");
        assert_eq!(error.code(), codes::CONFIG_INVALID);
        assert!(error.to_string().contains("worker_threads"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = IoContextConfig::from_toml_str("enable_quic = true").expect_err("未知键");
        assert_eq!(error.code(), codes::CONFIG_PARSE);
    }

    #[test]
    fn builds_both_runtime_flavors() {
        IoContextConfig::current_thread()
            .build_runtime()
            .expect("current_thread");
        IoContextConfig::multi_thread()
            .with_worker_threads(1)
            .build_runtime()
            .expect("multi_thread");
    }
}
