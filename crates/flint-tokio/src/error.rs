//! 引擎自身产生的错误。
//!
//! 底层 IO 错误原样透传；只有引擎自己判定的失败（未打开的流、并发占用、未知服务名等）
//! 在这里构造，消息以稳定错误码开头，便于日志检索与测试断言。

use std::io;

/// 稳定错误码。
pub mod codes {
    pub const STREAM_UNOPENED: &str = "flint.tokio.stream_unopened";
    pub const STREAM_CLOSED: &str = "flint.tokio.stream_closed";
    pub const STREAM_BUSY: &str = "flint.tokio.stream_busy";
    pub const STREAM_ABORTED: &str = "flint.tokio.stream_aborted";
    pub const NO_ENDPOINTS: &str = "flint.tokio.no_endpoints";
    pub const UNKNOWN_SERVICE: &str = "flint.tokio.unknown_service";
    pub const TLS_ROLE_MISMATCH: &str = "flint.tokio.tls_role_mismatch";
    pub const BLOCKING_TASK_FAILED: &str = "flint.tokio.blocking_task_failed";
    pub const CONFIG_PARSE: &str = "flint.tokio.config.parse_failed";
    pub const CONFIG_INVALID: &str = "flint.tokio.config.invalid";
    pub const CONFIG_RUNTIME: &str = "flint.tokio.config.runtime_failed";
}

/// 描述一次引擎操作对应的稳定错误码与默认文案。
#[derive(Clone, Copy, Debug)]
pub(crate) struct OperationKind {
    pub code: &'static str,
    pub message: &'static str,
}

pub(crate) const STREAM_UNOPENED: OperationKind = OperationKind {
    code: codes::STREAM_UNOPENED,
    message: "stream is not connected",
};
pub(crate) const STREAM_CLOSED: OperationKind = OperationKind {
    code: codes::STREAM_CLOSED,
    message: "stream has been closed",
};
pub(crate) const STREAM_BUSY: OperationKind = OperationKind {
    code: codes::STREAM_BUSY,
    message: "another operation is in flight in this direction",
};
pub(crate) const STREAM_ABORTED: OperationKind = OperationKind {
    code: codes::STREAM_ABORTED,
    message: "operation aborted by close",
};
pub(crate) const NO_ENDPOINTS: OperationKind = OperationKind {
    code: codes::NO_ENDPOINTS,
    message: "no endpoints to try",
};
pub(crate) const UNKNOWN_SERVICE: OperationKind = OperationKind {
    code: codes::UNKNOWN_SERVICE,
    message: "service is neither a port number nor a known name",
};
pub(crate) const TLS_ROLE_MISMATCH: OperationKind = OperationKind {
    code: codes::TLS_ROLE_MISMATCH,
    message: "handshake role does not match the socket configuration",
};
pub(crate) const BLOCKING_TASK_FAILED: OperationKind = OperationKind {
    code: codes::BLOCKING_TASK_FAILED,
    message: "blocking file task did not complete",
};

/// 构造引擎原生错误，消息形如 `flint.tokio.stream_busy: ...`。
pub(crate) fn engine_error(kind: OperationKind, error_kind: io::ErrorKind) -> io::Error {
    io::Error::new(error_kind, format!("{}: {}", kind.code, kind.message))
}

/// 提取引擎原生错误的错误码；底层 IO 错误返回 `None`。
pub fn code_of(error: &io::Error) -> Option<&'static str> {
    let text = error.get_ref()?.to_string();
    [
        codes::STREAM_UNOPENED,
        codes::STREAM_CLOSED,
        codes::STREAM_BUSY,
        codes::STREAM_ABORTED,
        codes::NO_ENDPOINTS,
        codes::UNKNOWN_SERVICE,
        codes::TLS_ROLE_MISMATCH,
        codes::BLOCKING_TASK_FAILED,
    ]
    .into_iter()
    .find(|code| text.strip_prefix(code).is_some_and(|rest| rest.starts_with(':')))
}
