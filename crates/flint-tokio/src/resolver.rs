use crate::context::IoExecutor;
use crate::error::{NO_ENDPOINTS, UNKNOWN_SERVICE, engine_error};
use flint_core::{Callback, ExecutionContext, Resolver};
use std::io;
use std::net::SocketAddr;

/// 常见服务名到端口的映射。
const WELL_KNOWN_SERVICES: &[(&str, u16)] = &[
    ("echo", 7),
    ("ftp", 21),
    ("ssh", 22),
    ("smtp", 25),
    ("domain", 53),
    ("http", 80),
    ("ws", 80),
    ("https", 443),
    ("wss", 443),
    ("sip", 5060),
    ("sips", 5061),
];

/// 服务描述转端口：十进制端口号或 [`WELL_KNOWN_SERVICES`] 中的名字（大小写不敏感）。
pub fn service_port(service: &str) -> Option<u16> {
    if let Ok(port) = service.parse::<u16>() {
        return Some(port);
    }
    WELL_KNOWN_SERVICES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(service))
        .map(|&(_, port)| port)
}

/// 基于系统解析器的 TCP 端点解析。
pub struct TcpResolver {
    executor: IoExecutor,
}

impl TcpResolver {
    pub fn new(executor: &IoExecutor) -> Self {
        Self {
            executor: executor.clone(),
        }
    }
}

impl Resolver for TcpResolver {
    type Endpoint = SocketAddr;

    fn async_resolve(&self, host: String, service: String, callback: Callback<Vec<SocketAddr>>) {
        let Some(port) = service_port(&service) else {
            tracing::debug!(%service, "unknown service name");
            self.executor.post(Box::new(move || {
                callback(Err(engine_error(UNKNOWN_SERVICE, io::ErrorKind::InvalidInput)))
            }));
            return;
        };
        self.executor.spawn_op(async move {
            let result = match tokio::net::lookup_host((host.as_str(), port)).await {
                Ok(addrs) => {
                    let endpoints: Vec<SocketAddr> = addrs.collect();
                    if endpoints.is_empty() {
                        Err(engine_error(NO_ENDPOINTS, io::ErrorKind::NotFound))
                    } else {
                        Ok(endpoints)
                    }
                }
                Err(error) => Err(error),
            };
            callback(result);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn numeric_and_named_services_map_to_ports() {
        assert_eq!(service_port("8443"), Some(8443));
        assert_eq!(service_port("https"), Some(443));
        assert_eq!(service_port("HTTP"), Some(80));
        assert_eq!(service_port("gopher+"), None);
        assert_eq!(service_port("70000"), None);
    }

    proptest! {
        #[test]
        fn every_decimal_port_is_accepted(port in any::<u16>()) {
            prop_assert_eq!(service_port(&port.to_string()), Some(port));
        }
    }
}
