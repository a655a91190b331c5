//! The Gateway Facade (C8, §4.8): the single entry point a host program constructs and
//! starts, hiding the route table, state and listen loop behind a small lifecycle API.
//!
//! Grounded on the teacher's `api/api.rs` constructors (`Api::new`/builder pattern for turning
//! configuration into something runnable), generalized from "owns a set of handlers" to "owns
//! a listening socket and a broker handle."

use crate::broker::BrokerClient;
use crate::config::GatewayConfig;
use crate::server::{serve, GatewayState, RunningGateway};
use std::net::SocketAddr;
use std::sync::Arc;

/// A configured, not-yet-started gateway ("created", in §4.8's terms). Cheap to construct;
/// binding the socket and running the accept loop happens in [`Gateway::started`].
pub struct Gateway {
    config: GatewayConfig,
    state: Arc<GatewayState>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, broker: Arc<dyn BrokerClient>) -> Self {
        let state = Arc::new(GatewayState::new(&config, broker));
        Gateway { config, state }
    }

    /// Whether this gateway will terminate TLS (§3's `HttpsConfig` presence).
    pub fn is_https(&self) -> bool {
        self.config.https.is_some()
    }

    /// The address this gateway is configured to bind, before it has necessarily bound it.
    pub fn configured_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.config.ip, self.config.port).parse().ok()
    }

    /// Binds the configured socket and starts accepting connections in the background,
    /// returning a handle that exposes the bound address and a [`RunningGateway::stopped`]
    /// method for graceful shutdown (§4.8's `started`/`stopped` lifecycle hooks).
    pub async fn started(self) -> std::io::Result<RunningGateway> {
        serve(self.config, self.state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_result::ActionResult;
    use crate::broker::{ActionParams, BrokerError};
    use async_trait::async_trait;

    struct NullBroker;

    #[async_trait]
    impl BrokerClient for NullBroker {
        async fn invoke(&self, _action: &str, _params: ActionParams) -> Result<ActionResult, BrokerError> {
            Ok(ActionResult::Null)
        }
    }

    #[test]
    fn https_is_reported_from_config_presence() {
        let plain = Gateway::new(GatewayConfig::default(), Arc::new(NullBroker));
        assert!(!plain.is_https());
    }

    #[test]
    fn configured_addr_reflects_ip_and_port() {
        let mut config = GatewayConfig::default();
        config.ip = "127.0.0.1".to_owned();
        config.port = 4000;
        let gateway = Gateway::new(config, Arc::new(NullBroker));
        assert_eq!(
            gateway.configured_addr(),
            Some("127.0.0.1:4000".parse().unwrap())
        );
    }
}
