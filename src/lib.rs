#![warn(missing_docs)]
/*!
An HTTP gateway that turns arbitrary incoming requests into named action invocations on a
message-routing broker, and turns whatever the broker hands back into an HTTP response.

The gateway never interprets an action itself; it only resolves *which* action a request maps
to (via [`route_table`] and [`resolver`]) and materializes whatever polymorphic result comes
back (via [`action_result`]). Everything else — what an action does, how it's load balanced,
what service ends up handling it — lives on the other side of the [`broker::BrokerClient`]
trait.

# A basic example

```no_run
use action_gateway::{
    broker::{ActionParams, BrokerClient, BrokerError},
    action_result::ActionResult,
    config::GatewayConfig,
    facade::Gateway,
};
use async_trait::async_trait;
use std::sync::Arc;

struct EchoBroker;

#[async_trait]
impl BrokerClient for EchoBroker {
    async fn invoke(&self, action: &str, _params: ActionParams) -> Result<ActionResult, BrokerError> {
        Ok(ActionResult::Text(format!("you called {action}")))
    }
}

# tokio::runtime::Runtime::new().unwrap().block_on(async {
let gateway = Gateway::new(GatewayConfig::default(), Arc::new(EchoBroker));
// gateway.started().await binds the configured socket and accepts connections in the
// background, returning a handle whose `stopped()` method shuts it down gracefully.
# let _ = gateway;
# })
```

# Routing

With no `routes` configured at all, the gateway mounts a single implicit route at its global
path prefix: any request path is turned into an action name by replacing `/` with `.`
(`GET /math/add` resolves to the `math.add` action). Configuring [`config::RouteConfig`] lets a
mount restrict which actions are reachable (`whitelist`), rewrite specific paths to specific
actions (`aliases`), and turn body parsing on or off per content type (`bodyParsers`). See
[`route_table`] and [`resolver`] for the full resolution pipeline.

# Serving assets alongside the API

When [`config::GatewayConfig::assets`] is set, any request that doesn't match an API mount at
all falls through to serving a file from the configured folder instead of failing outright; see
[`assets`].
*/

pub mod action_result;
pub mod assets;
pub mod body_parser;
pub mod broker;
pub mod config;
pub mod error;
pub mod facade;
pub mod resolver;
pub mod route_table;
pub mod server;

pub use async_trait::async_trait;

pub use broker::{ActionParams, BrokerClient, BrokerError};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use facade::Gateway;

/// A re-export of types from the `http` crate that are useful when constructing a
/// [`broker::BrokerClient`] or inspecting resolved requests.
pub mod http {
    pub use http::{Method, Request, Response};
}
