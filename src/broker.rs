//! The Broker Client Adapter (C1): a thin, stateless contract over the external service
//! broker. The gateway only ever calls [`BrokerClient::invoke`]; it never interprets what
//! the broker does to route an action to a service handler.
//!
//! Modelled as an `async_trait`, the same way the teacher library used an async trait
//! (`handler::RequestParam`) as the seam between a handler and request-scoped context —
//! here it's the seam between the resolver and an out-of-process broker.

use crate::action_result::ActionResult;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// The merged parameter set handed to an action: query params overlaid by body params
/// (§3's `mergedParams`).
pub type ActionParams = HashMap<String, Value>;

/// The broker's own error taxonomy (§4.1), forwarded largely unchanged. [`GatewayError`](crate::error::GatewayError)
/// is responsible for mapping these onto HTTP status codes.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerError {
    /// The broker has no handler registered for the named action.
    ServiceNotFound { action: String },
    /// The action rejected its parameters.
    Validation {
        message: String,
        data: Option<Value>,
    },
    /// Any other broker-side failure. `code`, if present and in the 400..600 range, is
    /// used verbatim as the HTTP status (§7's policy); otherwise it falls back to 500.
    Service {
        code: Option<u16>,
        message: String,
        data: Option<Value>,
    },
}

impl std::fmt::Display for BrokerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerError::ServiceNotFound { action } => {
                write!(f, "service not found: {}", action)
            }
            BrokerError::Validation { message, .. } => write!(f, "validation error: {}", message),
            BrokerError::Service { message, .. } => write!(f, "service error: {}", message),
        }
    }
}

impl std::error::Error for BrokerError {}

/// Invokes a named action on the broker with a merged parameter set and gets back a
/// polymorphic [`ActionResult`] or a [`BrokerError`].
///
/// Implementations are expected to be cheaply cloneable or shared via `Arc` — the gateway
/// calls `invoke` concurrently from many request tasks and never serializes access to it.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn invoke(
        &self,
        action: &str,
        params: ActionParams,
    ) -> Result<ActionResult, BrokerError>;
}
