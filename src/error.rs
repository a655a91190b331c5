//! The error taxonomy that crosses the body-parser, resolver and broker boundaries (§7).
//!
//! Every failure the gateway can produce, whether it originates locally (a malformed body,
//! a whitelist rejection) or is surfaced from the broker, ends up as a single [`GatewayError`]
//! so that the HTTP front (`server.rs`) never has to know which stage produced it.

use crate::broker::BrokerError;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

/// A JSON-serializable error, always carrying a `code`, `name` and `message`, and optionally
/// some extra `data` (§6's error body shape).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GatewayError {
    pub code: u16,
    pub name: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl GatewayError {
    /// No API route and no asset matched the request.
    pub fn not_found() -> Self {
        GatewayError {
            code: 404,
            name: "NotFound",
            message: "Not found".to_owned(),
            data: None,
        }
    }

    /// A body parser recognised the content type but failed to decode it.
    pub fn invalid_request_body(body: &[u8], parse_error: impl std::fmt::Display) -> Self {
        let body_text = String::from_utf8_lossy(body).into_owned();
        GatewayError {
            code: 400,
            name: "InvalidRequestBodyError",
            message: "Invalid request body".to_owned(),
            data: Some(serde_json::json!({
                "body": body_text,
                "error": parse_error.to_string(),
            })),
        }
    }

    /// A whitelist rejected the resolved action, or the broker has no handler for it.
    pub fn service_not_found(action: &str) -> Self {
        GatewayError {
            code: 501,
            name: "ServiceNotFoundError",
            message: format!("Action '{}' is not available!", action),
            data: None,
        }
    }

    /// The per-request deadline elapsed before the broker responded.
    pub fn request_timeout() -> Self {
        GatewayError {
            code: 504,
            name: "RequestTimeout",
            message: "Request timed out".to_owned(),
            data: None,
        }
    }

    /// A catch-all internal failure not otherwise classified.
    pub fn internal(message: impl Into<String>) -> Self {
        GatewayError {
            code: 500,
            name: "ServiceError",
            message: message.into(),
            data: None,
        }
    }

    /// The HTTP status this error should be reported with.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<BrokerError> for GatewayError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::ServiceNotFound { action } => GatewayError::service_not_found(&action),
            BrokerError::Validation { message, data } => GatewayError {
                code: 422,
                name: "ValidationError",
                message,
                data,
            },
            BrokerError::Service {
                code,
                message,
                data,
            } => {
                // Broker errors carry their own code when they have an opinion about the
                // HTTP status; otherwise this falls back to a generic 500 (§7's policy).
                let code = code.filter(|c| (400..600).contains(c)).unwrap_or(500);
                let name = if code == 500 {
                    "ServiceError"
                } else {
                    "InternalError"
                };
                GatewayError {
                    code,
                    name,
                    message,
                    data,
                }
            }
        }
    }
}
