//! The Action Resolver (C6, §4.6): turns an incoming request's method, path and params into
//! a concrete action name and merged parameter set against the compiled [`RouteTable`], then
//! drives the broker and materializes its result.
//!
//! Grounded on the teacher's `api/api.rs` `Api::handle`, which walked registered routes doing
//! exactly this kind of "strip prefix, look up, fall through" resolution; generalized here from
//! a handful of statically-registered endpoints to a name-derivation pipeline over dynamic
//! actions.

use crate::action_result::Materializer;
use crate::body_parser::parse_body;
use crate::broker::{ActionParams, BrokerClient};
use crate::error::GatewayError;
use crate::route_table::RouteTable;
use http::{Method, Response};
use hyper::Body;
use serde_json::Value;
use std::collections::HashMap;

/// Everything the resolver needs about an incoming request; assembled by the HTTP front
/// (`server.rs`) before `resolve` is called.
pub struct IncomingRequest<'a> {
    pub method: Method,
    /// Path with the leading slash already stripped, not yet relative to any mount.
    pub path: &'a str,
    pub query: &'a str,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

/// Derives an action name from a path by turning `/`s into `.`s (§4.6's implicit naming
/// rule), e.g. `users/get` becomes `users.get`.
fn implicit_action_name(path: &str) -> String {
    path.trim_matches('/').replace('/', ".")
}

fn parse_query(query: &str) -> HashMap<String, Value> {
    // `serde_urlencoded` keeps the last occurrence of a repeated key, matching §2.2's
    // repeated-query-key rule, since later pairs overwrite earlier ones when collected
    // into a map.
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}

/// The result of successfully resolving a request to an action and parameter set, ready to
/// hand to the broker.
#[derive(Debug)]
pub struct ResolvedAction {
    pub action: String,
    pub params: ActionParams,
}

/// Runs the full resolution pipeline: global prefix stripping, mount matching, alias lookup,
/// implicit naming, whitelist enforcement and parameter merging (§4.6, steps 1-6).
pub fn resolve(
    table: &RouteTable,
    request: &IncomingRequest,
) -> Result<ResolvedAction, GatewayError> {
    let after_prefix = table
        .strip_global_prefix(request.path)
        .ok_or_else(GatewayError::not_found)?;

    let (mount, mount_relative_path) = table
        .find_mount(after_prefix)
        .ok_or_else(GatewayError::not_found)?;

    let action = mount
        .resolve_alias(&request.method, mount_relative_path)
        .map(str::to_owned)
        .unwrap_or_else(|| implicit_action_name(mount_relative_path));

    if !mount.allows(&action) {
        return Err(GatewayError::service_not_found(&action));
    }

    let mut params = parse_query(request.query);

    if let Some(parsed_body) =
        parse_body(request.content_type, request.body, &mount.body_parsers)?
    {
        if let Value::Object(body_fields) = parsed_body {
            // Body fields win over query fields on key collision (§4.6's merge rule).
            params.extend(body_fields.into_iter());
        }
    }

    Ok(ResolvedAction { action, params })
}

/// Orchestrates a full request/response cycle: resolve, invoke the broker, materialize the
/// result, mapping every failure along the way onto a [`GatewayError`] response. `drop_body`
/// truncates the response body for `HEAD` requests (§2.2) while keeping status and headers.
pub async fn handle_request(
    table: &RouteTable,
    broker: &dyn BrokerClient,
    request: &IncomingRequest<'_>,
    request_id: &str,
    drop_body: bool,
) -> Response<Body> {
    match resolve(table, request) {
        Ok(resolved) => match broker.invoke(&resolved.action, resolved.params).await {
            Ok(result) => Materializer::materialize(result, request_id, drop_body),
            Err(broker_err) => error_response(GatewayError::from(broker_err), request_id),
        },
        Err(err) => error_response(err, request_id),
    }
}

/// Builds an error response body from a [`GatewayError`] (§6). Exposed so the HTTP front can
/// reuse it for failures it discovers itself, such as a request that times out waiting on the
/// broker.
pub fn error_response(err: GatewayError, request_id: &str) -> Response<Body> {
    let status = err.status();
    let body = serde_json::to_vec(&err).expect("GatewayError always serializes");
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Request-Id", request_id)
        .body(Body::from(body))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_result::ActionResult;
    use crate::broker::BrokerError;
    use crate::config::RouteConfig;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeBroker {
        calls: Mutex<Vec<(String, ActionParams)>>,
    }

    impl FakeBroker {
        fn new() -> Self {
            FakeBroker {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BrokerClient for FakeBroker {
        async fn invoke(
            &self,
            action: &str,
            params: ActionParams,
        ) -> Result<ActionResult, BrokerError> {
            self.calls
                .lock()
                .unwrap()
                .push((action.to_owned(), params.clone()));
            match action {
                "math.add" => {
                    let a = params.get("a").and_then(Value::as_f64).unwrap_or(0.0);
                    let b = params.get("b").and_then(Value::as_f64).unwrap_or(0.0);
                    Ok(ActionResult::Number(a + b))
                }
                "test.hello" => Ok(ActionResult::Text("hello".to_owned())),
                _ => Err(BrokerError::ServiceNotFound {
                    action: action.to_owned(),
                }),
            }
        }
    }

    fn route(json: serde_json::Value) -> RouteConfig {
        serde_json::from_value(json).unwrap()
    }

    fn request<'a>(method: Method, path: &'a str, query: &'a str) -> IncomingRequest<'a> {
        IncomingRequest {
            method,
            path,
            query,
            content_type: None,
            body: b"",
        }
    }

    #[test]
    fn implicit_name_turns_slashes_into_dots() {
        assert_eq!(implicit_action_name("math/add"), "math.add");
        assert_eq!(implicit_action_name("/math/add/"), "math.add");
    }

    #[test]
    fn default_mount_resolves_implicit_action_names() {
        let table = RouteTable::new("", vec![RouteConfig::default()]);
        let resolved = resolve(&table, &request(Method::GET, "math/add", "a=1&b=2")).unwrap();
        assert_eq!(resolved.action, "math.add");
        assert_eq!(resolved.params.get("a").unwrap(), &Value::String("1".to_owned()));
    }

    #[test]
    fn unlisted_action_under_a_whitelist_is_service_not_found() {
        let table = RouteTable::new(
            "",
            vec![route(serde_json::json!({ "whitelist": ["test.hello"] }))],
        );
        let err = resolve(&table, &request(Method::GET, "other/action", "")).unwrap_err();
        assert_eq!(err.code, 501);
    }

    #[test]
    fn global_prefix_must_be_present_in_the_path() {
        let table = RouteTable::new("api", vec![RouteConfig::default()]);
        assert!(resolve(&table, &request(Method::GET, "api/math/add", "")).is_ok());
        let err = resolve(&table, &request(Method::GET, "other/math/add", "")).unwrap_err();
        assert_eq!(err.code, 404);
    }

    #[test]
    fn glob_whitelist_allows_matching_actions_under_a_mount() {
        let table = RouteTable::new(
            "",
            vec![route(serde_json::json!({ "path": "/math", "whitelist": ["math.*"] }))],
        );
        let resolved = resolve(&table, &request(Method::GET, "math/add", "a=1&b=2")).unwrap();
        assert_eq!(resolved.action, "math.add");
    }

    #[test]
    fn method_qualified_alias_resolves_to_its_target_action() {
        let table = RouteTable::new(
            "",
            vec![route(serde_json::json!({
                "aliases": { "GET hello": "test.hello", "hello": "test.anyhello" }
            }))],
        );
        let resolved = resolve(&table, &request(Method::GET, "hello", "")).unwrap();
        assert_eq!(resolved.action, "test.hello");
        let resolved = resolve(&table, &request(Method::POST, "hello", "")).unwrap();
        assert_eq!(resolved.action, "test.anyhello");
    }

    #[tokio::test]
    async fn body_fields_win_over_query_fields_on_collision() {
        let table = RouteTable::new("", vec![RouteConfig::default()]);
        let request = IncomingRequest {
            method: Method::POST,
            path: "math/add",
            query: "a=1&b=2",
            content_type: Some("application/json"),
            body: br#"{"a": 10}"#,
        };
        let broker = FakeBroker::new();
        let response = handle_request(&table, &broker, &request, "req-1", false).await;
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        // a=10 (from body) + b=2 (from query) = 12
        assert_eq!(bytes.as_ref(), b"12");
    }

    #[tokio::test]
    async fn malformed_json_body_short_circuits_before_the_broker_is_called() {
        let table = RouteTable::new("", vec![RouteConfig::default()]);
        let request = IncomingRequest {
            method: Method::POST,
            path: "math/add",
            query: "",
            content_type: Some("application/json"),
            body: b"{not json",
        };
        let broker = FakeBroker::new();
        let response = handle_request(&table, &broker, &request, "req-1", false).await;
        assert_eq!(response.status(), 400);
        assert!(broker.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_action_surfaces_as_a_501_json_body() {
        let table = RouteTable::new("", vec![RouteConfig::default()]);
        let broker = FakeBroker::new();
        let response =
            handle_request(&table, &broker, &request(Method::GET, "no/such/action", ""), "req-1", false)
                .await;
        assert_eq!(response.status(), 501);
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["name"], "ServiceNotFoundError");
    }
}
