//! The HTTP Server Front (C7, §4.7): the listen loop that accepts raw connections, reads a
//! request off each one, and drives it through resolution, the broker and materialization.
//!
//! Hyper's own `Server` type expects a statically-known `MakeService`; this gateway needs to
//! wrap each accepted stream in an optional TLS handshake before handing it to
//! `hyper::server::conn::Http`, so it runs its own accept loop instead, the same shape used in
//! `influxdb3_server`'s `http.rs` and `kanari-network-karics`'s `router.rs` (both hand-roll the
//! accept loop for the same reason: per-connection setup hyper's `Server` doesn't expose).

use crate::assets::AssetServer;
use crate::broker::BrokerClient;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::resolver::{self, IncomingRequest};
use crate::route_table::RouteTable;
use http::{Method, Request, Response};
use hyper::server::conn::Http;
use hyper::service::service_fn;
use hyper::Body;
use rustls_pemfile::{certs, pkcs8_private_keys};
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Notify};
use tokio_rustls::rustls::{Certificate, PrivateKey, ServerConfig};
use tokio_rustls::TlsAcceptor;

/// How long [`crate::facade::Gateway::stopped`] waits for in-flight connections to finish
/// on their own before returning anyway (§4.8's "bounded grace period").
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The immutable state shared by every connection task (§5): a compiled route table, the
/// broker adapter, an optional asset server, and the per-request deadline.
pub struct GatewayState {
    pub route_table: RouteTable,
    pub broker: Arc<dyn BrokerClient>,
    pub assets: Option<AssetServer>,
    pub request_timeout: Option<Duration>,
}

impl GatewayState {
    pub fn new(config: &GatewayConfig, broker: Arc<dyn BrokerClient>) -> Self {
        GatewayState {
            route_table: RouteTable::new(&config.path, config.routes.clone().into_routes()),
            broker,
            assets: config.assets.as_ref().map(AssetServer::new),
            request_timeout: config.request_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Builds a `rustls` server config from in-memory PEM bytes (§3's `HttpsConfig`). Certificate
/// *provisioning* stays out of scope; this only parses what it's handed.
fn build_tls_acceptor(key: &[u8], cert: &[u8]) -> io::Result<TlsAcceptor> {
    let cert_chain = certs(&mut io::Cursor::new(cert))
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid certificate PEM"))?
        .into_iter()
        .map(Certificate)
        .collect();
    let mut keys = pkcs8_private_keys(&mut io::Cursor::new(key))
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid private key PEM"))?;
    let key = keys
        .pop()
        .map(PrivateKey)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no private key found"))?;

    let config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// A gateway whose listener has been bound and whose accept loop is running as a background
/// task (§4.8's `started` hook).
pub struct RunningGateway {
    pub local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    in_flight: Arc<AtomicUsize>,
    drained: Arc<Notify>,
    task: tokio::task::JoinHandle<io::Result<()>>,
}

impl RunningGateway {
    /// Stops accepting new connections and waits for in-flight ones to finish, up to a
    /// bounded grace period, before returning (§4.8's `stopped` hook).
    pub async fn stopped(self) -> io::Result<()> {
        let _ = self.shutdown.send(true);

        let drain = async {
            while self.in_flight.load(Ordering::SeqCst) > 0 {
                self.drained.notified().await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            tracing::warn!("shutdown grace period elapsed with connections still in flight");
        }

        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(io::Error::new(io::ErrorKind::Other, err)),
        }
    }
}

/// Binds the configured socket and spawns the accept loop as a background task, returning
/// immediately with a handle that can later be used to stop it gracefully.
pub async fn serve(config: GatewayConfig, state: Arc<GatewayState>) -> io::Result<RunningGateway> {
    let addr: SocketAddr = format!("{}:{}", config.ip, config.port)
        .parse()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, format!("{err}")))?;
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    let tls_acceptor = match &config.https {
        Some(https) => Some(build_tls_acceptor(&https.key, &https.cert)?),
        None => None,
    };

    tracing::info!(%local_addr, https = tls_acceptor.is_some(), "gateway listening");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let in_flight = Arc::new(AtomicUsize::new(0));
    let drained = Arc::new(Notify::new());

    let task_in_flight = Arc::clone(&in_flight);
    let task_drained = Arc::clone(&drained);
    let task = tokio::spawn(async move {
        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown_rx.changed() => break,
            };
            let (stream, peer_addr) = accepted?;
            let state = Arc::clone(&state);
            let tls_acceptor = tls_acceptor.clone();
            let in_flight = Arc::clone(&task_in_flight);
            let drained = Arc::clone(&task_drained);

            in_flight.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let result = match tls_acceptor {
                    Some(acceptor) => serve_tls_connection(acceptor, stream, state).await,
                    None => serve_plain_connection(stream, state).await,
                };
                if let Err(err) = result {
                    tracing::warn!(%peer_addr, error = %err, "connection ended with an error");
                }
                if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                    drained.notify_waiters();
                }
            });
        }
        Ok(())
    });

    Ok(RunningGateway {
        local_addr,
        shutdown: shutdown_tx,
        in_flight,
        drained,
        task,
    })
}

async fn serve_plain_connection(stream: TcpStream, state: Arc<GatewayState>) -> io::Result<()> {
    Http::new()
        .serve_connection(
            stream,
            service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { Ok::<_, Infallible>(dispatch(state, req).await) }
            }),
        )
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
}

async fn serve_tls_connection(
    acceptor: TlsAcceptor,
    stream: TcpStream,
    state: Arc<GatewayState>,
) -> io::Result<()> {
    let stream = acceptor.accept(stream).await?;
    Http::new()
        .serve_connection(
            stream,
            service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { Ok::<_, Infallible>(dispatch(state, req).await) }
            }),
        )
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
}

/// Handles one request end to end: assigns a request id, applies the `OPTIONS`/`HEAD`
/// supplements (§2.2), resolves and invokes the action, and falls back to asset serving when
/// no mount claims the path at all.
async fn dispatch(state: Arc<GatewayState>, req: Request<Body>) -> Response<Body> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", request_id = %request_id, method = %req.method(), path = %req.uri().path());
    let _entered = span.enter();

    if req.method() == Method::OPTIONS {
        // A bare preflight acknowledgement; no action is invoked (§2.2).
        return Response::builder()
            .status(200)
            .header("Request-Id", request_id.as_str())
            .body(Body::empty())
            .unwrap();
    }

    let drop_body = req.method() == Method::HEAD;
    let lookup_method = if drop_body { Method::GET } else { req.method().clone() };

    // `IncomingRequest::path` is documented as already having its leading slash stripped.
    let path = req.uri().path().trim_start_matches('/').to_owned();
    let query = req.uri().query().unwrap_or("").to_owned();
    let content_type = req
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let body_bytes = match hyper::body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "failed to read request body");
            return resolver::error_response(GatewayError::internal("failed to read request body"), &request_id);
        }
    };

    let incoming = IncomingRequest {
        method: lookup_method,
        path: &path,
        query: &query,
        content_type: content_type.as_deref(),
        body: &body_bytes,
    };

    match resolver::resolve(&state.route_table, &incoming) {
        Ok(resolved) => {
            let invoke = state.broker.invoke(&resolved.action, resolved.params);
            let outcome = match state.request_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, invoke).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(action = %resolved.action, "broker invocation timed out");
                        return resolver::error_response(GatewayError::request_timeout(), &request_id);
                    }
                },
                None => invoke.await,
            };
            match outcome {
                Ok(result) => crate::action_result::Materializer::materialize(result, &request_id, drop_body),
                Err(broker_err) => resolver::error_response(broker_err.into(), &request_id),
            }
        }
        Err(err) if err.code == 404 => match &state.assets {
            Some(assets) => assets.serve(&path).await,
            None => resolver::error_response(err, &request_id),
        },
        Err(err) => resolver::error_response(err, &request_id),
    }
}
