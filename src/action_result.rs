//! The polymorphic Action Result (§3) and the Response Materializer (C2, §4.2) that turns
//! one into a `hyper::Response`.
//!
//! The byte-stream variant borrows the teacher's `AsyncRead`-based `Bytes` abstraction
//! (`stream.rs`/`handler/request.rs` in the teacher, reconciled here into one type) rather
//! than requiring callers to produce a `futures::Stream` directly — it reads the same either
//! way, but wrapping arbitrary readers (files, process pipes, etc) needs no extra adapter.

use futures::io::AsyncRead;
use hyper::{Body, Response};
use serde_json::Value;
use std::pin::Pin;

/// Any reader that can back a [`ActionResult::ByteStream`].
pub trait AsyncReadBody: AsyncRead + Send + Unpin + 'static {}
impl<T: AsyncRead + Send + Unpin + 'static> AsyncReadBody for T {}

/// A lazily-read sequence of bytes, streamed to the client chunk by chunk until EOF
/// (§4.2's `ByteStream` row).
pub struct ByteStream(Pin<Box<dyn AsyncReadBody>>);

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ByteStream").finish()
    }
}

impl ByteStream {
    pub fn from_reader<R: AsyncReadBody>(reader: R) -> Self {
        ByteStream(Box::pin(reader))
    }
}

/// The runtime-discovered shape of whatever an action handed back (§3).
#[derive(Debug)]
pub enum ActionResult {
    /// Serialized as an empty body with no content-type set.
    Null,
    /// A value with no natural serialization; treated as empty with a JSON content-type.
    Opaque,
    Text(String),
    Number(f64),
    Boolean(bool),
    Bytes(Vec<u8>),
    ByteStream(ByteStream),
    /// Any other JSON-shaped value. A value matching `{"type":"Buffer","data":[...]}` is
    /// special-cased as raw bytes (§4.2's table).
    StructuredObject(Value),
}

/// Converts an [`ActionResult`] into a `hyper::Response`, always stamping the `Request-Id`
/// header (§4.2). `drop_body` truncates the body while preserving status/headers, used to
/// answer `HEAD` requests identically to their `GET` counterpart (§2.2).
pub struct Materializer;

impl Materializer {
    pub fn materialize(result: ActionResult, request_id: &str, drop_body: bool) -> Response<Body> {
        let mut response = match result {
            ActionResult::Null => Response::builder().status(200).body(Body::empty()).unwrap(),
            ActionResult::Opaque => Response::builder()
                .status(200)
                .header("Content-Type", "application/json")
                .body(Body::empty())
                .unwrap(),
            ActionResult::Text(text) => Response::builder()
                .status(200)
                .header("Content-Type", "text/plain")
                .body(Body::from(text))
                .unwrap(),
            ActionResult::Number(n) => Response::builder()
                .status(200)
                .header("Content-Type", "text/plain")
                .body(Body::from(format_number(n)))
                .unwrap(),
            ActionResult::Boolean(b) => Response::builder()
                .status(200)
                .header("Content-Type", "text/plain")
                .body(Body::from(if b { "true" } else { "false" }))
                .unwrap(),
            ActionResult::Bytes(bytes) => Response::builder()
                .status(200)
                .header("Content-Type", "application/octet-stream")
                .header("Content-Length", bytes.len())
                .body(Body::from(bytes))
                .unwrap(),
            ActionResult::ByteStream(stream) => Response::builder()
                .status(200)
                .header("Content-Type", "application/octet-stream")
                .header("Transfer-Encoding", "chunked")
                .body(stream_to_body(stream))
                .unwrap(),
            ActionResult::StructuredObject(value) => {
                if let Some(bytes) = as_node_buffer(&value) {
                    Response::builder()
                        .status(200)
                        .header("Content-Type", "application/octet-stream")
                        .header("Content-Length", bytes.len())
                        .body(Body::from(bytes))
                        .unwrap()
                } else {
                    let encoded = serde_json::to_vec(&value)
                        .expect("serde_json::Value always serializes");
                    Response::builder()
                        .status(200)
                        .header("Content-Type", "application/json")
                        .body(Body::from(encoded))
                        .unwrap()
                }
            }
        };

        response
            .headers_mut()
            .insert("Request-Id", request_id.parse().unwrap());

        if drop_body {
            *response.body_mut() = Body::empty();
        }

        response
    }
}

/// `data:[…]` buffers lose their integer-ness in a generic `serde_json::Value`; this
/// recovers them the same way the wire format round-trips a Node.js `Buffer`.
fn as_node_buffer(value: &Value) -> Option<Vec<u8>> {
    let obj = value.as_object()?;
    if obj.get("type")?.as_str()? != "Buffer" {
        return None;
    }
    let data = obj.get("data")?.as_array()?;
    data.iter().map(|v| v.as_u64().map(|n| n as u8)).collect()
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Drains a [`ByteStream`] into a `hyper::Body` by forwarding chunks over hyper's channel
/// body as they're read. A read error after the response has started streaming is logged
/// and the channel is simply dropped, closing the connection (§4.2, §9's "log and close").
fn stream_to_body(stream: ByteStream) -> Body {
    use futures::io::AsyncReadExt;

    let (mut sender, body) = Body::channel();
    let mut reader = stream.0;
    tokio::spawn(async move {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if sender
                        .send_data(bytes::Bytes::copy_from_slice(&buf[..n]))
                        .await
                        .is_err()
                    {
                        // Client disconnected mid-stream; nothing left to do.
                        break;
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "error reading action byte stream after headers flushed");
                    break;
                }
            }
        }
    });
    body
}
