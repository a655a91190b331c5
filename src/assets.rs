//! The Static Asset Server (C4, §4.4): serves files out of a configured folder when no API
//! mount claims a request, falling back to `index.html` for the bare root.
//!
//! No teacher file covers this directly (the library is request-routing only, with no file
//! serving of its own); grounded instead on `mime_guess` usage in the pack's Leptos and
//! Ripress examples for content-type inference, plus the `influxdb3_server` http front for the
//! general shape of "look the path up, 404 on anything unreadable."

use crate::config::AssetsConfig;
use http::Response;
use hyper::Body;
use std::path::{Component, Path, PathBuf};

pub struct AssetServer {
    root: PathBuf,
}

impl AssetServer {
    pub fn new(config: &AssetsConfig) -> Self {
        AssetServer {
            root: PathBuf::from(&config.folder),
        }
    }

    /// Resolves `request_path` (already stripped of its leading slash) to a file under the
    /// configured root, rejecting anything that would escape it via `..` components
    /// (§4.4's path-traversal-as-404 rule) rather than trying to sanitize the path.
    fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let request_path = if request_path.is_empty() {
            "index.html"
        } else {
            request_path
        };

        let mut resolved = self.root.clone();
        for component in Path::new(request_path).components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                // `..`, root and prefix components are all rejected outright; a legitimate
                // asset path never needs them.
                _ => return None,
            }
        }
        Some(resolved)
    }

    pub async fn serve(&self, request_path: &str) -> Response<Body> {
        let Some(path) = self.resolve(request_path) else {
            return not_found();
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let content_type = guess_content_type(&path);
                Response::builder()
                    .status(200)
                    .header("Content-Type", content_type)
                    .body(Body::from(bytes))
                    .unwrap()
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "asset not found");
                not_found()
            }
        }
    }
}

fn guess_content_type(path: &Path) -> String {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() == mime_guess::mime::TEXT || mime.subtype() == "javascript" {
        format!("{}; charset=UTF-8", mime)
    } else {
        mime.to_string()
    }
}

fn not_found() -> Response<Body> {
    Response::builder()
        .status(404)
        .header("Content-Type", "text/plain")
        .body(Body::from("Not found"))
        .unwrap()
}
