//! Test utilities and common setup.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::{IntoResponse, Response},
    Router,
};
use futures::future::BoxFuture;
use tempfile::TempDir;
use tower::ServiceExt;

use dirserve::{app, AppState, Config, Handler, HandlerRegistry, HandlerRequest, ServerConfig};

/// Handler for `.nc` files that echoes what it was asked to do.
pub struct EchoHandler;

impl Handler for EchoHandler {
    fn name(&self) -> &str {
        "echo"
    }

    fn extensions(&self) -> Vec<String> {
        vec!["nc".to_string()]
    }

    fn handle(&self, request: HandlerRequest) -> BoxFuture<'static, Response> {
        let file = request
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let output = request.environ.get("output").cloned().unwrap_or_default();
        let name = request.environ.get("name").cloned().unwrap_or_default();
        let response = request.response;

        Box::pin(async move {
            format!("handled {} as {}; output={}; name={}", file, response, output, name)
                .into_response()
        })
    }
}

/// Populate `root` with the standard fixture tree.
pub fn fixture_tree(root: &Path) {
    fs::write(root.join("a.txt"), "hello").unwrap();
    fs::write(root.join("img10.png"), "x").unwrap();
    fs::write(root.join("img2.png"), "x").unwrap();
    fs::write(root.join("img1.png"), "x").unwrap();
    fs::write(root.join("data.nc"), "raw netcdf").unwrap();

    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("sub/file.txt"), "sub file").unwrap();
    fs::write(root.join("sub/nested.nc"), vec![0u8; 2048]).unwrap();

    fs::create_dir(root.join(".private")).unwrap();
    fs::write(root.join(".private/secret.txt"), "secret").unwrap();
    fs::write(root.join(".private/hidden.nc"), "hidden data").unwrap();

    fs::create_dir_all(root.join(".static/js")).unwrap();
    fs::write(root.join(".static/js/app.js"), "console.log(1);").unwrap();
}

/// Create a test application over a fresh fixture tree.
///
/// `extra` is appended to the TOML config after the `root` line.
pub fn test_app(extra: &str) -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    fixture_tree(dir.path());
    let state = test_state(dir.path(), extra);
    (app(state), dir)
}

pub fn test_state(root: &Path, extra: &str) -> AppState {
    let content = format!("root = \"{}\"\n{}", root.display(), extra);
    let config = ServerConfig::from_config(Config::parse(&content).unwrap()).unwrap();
    AppState::new(config).with_handlers(HandlerRegistry::new().with_handler(Arc::new(EchoHandler)))
}

/// Send a GET request with a `Host` header.
pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, request(Method::GET, uri).body(Body::empty()).unwrap()).await
}

/// Request builder with a `Host` header already set.
pub fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .uri(uri)
        .method(method)
        .header(header::HOST, "localhost")
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_string(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub fn header_value(response: &Response, name: header::HeaderName) -> String {
    response
        .headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
