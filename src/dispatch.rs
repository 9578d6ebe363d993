//! Content handlers for recognized file extensions.
//!
//! A handler claims one or more extensions. When a request names a file plus an
//! extra extension (`data.nc.das`) and the file without it (`data.nc`) exists,
//! the handler registered for `nc` answers the request.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{request::Parts, HeaderMap, Method, Uri};
use axum::response::Response;
use futures::future::BoxFuture;

/// Everything a handler gets to see about a dispatched request
pub struct HandlerRequest {
    /// Data file the handler should serve
    pub path: PathBuf,
    /// Extension stripped from the request, naming the response wanted
    pub response: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Request environment merged with server passthrough config
    pub environ: BTreeMap<String, String>,
    pub body: Body,
}

pub trait Handler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// File extensions (without the dot) this handler recognizes
    fn extensions(&self) -> Vec<String>;

    fn handle(&self, request: HandlerRequest) -> BoxFuture<'static, Response>;
}

/// Extension to handler mapping, resolved once at construction
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    by_extension: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Extensions already claimed keep their first handler.
    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        for ext in handler.extensions() {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            if let Some(existing) = self.by_extension.get(&ext) {
                tracing::warn!(
                    "Extension .{} already handled by {}, ignoring {}",
                    ext,
                    existing.name(),
                    handler.name()
                );
                continue;
            }
            self.by_extension.insert(ext, handler.clone());
        }
        self
    }

    /// Find the handler for `path` by its final extension.
    pub fn find(&self, path: &Path) -> Option<Arc<dyn Handler>> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension.get(&ext).cloned()
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        self.find(path).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_extension.len()
    }
}

/// Request metadata attached by server-side middleware as a request extension.
///
/// Its keys take precedence over the passthrough config. Query parameters are
/// never promoted into the environment; handlers read them from the URI.
#[derive(Debug, Clone, Default)]
pub struct RequestEnviron(pub BTreeMap<String, String>);

/// Environment derived from the request itself: method, path and raw query
/// string, plus any [`RequestEnviron`] set by middleware.
pub fn request_environ(parts: &Parts) -> BTreeMap<String, String> {
    let mut environ = BTreeMap::new();
    environ.insert("request.method".to_string(), parts.method.to_string());
    environ.insert("request.path".to_string(), parts.uri.path().to_string());
    environ.insert(
        "request.query".to_string(),
        parts.uri.query().unwrap_or_default().to_string(),
    );

    if let Some(RequestEnviron(extra)) = parts.extensions.get::<RequestEnviron>() {
        for (key, value) in extra {
            environ.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    environ
}

/// Add server defaults for keys the request environment does not already hold.
pub fn merge_passthrough(environ: &mut BTreeMap<String, String>, passthrough: &BTreeMap<String, String>) {
    for (key, value) in passthrough {
        environ.entry(key.clone()).or_insert_with(|| value.clone());
    }
}
