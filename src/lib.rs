//! Directory-backed file server.
//!
//! Serves files and generated directory indexes from a root directory, hands
//! requests for recognized extensions to pluggable content handlers, and
//! renders machine-readable catalogs. It can be used as a standalone binary or
//! embedded in another application with its own handlers and renderer.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod render;
pub mod resolve;
pub mod routes;
pub mod visibility;

use std::sync::Arc;

use axum::Router;

pub use config::{Config, ConfigError, ServerConfig};
pub use dispatch::{Handler, HandlerRegistry, HandlerRequest, RequestEnviron};
pub use error::FileServerError;
pub use render::{BuiltinRenderer, RenderContext, RenderError, Renderer, Template};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Validated configuration
    pub config: Arc<ServerConfig>,
    /// Installed content handlers
    pub handlers: Arc<HandlerRegistry>,
    /// Index and catalog renderer
    pub renderer: Arc<dyn Renderer>,
}

impl AppState {
    /// Create a new AppState with no content handlers and the built-in renderer.
    pub fn new(config: ServerConfig) -> Self {
        let renderer = BuiltinRenderer::new(config.templates.clone());
        Self {
            config: Arc::new(config),
            handlers: Arc::new(HandlerRegistry::new()),
            renderer: Arc::new(renderer),
        }
    }

    /// Replace the installed content handlers.
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Arc::new(handlers);
        self
    }

    /// Replace the renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }
}

/// Build the application router for `state`, without middleware layers.
pub fn app(state: AppState) -> Router {
    Router::new().merge(routes::file_routes()).with_state(state)
}
