use axum::Router;

use crate::handlers;
use crate::AppState;

/// Create file server routes
///
/// Every path belongs to the served tree, so the whole namespace goes through
/// the fallback instead of fixed routes that could shadow real files.
pub fn file_routes() -> Router<AppState> {
    Router::new().fallback(handlers::serve)
}
