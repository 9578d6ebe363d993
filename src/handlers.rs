use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use httpdate::fmt_http_date;
use tokio::fs;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use crate::dispatch::{merge_passthrough, request_environ, HandlerRequest};
use crate::error::FileServerError;
use crate::listing::list_directory;
use crate::render::{RenderContext, Template};
use crate::resolve::resolve_path;
use crate::visibility::is_static_asset;
use crate::AppState;

/// Entry point for every request.
///
/// Decisions are taken in a fixed order:
/// 1. an existing regular file is served raw;
/// 2. an existing directory is listed (after redirecting to add a trailing slash);
/// 3. if stripping one extension names an existing file with a handler, that
///    handler answers the request;
/// 4. a request for the catalog name renders the catalog of its directory;
/// 5. anything else is not found.
///
/// Traversal attempts, hidden paths and missing paths all end in the same 404.
pub async fn serve(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, FileServerError> {
    let (parts, body) = request.into_parts();
    let config = state.config.clone();
    let resolved = resolve_path(&config.root, parts.uri.path())?;
    let visibility = config.visibility();

    if let Ok(metadata) = fs::metadata(&resolved.path).await {
        if metadata.is_file() {
            if !is_static_asset(&config.root, &resolved.path)
                && visibility.is_hidden(&resolved.path, true)
            {
                debug!("Hidden file requested: {}", resolved.request_path);
                return Err(FileServerError::NotFound);
            }
            return Ok(serve_file(&resolved.path, Request::from_parts(parts, body)).await);
        }

        if metadata.is_dir() {
            if visibility.is_hidden(&resolved.path, true) {
                debug!("Hidden directory requested: {}", resolved.request_path);
                return Err(FileServerError::NotFound);
            }
            if !resolved.trailing_slash {
                // Relative links in the index only resolve below a trailing slash.
                let location = construct_url(&parts, &format!("{}/", parts.uri.path()), true);
                debug!("Redirecting to {}", location);
                return Ok(Redirect::to(&location).into_response());
            }
            return render_listing(
                &state,
                &parts,
                resolved.path,
                &resolved.request_path,
                parts.uri.path(),
                Template::Index,
            )
            .await;
        }
    }

    if let (Some(stripped), Some(response)) = (resolved.stripped, resolved.extension) {
        if is_file(&stripped).await {
            return dispatch(&state, parts, body, stripped, response).await;
        }
    }

    let catalog_suffix = format!("/{}", config.catalog);
    if resolved.request_path.ends_with(&catalog_suffix) {
        let directory = match resolved.path.parent() {
            Some(dir) if dir.starts_with(&config.root) => dir.to_path_buf(),
            _ => return Err(FileServerError::NotFound),
        };
        let is_dir = fs::metadata(&directory)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir || visibility.is_hidden(&directory, true) {
            return Err(FileServerError::NotFound);
        }

        let request_path = parent_path(&resolved.request_path);
        let raw_path = parent_path(parts.uri.path());
        return render_listing(
            &state,
            &parts,
            directory,
            request_path,
            raw_path,
            Template::Catalog,
        )
        .await;
    }

    Err(FileServerError::NotFound)
}

/// Serve a regular file as-is.
///
/// Only GET and HEAD are allowed (405 otherwise). `If-Modified-Since` is
/// answered with 304 and single `Range` requests with 206 or 416. The file is
/// streamed and its handle closes when the body is dropped.
async fn serve_file(path: &Path, request: Request) -> Response {
    debug!("Serving file: {}", path.display());

    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

/// Hand the request to the handler registered for `path`'s extension.
async fn dispatch(
    state: &AppState,
    parts: Parts,
    body: Body,
    path: PathBuf,
    response: String,
) -> Result<Response, FileServerError> {
    if state.config.visibility().is_hidden(&path, true) {
        return Err(FileServerError::NotFound);
    }

    let handler = state.handlers.find(&path).ok_or(FileServerError::NotFound)?;

    let mut environ = request_environ(&parts);
    merge_passthrough(&mut environ, &state.config.passthrough);

    debug!(
        "Dispatching {} to {} handler ({})",
        path.display(),
        handler.name(),
        response
    );

    let request = HandlerRequest {
        path,
        response,
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        environ,
        body,
    };

    Ok(handler.handle(request).await)
}

/// List `directory` and render it with `template`.
///
/// `request_path` is the decoded path shown to users, `raw_path` the encoded
/// one used to rebuild URLs.
async fn render_listing(
    state: &AppState,
    parts: &Parts,
    directory: PathBuf,
    request_path: &str,
    raw_path: &str,
    template: Template,
) -> Result<Response, FileServerError> {
    let config = state.config.clone();
    let handlers = state.handlers.clone();
    let dir = directory.clone();

    let listing = tokio::task::spawn_blocking(move || {
        list_directory(&dir, &config.visibility(), &handlers)
    })
    .await
    .map_err(|err| {
        FileServerError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            err.to_string(),
        ))
    })??;

    let title = if request_path.is_empty() {
        "/"
    } else {
        request_path
    };

    let context = RenderContext {
        environ: request_environ(parts),
        root: construct_url(parts, "", false).trim_end_matches('/').to_string(),
        location: construct_url(parts, raw_path, false),
        title: format!("Index of {}", title),
        directories: listing.directories,
        files: listing.files,
        path: request_path.to_string(),
        directory,
        catalog: state.config.catalog.clone(),
        version: env!("CARGO_PKG_VERSION"),
    };

    let content_type = template.content_type();
    let body = state.renderer.render(template, &context, content_type)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::LAST_MODIFIED, fmt_http_date(listing.last_modified)),
        ],
        body,
    )
        .into_response())
}

/// Rebuild an absolute URL for `path` from the request's scheme and host.
/// Without a host the URL is left relative.
fn construct_url(parts: &Parts, path: &str, with_query: bool) -> String {
    let scheme = parts
        .headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.scheme_str())
        .unwrap_or("http");
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.authority().map(|a| a.as_str()));

    let mut url = match host {
        Some(host) => format!("{}://{}{}", scheme, host, path),
        None => path.to_string(),
    };

    if with_query {
        if let Some(query) = parts.uri.query() {
            url.push('?');
            url.push_str(query);
        }
    }

    url
}

/// Everything before the last `/`: `/sub/catalog.xml` gives `/sub`.
fn parent_path(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
