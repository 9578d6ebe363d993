use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use tracing::warn;

use crate::error::FileServerError;

/// A request path mapped onto the served root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Percent-decoded request path, as the client sent it
    pub request_path: String,
    /// Absolute filesystem path, guaranteed to lie under root
    pub path: PathBuf,
    pub trailing_slash: bool,
    /// `path` with its final extension removed, if it has one
    pub stripped: Option<PathBuf>,
    /// Extension removed to build `stripped`, without the dot
    pub extension: Option<String>,
}

/// Resolve a request path against `root`.
///
/// The path is percent-decoded once and normalized lexically: `.` segments are
/// dropped and `..` pops the previous segment. No filesystem access happens here.
/// Whatever the input, the result must stay under `root`; anything else is
/// rejected with [`FileServerError::PathTraversal`].
pub fn resolve_path(root: &Path, raw_path: &str) -> Result<ResolvedPath, FileServerError> {
    let request_path = percent_decode_str(raw_path)
        .decode_utf8()
        .map_err(|_| FileServerError::NotFound)?
        .into_owned();

    if request_path.contains('\0') {
        warn!("Path contains null byte: {:?}", request_path);
        return Err(FileServerError::PathTraversal);
    }

    let relative = request_path.trim_start_matches('/');
    let mut path = root.to_path_buf();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => path.push(name),
            Component::CurDir => {}
            Component::ParentDir => {
                path.pop();
            }
            Component::RootDir | Component::Prefix(_) => {
                warn!("Absolute path component in request: {:?}", request_path);
                return Err(FileServerError::PathTraversal);
            }
        }
    }

    // Checked on every request, whatever the caller intends to do with the path.
    if !path.starts_with(root) {
        warn!("Path traversal attempt detected: {:?}", request_path);
        return Err(FileServerError::PathTraversal);
    }

    let split = if path == root { None } else { split_extension(&path) };
    let (stripped, extension) = match split {
        Some((base, ext)) => (Some(base), Some(ext)),
        None => (None, None),
    };

    Ok(ResolvedPath {
        trailing_slash: request_path.ends_with('/'),
        request_path,
        path,
        stripped,
        extension,
    })
}

/// Split the final segment of `path` at its last dot.
///
/// Leading dots are part of the name, so `.hidden` has no extension.
pub fn split_extension(path: &Path) -> Option<(PathBuf, String)> {
    let name = path.file_name()?.to_str()?;
    let dot = name.rfind('.')?;
    if name[..dot].trim_start_matches('.').is_empty() {
        return None;
    }
    let base = path.with_file_name(&name[..dot]);
    Some((base, name[dot + 1..].to_string()))
}

/// Path of `full_path` relative to `root`, with `/` separators.
pub fn relative_path(root: &Path, full_path: &Path) -> String {
    full_path
        .strip_prefix(root)
        .map(|p| {
            p.components()
                .filter_map(|c| match c {
                    Component::Normal(name) => Some(name.to_string_lossy()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}
