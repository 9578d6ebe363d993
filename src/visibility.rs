use std::path::{Component, Path};

use regex::Regex;

/// Reserved subdirectory of root that is always served, whatever the filter says
pub const STATIC_DIR: &str = ".static";

/// Decides which entries under root are hidden from listings and direct access.
#[derive(Debug, Clone, Copy)]
pub struct Visibility<'a> {
    root: &'a Path,
    pattern: Option<&'a Regex>,
}

impl<'a> Visibility<'a> {
    pub fn new(root: &'a Path, pattern: Option<&'a Regex>) -> Self {
        Self { root, pattern }
    }

    /// Whether `path` should be hidden.
    ///
    /// Shallow checks only look at the entry's own name. Deep checks look at every
    /// segment between root and `path`, so anything below a hidden directory is
    /// hidden too.
    pub fn is_hidden(&self, path: &Path, deep: bool) -> bool {
        if self.pattern.is_none() {
            return false;
        }

        let relative = path.strip_prefix(self.root).unwrap_or(path);
        let mut segments = relative.components().filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        });

        if deep {
            let mut any = false;
            let mut empty = true;
            for segment in segments {
                empty = false;
                any |= self.matches(&segment);
            }
            // Root itself is the empty relative path.
            if empty {
                return self.matches("");
            }
            any
        } else {
            match segments.next_back() {
                Some(name) => self.matches(&name),
                None => self.matches(""),
            }
        }
    }

    /// Search `name` for the pattern. No pattern never matches.
    pub fn matches(&self, name: &str) -> bool {
        match self.pattern {
            Some(pattern) => pattern.is_match(name),
            None => false,
        }
    }
}

/// Whether `path` lies under the reserved [`STATIC_DIR`] of `root`.
pub fn is_static_asset(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .ok()
        .and_then(|relative| relative.components().next())
        .map(|first| first.as_os_str() == STATIC_DIR)
        .unwrap_or(false)
}
