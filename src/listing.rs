use std::cmp::Ordering;
use std::path::Path;
use std::time::SystemTime;

use tracing::debug;

use crate::dispatch::HandlerRegistry;
use crate::visibility::Visibility;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    /// Human readable size, see [`format_size`]
    pub size: String,
    pub bytes: u64,
    pub modified: SystemTime,
    /// Whether an installed handler recognizes this file
    pub supported: bool,
}

#[derive(Debug, Clone)]
pub struct Listing {
    pub directories: Vec<DirEntry>,
    pub files: Vec<FileEntry>,
    /// Newest of the directory's own mtime and its listed files' mtimes
    pub last_modified: SystemTime,
}

/// List the immediate children of `dir`.
///
/// Hidden entries are skipped, as are entries that vanish (or are broken
/// symlinks) before their metadata can be read. Only listed files raise the
/// aggregate modification time.
pub fn list_directory(
    dir: &Path,
    visibility: &Visibility<'_>,
    handlers: &HandlerRegistry,
) -> std::io::Result<Listing> {
    let mut last_modified = std::fs::metadata(dir)?.modified()?;
    let mut directories = Vec::new();
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        let path = entry.path();

        if visibility.is_hidden(&path, false) {
            continue;
        }

        // Follows symlinks; a dangling one fails here and is dropped.
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(err) => {
                debug!("Skipping {}: {}", path.display(), err);
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();

        if metadata.is_dir() {
            directories.push(DirEntry { name });
            continue;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        last_modified = last_modified.max(modified);

        files.push(FileEntry {
            name,
            size: format_size(metadata.len()),
            bytes: metadata.len(),
            modified,
            supported: handlers.is_supported(&path),
        });
    }

    directories.sort_by(|a, b| natural_order(&a.name, &b.name));
    files.sort_by(|a, b| natural_order(&a.name, &b.name));

    Ok(Listing {
        directories,
        files,
        last_modified,
    })
}

/// Human readable size.
///
/// `0` is "empty", anything up to 1024 is shown in bytes, then KB with one
/// decimal, then whole MB (truncated).
pub fn format_size(size: u64) -> String {
    if size == 0 {
        return "empty".to_string();
    }
    if size > 1024 {
        let kb = size as f64 / 1024.0;
        if kb > 1024.0 {
            let mb = kb / 1024.0;
            return format!("{} MB", mb.trunc() as u64);
        }
        return format!("{:.1} KB", kb);
    }
    format!("{} bytes", size)
}

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Text(&'a str),
    Number(&'a str),
}

/// Split into alternating text and digit runs, always starting and ending with
/// a (possibly empty) text run: `"z23a"` gives `["z", 23, "a"]`.
fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            out.push(Chunk::Text(&s[start..i]));
            let digits = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            out.push(Chunk::Number(&s[digits..i]));
            start = i;
        } else {
            i += 1;
        }
    }
    out.push(Chunk::Text(&s[start..]));
    out
}

fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Natural ordering: digit runs compare as numbers, so `file2` sorts before `file10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = chunks(a);
    let b = chunks(b);

    for (x, y) in a.iter().zip(b.iter()) {
        let ord = match (x, y) {
            (Chunk::Number(x), Chunk::Number(y)) => cmp_numeric(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
            // Runs alternate from the same starting kind, so kinds always line up.
            (Chunk::Text(_), Chunk::Number(_)) => Ordering::Less,
            (Chunk::Number(_), Chunk::Text(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// [`natural_cmp`] with the raw name as tie-break so equal keys (`a01`, `a1`)
/// still order deterministically.
fn natural_order(a: &str, b: &str) -> Ordering {
    natural_cmp(a, b).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    use crate::dispatch::{Handler, HandlerRequest};
    use axum::response::{IntoResponse, Response};
    use futures::future::BoxFuture;

    struct NetCdf;

    impl Handler for NetCdf {
        fn name(&self) -> &str {
            "netcdf"
        }

        fn extensions(&self) -> Vec<String> {
            vec!["nc".to_string()]
        }

        fn handle(&self, _request: HandlerRequest) -> BoxFuture<'static, Response> {
            Box::pin(async { "ok".into_response() })
        }
    }

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        names.sort_by(|a, b| natural_order(a, b));
        names
    }

    #[test]
    fn test_chunks() {
        assert_eq!(
            chunks("z23a"),
            vec![Chunk::Text("z"), Chunk::Number("23"), Chunk::Text("a")]
        );
        assert_eq!(
            chunks("10"),
            vec![Chunk::Text(""), Chunk::Number("10"), Chunk::Text("")]
        );
        assert_eq!(chunks(""), vec![Chunk::Text("")]);
    }

    #[test]
    fn test_natural_sort() {
        assert_eq!(
            sorted(&["img10.png", "img2.png", "img1.png"]),
            vec!["img1.png", "img2.png", "img10.png"]
        );
        assert_eq!(sorted(&["file10", "file2", "file1b", "file1"]), vec![
            "file1", "file1b", "file2", "file10"
        ]);
    }

    #[test]
    fn test_natural_sort_numbers_before_text() {
        assert_eq!(sorted(&["b", "10", "a", "2"]), vec!["2", "10", "a", "b"]);
    }

    #[test]
    fn test_natural_sort_is_case_sensitive() {
        assert_eq!(sorted(&["b", "B", "a", "A"]), vec!["A", "B", "a", "b"]);
    }

    #[test]
    fn test_natural_sort_long_digit_runs() {
        assert_eq!(
            sorted(&["x100000000000000000000001", "x99999999999999999999999"]),
            vec!["x99999999999999999999999", "x100000000000000000000001"]
        );
    }

    #[test]
    fn test_natural_sort_leading_zeros_tie_break() {
        assert_eq!(natural_cmp("a01", "a1"), Ordering::Equal);
        assert_eq!(sorted(&["a1", "a01"]), vec!["a01", "a1"]);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "empty");
        assert_eq!(format_size(1), "1 bytes");
        assert_eq!(format_size(500), "500 bytes");
        assert_eq!(format_size(1024), "1024 bytes");
        assert_eq!(format_size(1025), "1.0 KB");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1024.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_size(5 * 1024 * 1024 + 900 * 1024), "5 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3072 MB");
    }

    #[test]
    fn test_list_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();

        fs::create_dir(root.join("dir10")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir2/nested")).unwrap();
        fs::write(root.join("b.nc"), vec![0u8; 2048]).unwrap();
        fs::write(root.join("a.txt"), "hello").unwrap();
        fs::write(root.join("dir2/nested.txt"), "x").unwrap();

        let handlers = HandlerRegistry::new().with_handler(Arc::new(NetCdf));
        let visibility = Visibility::new(&root, None);
        let listing = list_directory(&root, &visibility, &handlers).unwrap();

        let dirs: Vec<_> = listing.directories.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(dirs, vec!["dir2", "dir10"]);

        let files: Vec<_> = listing.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(files, vec!["a.txt", "b.nc"]);

        assert_eq!(listing.files[0].size, "5 bytes");
        assert!(!listing.files[0].supported);
        assert_eq!(listing.files[1].size, "2.0 KB");
        assert!(listing.files[1].supported);
    }

    #[test]
    fn test_list_directory_filters_hidden_entries() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();

        fs::create_dir(root.join(".private")).unwrap();
        fs::create_dir(root.join("public")).unwrap();
        fs::write(root.join(".secret"), "x").unwrap();
        fs::write(root.join("visible.txt"), "x").unwrap();

        let pattern = Regex::new(r"^\.").unwrap();
        let visibility = Visibility::new(&root, Some(&pattern));
        let listing = list_directory(&root, &visibility, &HandlerRegistry::new()).unwrap();

        assert_eq!(listing.directories, vec![DirEntry { name: "public".to_string() }]);
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].name, "visible.txt");
    }

    #[test]
    fn test_last_modified_ignores_hidden_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();

        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
        let newer = SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        let future = SystemTime::now() + Duration::from_secs(365 * 24 * 3600);

        fs::write(root.join("visible.txt"), "x").unwrap();
        fs::write(root.join(".hidden"), "x").unwrap();
        set_mtime(&root.join("visible.txt"), future);
        set_mtime(&root.join(".hidden"), future + Duration::from_secs(3600));
        set_mtime(&root, old);

        let pattern = Regex::new(r"^\.").unwrap();
        let visibility = Visibility::new(&root, Some(&pattern));
        let listing = list_directory(&root, &visibility, &HandlerRegistry::new()).unwrap();
        assert_eq!(listing.last_modified, future);

        // Directory mtime wins when it is newer than every file.
        set_mtime(&root.join("visible.txt"), old);
        set_mtime(&root, newer);
        let listing = list_directory(&root, &visibility, &HandlerRegistry::new()).unwrap();
        assert_eq!(listing.last_modified, newer);
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();

        fs::write(root.join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(root.join("missing.txt"), root.join("dangling.txt")).unwrap();

        let visibility = Visibility::new(&root, None);
        let listing = list_directory(&root, &visibility, &HandlerRegistry::new()).unwrap();
        let files: Vec<_> = listing.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(files, vec!["real.txt"]);
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = fs::File::options().write(true).open(path).or_else(|_| fs::File::open(path)).unwrap();
        file.set_modified(time).unwrap();
    }
}
