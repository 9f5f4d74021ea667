//! Remote path handling for the POSIX shell on the far side.
//!
//! Remote paths are plain `/`-separated strings. Only spaces are escaped
//! before a path is spliced into a command line.

/// Backslash-escape every space in `path`.
pub fn escape(path: &str) -> String {
    path.replace(' ', "\\ ")
}

/// `root` without trailing slashes. `/` becomes the empty string.
pub(crate) fn trim_root(root: &str) -> &str {
    root.trim_end_matches('/')
}

/// `<root>/<key>` for a relative digest key.
pub fn join(root: &str, key: &str) -> String {
    format!("{}/{}", trim_root(root), key.trim_start_matches('/'))
}

/// Directory part of a remote path, `.` when there is none.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => ".",
    }
}

/// Final component of a remote path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
