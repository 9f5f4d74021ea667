//! Content digests of a local tree and of a remote tree.
//!
//! Both indexes map a relative, `/`-separated path (no leading slash) to the
//! lowercase hex digest of the file's bytes. They are rebuilt on every call.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Component, Path};

use sha1::Sha1;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use sshsync_transport::Connection;

use crate::error::{io_err, SyncError};
use crate::runner::CommandRunner;
use crate::shell;

/// Relative path → hex digest.
pub type DigestIndex = BTreeMap<String, String>;

/// Hash used on both sides of a comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// Matches `sha1sum`.
    #[default]
    Sha1,
    /// Matches `sha256sum`.
    Sha256,
}

impl DigestAlgorithm {
    /// Remote coreutils program printing `<digest>  <path>` lines.
    pub fn remote_tool(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1sum",
            DigestAlgorithm::Sha256 => "sha256sum",
        }
    }

    /// Hex digest of everything `reader` yields.
    pub fn digest_reader(self, reader: &mut impl Read) -> io::Result<String> {
        match self {
            DigestAlgorithm::Sha1 => hash_with::<Sha1>(reader),
            DigestAlgorithm::Sha256 => hash_with::<Sha256>(reader),
        }
    }
}

fn hash_with<D: Digest + Write>(reader: &mut impl Read) -> io::Result<String> {
    let mut hasher = D::new();
    io::copy(reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hex digest of the file at `path`.
pub fn digest_file(path: &Path, algorithm: DigestAlgorithm) -> Result<String, SyncError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    algorithm
        .digest_reader(&mut file)
        .map_err(|e| io_err(path, e))
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

/// Digest every non-directory entry below `root`.
///
/// Symlinks are not followed while walking; a symlink to a file is digested
/// through its target. The first traversal or read error aborts the walk.
pub fn local_index(root: &Path, algorithm: DigestAlgorithm) -> Result<DigestIndex, SyncError> {
    let mut index = DigestIndex::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        let key = relative_key(root, entry.path());
        if key.is_empty() {
            continue;
        }
        index.insert(key, digest_file(entry.path(), algorithm)?);
    }
    Ok(index)
}

fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Command listing digests of every regular file under `root`. Paths are
/// printed relative to the root (`./a/b.txt`) whatever the shell expands
/// `root` to, `~/site` included. A missing root prints nothing and still
/// succeeds.
pub fn remote_listing_command(root: &str, algorithm: DigestAlgorithm) -> String {
    let root = shell::escape(root);
    format!(
        "if [ -d {root} ]; then cd {root} && find . -type f -exec {} {{}} \\; ; fi",
        algorithm.remote_tool()
    )
}

/// Digest every regular file under the remote `root` with one command.
pub fn remote_index(
    runner: &CommandRunner,
    conn: &dyn Connection,
    root: &str,
    algorithm: DigestAlgorithm,
) -> Result<DigestIndex, SyncError> {
    let listing = runner.run(conn, &remote_listing_command(root, algorithm))?;
    Ok(parse_digest_listing(&listing))
}

/// Parse `<digest><spaces>./<path>` lines, as printed by
/// [`remote_listing_command`], into an index.
///
/// Lines without a separator, with a non-hex digest, or with a path not
/// starting at `./` are skipped.
pub fn parse_digest_listing(listing: &str) -> DigestIndex {
    let mut index = DigestIndex::new();
    for line in listing.lines() {
        match parse_line(line) {
            Some((key, digest)) => {
                index.insert(key.to_owned(), digest.to_ascii_lowercase());
            }
            None if line.trim().is_empty() => {}
            None => tracing::trace!("skipping digest line: {line}"),
        }
    }
    index
}

fn parse_line(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(' ').filter(|&idx| idx > 0)?;
    let digest = &line[..idx];
    if !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let path = line[idx..].trim_start_matches(' ');
    let key = path.strip_prefix("./")?.trim_start_matches('/');
    if key.is_empty() {
        return None;
    }
    Some((key, digest))
}
