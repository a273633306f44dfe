//! Helpers for keeping credentials out of logs and object names out of
//! places they should not reach on the local filesystem.

use std::path::{Path, PathBuf};

/// Placeholder printed instead of a secret.
pub const REDACTED: &str = "****";

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips userinfo from a URL and drops its query string, which for
/// pre-signed URLs carries the signature.
///
/// - `https://user:pw@host/path` → `https://****@host/path`
/// - `https://host/bucket/obj?X-Amz-Signature=abc` → `https://host/bucket/obj?****`
pub fn redact_url(url: &str) -> String {
    let (base, had_query) = match url.split_once('?') {
        Some((base, _)) => (base, true),
        None => (url, false),
    };

    let mut out = match base.find("://") {
        Some(scheme_end) => {
            let after_scheme = &base[scheme_end + 3..];
            let host_end = after_scheme.find('/').unwrap_or(after_scheme.len());
            match after_scheme[..host_end].rfind('@') {
                Some(at_pos) => format!(
                    "{}{}@{}",
                    &base[..scheme_end + 3],
                    REDACTED,
                    &after_scheme[at_pos + 1..]
                ),
                None => base.to_string(),
            }
        }
        None => base.to_string(),
    };

    if had_query {
        out.push('?');
        out.push_str(REDACTED);
    }
    out
}

/// Maps an identifier such as a request id onto a single local file name.
///
/// Path separators become `_` so the name can never leave its parent
/// directory; a leading dot is replaced for the same reason.
pub fn local_file_name(object_name: &str) -> String {
    let mut name: String = object_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    if name.starts_with('.') {
        name.replace_range(..1, "_");
    }
    if name.is_empty() {
        name.push('_');
    }
    name
}

/// Relative local path for a bucket object key, keeping its `/` structure.
///
/// Returns `None` for keys that could escape the target directory or that
/// would share a local path with another key: absolute keys, empty, `.` or
/// `..` segments, and backslashes or NUL bytes.
pub fn local_object_path(object_name: &str) -> Option<PathBuf> {
    if object_name.contains(['\\', '\0']) {
        return None;
    }
    let mut path = PathBuf::new();
    for segment in object_name.split('/') {
        if matches!(segment, "" | "." | "..") {
            return None;
        }
        path.push(segment);
    }
    Some(path)
}
