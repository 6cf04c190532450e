//! Cross-platform path utilities for confpm.
//!
//! Path annotations travel as slash-separated strings regardless of the host
//! platform, so the engine needs a small set of lexical helpers that work on
//! annotation values without touching the filesystem.

use std::path::{Component, Path};

/// Lexically normalize a slash-separated path.
///
/// Collapses `.` and empty components, resolves `..` against preceding
/// components, and preserves leading `..` components that cannot be resolved
/// (the escape check depends on them surviving). An empty result becomes `.`.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => match out.last() {
                Some(&"..") => out.push(".."),
                Some(_) => {
                    out.pop();
                }
                None => {
                    if !rooted {
                        out.push("..");
                    }
                }
            },
            c => out.push(c),
        }
    }
    let joined = out.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Whether a cleaned path resolves outside the directory it is relative to.
pub fn escapes_package(cleaned: &str) -> bool {
    cleaned == ".." || cleaned.starts_with("../") || cleaned.starts_with('/')
}

/// Render a filesystem path as a slash-separated annotation value.
pub fn path_to_slash(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(c) => parts.push(c.to_string_lossy().into_owned()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    parts.join("/")
}
