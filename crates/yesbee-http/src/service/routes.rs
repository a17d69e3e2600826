//! Per-origin route table.
//!
//! Routes are literal path prefixes. A request resolves to the exact route
//! for its path if there is one, otherwise to the longest registered prefix
//! of the path. Equal-length candidates cannot both be prefixes of the same
//! path unless they are equal, so the result is deterministic.

use crate::component::{same_processor, Processor};
use parking_lot::RwLock;
use std::sync::Arc;

/// Trim whitespace and trailing slashes. The root stays `/` and an empty
/// path becomes `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The part of `path` after the matched prefix. The root route keeps the
/// whole path.
pub fn translated_uri<'a>(path: &'a str, prefix: &str) -> &'a str {
    if prefix == "/" {
        return path;
    }
    path.strip_prefix(prefix).unwrap_or(path)
}

#[derive(Clone)]
pub struct RouteMatch {
    pub prefix: String,
    pub handler: Arc<dyn Processor>,
}

struct RouteEntry {
    prefix: String,
    handler: Arc<dyn Processor>,
}

#[derive(Default)]
pub struct RouteTable {
    entries: RwLock<Vec<RouteEntry>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `path`. An existing route for the same path is
    /// replaced in place. Returns the normalized path.
    pub fn route(&self, path: &str, handler: Arc<dyn Processor>) -> String {
        let prefix = normalize_path(path);
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.prefix == prefix) {
            Some(entry) => entry.handler = handler,
            None => entries.push(RouteEntry {
                prefix: prefix.clone(),
                handler,
            }),
        }
        prefix
    }

    /// Remove the route for `path` only if it is still bound to `handler`.
    pub fn deroute(&self, path: &str, handler: &Arc<dyn Processor>) -> bool {
        let prefix = normalize_path(path);
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| !(e.prefix == prefix && same_processor(&e.handler, handler)));
        entries.len() != before
    }

    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let path = normalize_path(path);
        let entries = self.entries.read();

        let exact = entries.iter().find(|e| e.prefix == path);
        let found = exact.or_else(|| {
            entries
                .iter()
                .filter(|e| path.starts_with(e.prefix.as_str()))
                .fold(None::<&RouteEntry>, |best, e| match best {
                    Some(b) if b.prefix.len() >= e.prefix.len() => Some(b),
                    _ => Some(e),
                })
        })?;

        Some(RouteMatch {
            prefix: found.prefix.clone(),
            handler: Arc::clone(&found.handler),
        })
    }

    /// Registered prefixes in insertion order.
    pub fn prefixes(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.prefix.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
