//! Resource resolution by location or location pattern.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;

use crate::errors::{ContextError, LookupKind};

/// A named blob of content addressed by a location such as `config/app.yaml`.
#[derive(Clone, PartialEq, Eq)]
pub struct Resource {
    location: String,
    contents: Arc<[u8]>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("location", &self.location)
            .field("len", &self.contents.len())
            .finish()
    }
}

impl Resource {
    pub fn new(location: impl Into<String>, contents: impl Into<Arc<[u8]>>) -> Self {
        Self {
            location: location.into(),
            contents: contents.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Last path segment of the location.
    pub fn filename(&self) -> &str {
        self.location.rsplit('/').next().unwrap_or(&self.location)
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.contents).ok()
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

pub trait ResourceResolver: Send + Sync {
    /// Resolve one exact location.
    fn resource(&self, location: &str) -> Result<Resource, ContextError>;

    /// Resolve every resource matching `pattern`. Patterns support `?` (one
    /// character), `*` (within one segment) and `**` (across segments).
    /// A pattern matching nothing fails with `NotFound`.
    fn resources(&self, pattern: &str) -> Result<Vec<Resource>, ContextError>;
}

pub fn is_pattern(location: &str) -> bool {
    location.contains('*') || location.contains('?')
}

/// Translate a location pattern into an anchored regex.
pub fn pattern_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out.push('$');
    Regex::new(&out)
}

/// Resolver over an in-memory set of resources, ordered by location.
#[derive(Default)]
pub struct InMemoryResources {
    entries: RwLock<BTreeMap<String, Resource>>,
}

impl fmt::Debug for InMemoryResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryResources")
            .field("locations", &self.entries.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl InMemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: impl Into<String>, contents: impl Into<Arc<[u8]>>) {
        let resource = Resource::new(location, contents);
        self.entries
            .write()
            .insert(resource.location().to_string(), resource);
    }

    pub fn with(self, location: impl Into<String>, contents: impl Into<Arc<[u8]>>) -> Self {
        self.insert(location, contents);
        self
    }
}

impl ResourceResolver for InMemoryResources {
    fn resource(&self, location: &str) -> Result<Resource, ContextError> {
        self.entries
            .read()
            .get(location)
            .cloned()
            .ok_or_else(|| ContextError::not_found(LookupKind::Resource, location))
    }

    fn resources(&self, pattern: &str) -> Result<Vec<Resource>, ContextError> {
        if !is_pattern(pattern) {
            return self.resource(pattern).map(|r| vec![r]);
        }
        let re = pattern_to_regex(pattern)
            .map_err(|_| ContextError::not_found(LookupKind::Resource, pattern))?;
        let found: Vec<Resource> = self
            .entries
            .read()
            .values()
            .filter(|r| re.is_match(r.location()))
            .cloned()
            .collect();
        if found.is_empty() {
            return Err(ContextError::not_found(LookupKind::Resource, pattern));
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InMemoryResources {
        InMemoryResources::new()
            .with("config/app.yaml", b"a: 1".as_slice())
            .with("config/db.yaml", b"b: 2".as_slice())
            .with("config/nested/extra.yaml", b"c: 3".as_slice())
            .with("static/index.html", b"<html/>".as_slice())
    }

    fn locations(found: &[Resource]) -> Vec<&str> {
        found.iter().map(|r| r.location()).collect()
    }

    #[test]
    fn exact_location() {
        let res = sample();
        let r = res.resource("config/app.yaml").unwrap();
        assert_eq!(r.as_str(), Some("a: 1"));
        assert_eq!(r.filename(), "app.yaml");
        assert!(res.resource("config/none.yaml").unwrap_err().is_not_found());
    }

    #[test]
    fn single_star_stays_in_segment() {
        let res = sample();
        let found = res.resources("config/*.yaml").unwrap();
        assert_eq!(locations(&found), vec!["config/app.yaml", "config/db.yaml"]);
    }

    #[test]
    fn double_star_crosses_segments() {
        let res = sample();
        let found = res.resources("config/**/*.yaml").unwrap();
        assert_eq!(
            locations(&found),
            vec!["config/app.yaml", "config/db.yaml", "config/nested/extra.yaml"]
        );
        let all = res.resources("**").unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn question_mark_and_escaping() {
        let res = InMemoryResources::new()
            .with("a.txt", b"".as_slice())
            .with("abtxt", b"".as_slice());
        let found = res.resources("?.txt").unwrap();
        assert_eq!(locations(&found), vec!["a.txt"]);
    }

    #[test]
    fn empty_match_is_not_found() {
        let res = sample();
        let err = res.resources("missing/**").unwrap_err();
        assert!(err.is_not_found());
    }
}
