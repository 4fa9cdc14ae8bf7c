//! Environment introspection: flat properties and profiles.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use figment::Figment;
use serde_json::Value;

use crate::errors::{ContextError, LookupKind};

pub const DEFAULT_PROFILE: &str = "default";

/// Property key under which active profiles may be listed (comma separated).
pub const ACTIVE_PROFILES_PROPERTY: &str = "profiles.active";

pub trait EnvironmentProvider: Send + Sync {
    fn property(&self, key: &str) -> Option<String>;

    fn active_profiles(&self) -> Vec<String>;

    fn default_profiles(&self) -> Vec<String> {
        vec![DEFAULT_PROFILE.to_string()]
    }

    fn contains_property(&self, key: &str) -> bool {
        self.property(key).is_some()
    }

    fn required_property(&self, key: &str) -> Result<String, ContextError> {
        self.property(key)
            .ok_or_else(|| ContextError::not_found(LookupKind::Property, key))
    }

    /// True when any of `profiles` is active. A `!name` entry matches when
    /// `name` is not active. Default profiles count when none are active.
    fn accepts_profiles(&self, profiles: &[&str]) -> bool {
        let mut active = self.active_profiles();
        if active.is_empty() {
            active = self.default_profiles();
        }
        profiles.iter().any(|p| match p.strip_prefix('!') {
            Some(negated) => !active.iter().any(|a| a == negated),
            None => active.iter().any(|a| a == p),
        })
    }
}

/// Environment backed by a flat property map, optionally layered over a parent.
#[derive(Default)]
pub struct StandardEnvironment {
    properties: BTreeMap<String, String>,
    active_profiles: Vec<String>,
    default_profiles: Vec<String>,
    parent: Option<Arc<dyn EnvironmentProvider>>,
}

impl fmt::Debug for StandardEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardEnvironment")
            .field("properties", &self.properties.len())
            .field("active_profiles", &self.active_profiles)
            .field("default_profiles", &self.default_profiles)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl StandardEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten every value of `figment` into dotted keys. Active profiles are
    /// taken from `profiles.active` when present.
    pub fn from_figment(figment: &Figment) -> Result<Self, figment::Error> {
        let root: Value = figment.extract()?;
        let mut properties = BTreeMap::new();
        flatten_into(&mut properties, String::new(), &root);

        let active_profiles = properties
            .get(ACTIVE_PROFILES_PROPERTY)
            .map(|raw| split_profiles(raw))
            .unwrap_or_default();

        Ok(Self {
            properties,
            active_profiles,
            ..Self::default()
        })
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.properties
            .extend(properties.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_active_profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_profiles = profiles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default_profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_profiles = profiles.into_iter().map(Into::into).collect();
        self
    }

    /// Fall back to `parent` for missing properties; its active profiles are
    /// merged into this environment's.
    pub fn with_parent(mut self, parent: Arc<dyn EnvironmentProvider>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

impl EnvironmentProvider for StandardEnvironment {
    fn property(&self, key: &str) -> Option<String> {
        self.properties
            .get(key)
            .cloned()
            .or_else(|| self.parent.as_ref().and_then(|p| p.property(key)))
    }

    fn active_profiles(&self) -> Vec<String> {
        let mut profiles = self.active_profiles.clone();
        if let Some(parent) = &self.parent {
            for p in parent.active_profiles() {
                if !profiles.contains(&p) {
                    profiles.push(p);
                }
            }
        }
        profiles
    }

    fn default_profiles(&self) -> Vec<String> {
        if self.default_profiles.is_empty() {
            vec![DEFAULT_PROFILE.to_string()]
        } else {
            self.default_profiles.clone()
        }
    }
}

fn split_profiles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Objects become dotted keys. Arrays of scalars become one comma-joined
/// value; arrays holding objects are indexed as `key[i]`.
fn flatten_into(out: &mut BTreeMap<String, String>, prefix: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_into(out, join_key(&prefix, k), v);
            }
        }
        Value::Array(items) if items.iter().all(|v| !v.is_object() && !v.is_array()) => {
            let joined = items
                .iter()
                .map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix, joined);
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_into(out, format!("{prefix}[{i}]"), v);
            }
        }
        Value::Null => {}
        scalar => {
            out.insert(prefix, scalar_to_string(scalar));
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
