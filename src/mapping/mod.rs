//! User-Info Mapping
//!
//! Projects configured fields of a provider payload onto a flat, ordered
//! attribute map. Each source is a `/`-delimited path walked one segment at a
//! time; a segment that cannot be followed ends the walk with no value.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;

/// Flat attributes produced by a mapping, in configured order.
pub type MappedAttributes = Map<String, Value>;

/// Parsed `/`-delimited path into a JSON document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributePath {
    segments: Vec<String>,
}

impl AttributePath {
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path.split('/').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    /// Walk the path. Objects step by key, arrays by decimal index; any other
    /// step yields `None`.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |node, segment| match node {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Ordered `(target_field, source_path)` pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserInfoMapping {
    entries: Vec<(String, AttributePath)>,
}

impl UserInfoMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mapping entry; a repeated target replaces the earlier one in place.
    pub fn with(mut self, target: impl Into<String>, source: &str) -> Self {
        self.insert(target, source);
        self
    }

    pub fn insert(&mut self, target: impl Into<String>, source: &str) {
        let target = target.into();
        let path = AttributePath::parse(source);
        match self.entries.iter_mut().find(|(t, _)| *t == target) {
            Some(entry) => entry.1 = path,
            None => self.entries.push((target, path)),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &AttributePath)> {
        self.entries.iter().map(|(t, p)| (t.as_str(), p))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Source paths, in order (VK requests exactly these fields).
    pub fn source_fields(&self) -> Vec<String> {
        self.entries.iter().map(|(_, p)| p.to_string()).collect()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for UserInfoMapping {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (target, source) in iter {
            mapping.insert(target, source);
        }
        mapping
    }
}

impl<'de> Deserialize<'de> for UserInfoMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = UserInfoMapping;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of target field to source path")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut mapping = UserInfoMapping::new();
                while let Some((target, source)) = access.next_entry::<String, String>()? {
                    mapping.insert(target, &source);
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}

/// Project `payload` through `mapping`.
///
/// A single-segment source that is absent maps to `null`; a nested source
/// that cannot be followed leaves the field out entirely.
pub fn map_user_info(mapping: &UserInfoMapping, payload: &Value) -> MappedAttributes {
    let mut attributes = MappedAttributes::new();

    for (target, path) in mapping.entries() {
        match path.resolve(payload) {
            Some(value) if !(path.is_nested() && value.is_null()) => {
                attributes.insert(target.to_string(), value.clone());
            }
            None if !path.is_nested() => {
                attributes.insert(target.to_string(), Value::Null);
            }
            _ => {
                tracing::debug!(field = target, source = %path, "user info path not present");
            }
        }
    }

    attributes
}
