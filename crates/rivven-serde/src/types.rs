//! Registry identifiers and resolved schema bindings

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Globally unique schema identifier assigned by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(pub u32);

impl SchemaId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SchemaId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Subject (typically topic-name + "-key" or "-value")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(pub String);

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Create a key subject for a topic
    pub fn key(topic: &str) -> Self {
        Self(format!("{}-key", topic))
    }

    /// Create a value subject for a topic
    pub fn value(topic: &str) -> Self {
        Self(format!("{}-value", topic))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Subject {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Subject {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&Subject> for Subject {
    fn from(s: &Subject) -> Self {
        s.clone()
    }
}

/// Version of a schema within a subject
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    /// A concrete, registry-assigned version number
    Version(u32),
    /// Whatever the registry currently considers the newest version
    #[default]
    Latest,
}

impl SchemaVersion {
    pub fn new(version: u32) -> Self {
        Self::Version(version)
    }

    pub fn latest() -> Self {
        Self::Latest
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }

    /// The concrete version number, if any
    pub fn number(&self) -> Option<u32> {
        match self {
            Self::Version(v) => Some(*v),
            Self::Latest => None,
        }
    }
}

impl From<u32> for SchemaVersion {
    fn from(version: u32) -> Self {
        Self::Version(version)
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Version(v) => write!(f, "{}", v),
            Self::Latest => write!(f, "latest"),
        }
    }
}

/// A subject/version lookup result as returned by the remote registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSchema {
    /// Subject the schema is registered under
    pub subject: Subject,
    /// Version within the subject
    pub version: u32,
    /// Global schema ID
    pub id: SchemaId,
    /// The schema definition
    pub schema: String,
}

/// One resolved schema binding held by the cache.
///
/// Immutable once built; shared by `Arc` between the cache indices and any
/// codec handle that was given out for its subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaEntry {
    pub subject: Subject,
    pub schema: Arc<str>,
    pub id: SchemaId,
    pub version: u32,
}

impl SchemaEntry {
    pub fn new(subject: Subject, schema: impl Into<Arc<str>>, id: SchemaId, version: u32) -> Self {
        Self {
            subject,
            schema: schema.into(),
            id,
            version,
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }
}

impl From<SubjectSchema> for SchemaEntry {
    fn from(s: SubjectSchema) -> Self {
        Self::new(s.subject, s.schema, s.id, s.version)
    }
}
