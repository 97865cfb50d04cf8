//! Unified context class for OpenViking.
//!
//! Port of `openviking/core/context.py`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Resource content type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceContentType {
    /// Plain text content.
    Text,
    /// Image content.
    Image,
    /// Video content.
    Video,
    /// Audio content.
    Audio,
    /// Binary/opaque content.
    Binary,
}

impl ResourceContentType {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Binary => "binary",
        }
    }
}

impl std::fmt::Display for ResourceContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceContentType {
    type Err = crate::error::OvError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "binary" => Ok(Self::Binary),
            _ => Err(crate::error::OvError::InvalidUri(format!("unknown content type: {s}"))),
        }
    }
}

/// Context type — skill, memory, or resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    /// A callable skill.
    Skill,
    /// A memory entry (user or agent).
    Memory,
    /// A generic resource.
    Resource,
}

impl ContextType {
    /// Return the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skill => "skill",
            Self::Memory => "memory",
            Self::Resource => "resource",
        }
    }
}

impl std::fmt::Display for ContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContextType {
    type Err = crate::error::OvError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "skill" => Ok(Self::Skill),
            "memory" => Ok(Self::Memory),
            "resource" => Ok(Self::Resource),
            _ => Err(crate::error::OvError::InvalidUri(format!("unknown context type: {s}"))),
        }
    }
}

/// Vectorization payload — text (and future multi-modal) to embed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Vectorize {
    /// Text to vectorize.
    pub text: String,
}

impl Vectorize {
    /// Create a new vectorize payload with the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Unified context — the core data record in OpenViking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// Unique identifier.
    pub id: Uuid,
    /// Viking URI (e.g. `viking://user/memories/preferences`).
    pub uri: String,
    /// Parent URI, if any.
    pub parent_uri: Option<String>,
    /// Whether this is a leaf node.
    pub is_leaf: bool,
    /// L0 abstract / summary text.
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Context type.
    pub context_type: ContextType,
    /// Derived category (e.g. "patterns", "preferences").
    pub category: String,
    /// Display name, independent of the URI's last segment.
    #[serde(default)]
    pub name: String,
    /// One-line human description.
    #[serde(default)]
    pub description: String,
    /// L1 overview text — longer than the L0 abstract, shorter than the
    /// full leaf content.
    #[serde(default)]
    pub overview_text: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-updated timestamp.
    pub updated_at: DateTime<Utc>,
    /// Number of times this context was accessed.
    pub active_count: u64,
    /// Related URIs.
    pub related_uri: Vec<String>,
    /// Arbitrary metadata.
    pub meta: HashMap<String, serde_json::Value>,
    /// Session identifier.
    pub session_id: Option<String>,
    /// Dense embedding vector.
    pub vector: Option<Vec<f32>>,
    /// Sparse embedding (term id/hash -> weight), when a sparse embedder
    /// is configured.
    #[serde(default)]
    pub sparse_vector: Option<HashMap<String, f32>>,
    /// Vectorization payload (not persisted to JSON).
    #[serde(skip)]
    pub vectorize: Vectorize,
}

impl Context {
    /// Create a new context with the given URI and abstract text.
    pub fn new(uri: impl Into<String>, abstract_text: impl Into<String>) -> Self {
        let uri = uri.into();
        let abs = abstract_text.into();
        let context_type = Self::derive_context_type(&uri);
        let category = Self::derive_category(&uri);
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            uri,
            parent_uri: None,
            is_leaf: false,
            abstract_text: abs.clone(),
            context_type,
            category,
            name: String::new(),
            description: String::new(),
            overview_text: String::new(),
            created_at: now,
            updated_at: now,
            active_count: 0,
            related_uri: Vec::new(),
            meta: HashMap::new(),
            session_id: None,
            vector: None,
            sparse_vector: None,
            vectorize: Vectorize { text: abs },
        }
    }

    /// Create a context builder for more fine-grained construction.
    pub fn builder(uri: impl Into<String>) -> ContextBuilder {
        ContextBuilder::new(uri)
    }

    /// Increment activity count and update timestamp.
    pub fn update_activity(&mut self) {
        self.active_count += 1;
        self.updated_at = Utc::now();
    }

    /// Get the context type (alias).
    pub fn get_context_type(&self) -> &ContextType {
        &self.context_type
    }

    /// Set the vectorization payload.
    pub fn set_vectorize(&mut self, vectorize: Vectorize) {
        self.vectorize = vectorize;
    }

    /// Get text for vectorization.
    pub fn get_vectorization_text(&self) -> &str {
        &self.vectorize.text
    }

    /// Derive context type from URI prefix.
    pub fn derive_context_type(uri: &str) -> ContextType {
        if uri.starts_with("viking://agent/skills") {
            ContextType::Skill
        } else if uri.contains("memories") {
            ContextType::Memory
        } else {
            ContextType::Resource
        }
    }

    /// Derive category from URI prefix.
    pub fn derive_category(uri: &str) -> String {
        if uri.starts_with("viking://agent/memories") {
            if uri.contains("patterns") {
                return "patterns".into();
            }
            if uri.contains("cases") {
                return "cases".into();
            }
        } else if uri.starts_with("viking://user/memories") {
            if uri.contains("profile") {
                return "profile".into();
            }
            if uri.contains("preferences") {
                return "preferences".into();
            }
            if uri.contains("entities") {
                return "entities".into();
            }
            if uri.contains("events") {
                return "events".into();
            }
        }
        String::new()
    }
}

/// Builder for [`Context`].
pub struct ContextBuilder {
    uri: String,
    parent_uri: Option<String>,
    is_leaf: bool,
    abstract_text: String,
    context_type: Option<ContextType>,
    category: Option<String>,
    name: String,
    description: String,
    overview_text: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    active_count: u64,
    related_uri: Vec<String>,
    meta: HashMap<String, serde_json::Value>,
    session_id: Option<String>,
    id: Option<Uuid>,
}

impl ContextBuilder {
    /// Create a new builder with the required URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            parent_uri: None,
            is_leaf: false,
            abstract_text: String::new(),
            context_type: None,
            category: None,
            name: String::new(),
            description: String::new(),
            overview_text: String::new(),
            created_at: None,
            updated_at: None,
            active_count: 0,
            related_uri: Vec::new(),
            meta: HashMap::new(),
            session_id: None,
            id: None,
        }
    }

    /// Set the parent URI.
    pub fn parent_uri(mut self, v: impl Into<String>) -> Self {
        self.parent_uri = Some(v.into());
        self
    }

    /// Mark as leaf node.
    pub fn is_leaf(mut self, v: bool) -> Self {
        self.is_leaf = v;
        self
    }

    /// Set the abstract text.
    pub fn abstract_text(mut self, v: impl Into<String>) -> Self {
        self.abstract_text = v.into();
        self
    }

    /// Override context type.
    pub fn context_type(mut self, v: ContextType) -> Self {
        self.context_type = Some(v);
        self
    }

    /// Override category.
    pub fn category(mut self, v: impl Into<String>) -> Self {
        self.category = Some(v.into());
        self
    }

    /// Set the display name.
    pub fn name(mut self, v: impl Into<String>) -> Self {
        self.name = v.into();
        self
    }

    /// Set the one-line description.
    pub fn description(mut self, v: impl Into<String>) -> Self {
        self.description = v.into();
        self
    }

    /// Set the L1 overview text.
    pub fn overview_text(mut self, v: impl Into<String>) -> Self {
        self.overview_text = v.into();
        self
    }

    /// Set creation time.
    pub fn created_at(mut self, v: DateTime<Utc>) -> Self {
        self.created_at = Some(v);
        self
    }

    /// Set active count.
    pub fn active_count(mut self, v: u64) -> Self {
        self.active_count = v;
        self
    }

    /// Set related URIs.
    pub fn related_uri(mut self, v: Vec<String>) -> Self {
        self.related_uri = v;
        self
    }

    /// Set metadata.
    pub fn meta(mut self, v: HashMap<String, serde_json::Value>) -> Self {
        self.meta = v;
        self
    }

    /// Set session id.
    pub fn session_id(mut self, v: impl Into<String>) -> Self {
        self.session_id = Some(v.into());
        self
    }

    /// Override the UUID.
    pub fn id(mut self, v: Uuid) -> Self {
        self.id = Some(v);
        self
    }

    /// Build the [`Context`].
    pub fn build(self) -> Context {
        let context_type = self
            .context_type
            .unwrap_or_else(|| Context::derive_context_type(&self.uri));
        let category = self
            .category
            .unwrap_or_else(|| Context::derive_category(&self.uri));
        let now = Utc::now();
        let created = self.created_at.unwrap_or(now);
        let updated = self.updated_at.unwrap_or(created);
        Context {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            uri: self.uri,
            parent_uri: self.parent_uri,
            is_leaf: self.is_leaf,
            abstract_text: self.abstract_text.clone(),
            context_type,
            category,
            name: self.name,
            description: self.description,
            overview_text: self.overview_text,
            created_at: created,
            updated_at: updated,
            active_count: self.active_count,
            related_uri: self.related_uri,
            meta: self.meta,
            session_id: self.session_id,
            vector: None,
            sparse_vector: None,
            vectorize: Vectorize {
                text: self.abstract_text,
            },
        }
    }
}
