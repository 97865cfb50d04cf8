//! `viking://<scope>/<path>` URI grammar: parsing, validation, normalization.

use crate::error::{OvError, Result};
use std::fmt;

pub const SCHEME: &str = "viking://";

/// The six top-level scopes a URI may address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Resources,
    User,
    Agent,
    Session,
    Queue,
    Temp,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resources => "resources",
            Self::User => "user",
            Self::Agent => "agent",
            Self::Session => "session",
            Self::Queue => "queue",
            Self::Temp => "temp",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "resources" => Some(Self::Resources),
            "user" => Some(Self::User),
            "agent" => Some(Self::Agent),
            "session" => Some(Self::Session),
            "queue" => Some(Self::Queue),
            "temp" => Some(Self::Temp),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parsed, normalized `viking://` URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VikingUri {
    pub scope: Scope,
    /// Path segments after the scope, normalized (no empty segments, no
    /// `.`/`..`, no trailing slash).
    pub segments: Vec<String>,
}

impl VikingUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| OvError::InvalidUri(uri.to_string()))?;
        if rest.is_empty() {
            return Err(OvError::InvalidUri(uri.to_string()));
        }
        let mut parts = rest.split('/');
        let scope_str = parts.next().unwrap_or("");
        let scope = Scope::parse(scope_str).ok_or_else(|| OvError::InvalidUri(uri.to_string()))?;

        let mut segments = Vec::new();
        for seg in parts {
            if seg.is_empty() {
                continue;
            }
            if seg == "." || seg == ".." {
                return Err(OvError::InvalidUri(format!("path traversal segment in {uri}")));
            }
            segments.push(seg.to_string());
        }
        Ok(Self { scope, segments })
    }

    pub fn root(scope: Scope) -> Self {
        Self { scope, segments: Vec::new() }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { scope: self.scope, segments })
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { scope: self.scope, segments }
    }

    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path relative to the scope root, `/`-joined, with no leading slash.
    pub fn rel_path(&self) -> String {
        self.segments.join("/")
    }

    /// True if `self` is `other` or a descendant of `other`.
    pub fn starts_with(&self, other: &VikingUri) -> bool {
        self.scope == other.scope
            && self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }
}

impl fmt::Display for VikingUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "{SCHEME}{}", self.scope)
        } else {
            write!(f, "{SCHEME}{}/{}", self.scope, self.rel_path())
        }
    }
}
