//! Test plan tree
//!
//! A plan file is a single-key mapping from a node name to its ordered list
//! of children, recursively:
//!
//! ```json
//! { "Smoke": [ { "OpenApplication": [] }, { "Menu": [ { "OpenSettings": [] } ] } ] }
//! ```
//!
//! A node with no children is a runnable test; a node with children is a
//! suite whose `Enter`/`Exit` methods bracket them.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::common::{Error, Result};

/// A named node with ordered children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanNode {
    pub name: String,
    pub children: Vec<PlanNode>,
}

/// On-disk encodings accepted for plan files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Json,
    Yaml,
}

impl PlanFormat {
    /// Pick the format from the file extension, defaulting to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

impl PlanNode {
    /// Create a runnable test node
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Create a suite node
    pub fn suite(name: impl Into<String>, children: Vec<PlanNode>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of runnable tests below (and including) this node
    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(PlanNode::leaf_count).sum()
        }
    }

    /// Load and validate a plan file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        let node = Self::parse(&content, PlanFormat::from_path(path))
            .map_err(|message| Error::plan_parse(path, message))?;
        node.validate()?;

        tracing::debug!(
            path = %path.display(),
            root = %node.name,
            tests = node.leaf_count(),
            "Loaded test plan"
        );
        Ok(node)
    }

    /// Parse plan text in the given format
    pub fn parse(content: &str, format: PlanFormat) -> std::result::Result<Self, String> {
        match format {
            PlanFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            PlanFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        }
    }

    /// Serialize to the given format
    pub fn render(&self, format: PlanFormat) -> Result<String> {
        match format {
            PlanFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            PlanFormat::Yaml => {
                serde_yaml::to_string(self).map_err(|e| Error::Internal(e.to_string()))
            }
        }
    }

    /// Write the plan to a file, format chosen by extension
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.render(PlanFormat::from_path(path))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the structural rules qualified names depend on
    ///
    /// Names must be non-empty, must not contain `.`, and must be unique
    /// among siblings.
    pub fn validate(&self) -> Result<()> {
        self.validate_at(&self.name)
    }

    fn validate_at(&self, path: &str) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::PlanInvalid(format!("empty node name under '{}'", path)));
        }
        if self.name.contains('.') {
            return Err(Error::PlanInvalid(format!(
                "node name '{}' must not contain '.'",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for child in &self.children {
            if !seen.insert(child.name.as_str()) {
                return Err(Error::PlanInvalid(format!(
                    "duplicate node '{}' in '{}'",
                    child.name, path
                )));
            }
            child.validate_at(&format!("{}.{}", path, child.name))?;
        }
        Ok(())
    }
}

impl Serialize for PlanNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.children)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for PlanNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = PlanNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map with a single node name mapped to its list of children")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<PlanNode, A::Error> {
        // `null` children (a bare `Name:` in YAML) mean a leaf
        let (name, children): (String, Option<Vec<PlanNode>>) = map
            .next_entry()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;

        if let Some(extra) = map.next_key::<String>()? {
            return Err(de::Error::custom(format!(
                "node '{}' must be the only key in its map, found '{}'",
                name, extra
            )));
        }

        Ok(PlanNode {
            name,
            children: children.unwrap_or_default(),
        })
    }
}
