//! Watch definitions.

use serde::{Deserialize, Serialize};

/// A single watched resource with its extraction and ignore rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Watch {
    /// Display name used in logs and notifications
    pub name: String,

    /// Resource URL; also the snapshot key
    pub url: String,

    /// Skip this watch during runs
    #[serde(default)]
    pub disabled: bool,

    /// Regex whose first capture group becomes the compared content
    #[serde(default)]
    pub pattern: Option<String>,

    /// Substitutions applied in order after extraction
    #[serde(default)]
    pub replaces: Vec<Replace>,

    /// Status codes ignored for this watch on top of the global list
    #[serde(default)]
    pub additional_http_errors_to_ignore: Vec<u16>,

    /// Extra notification recipients for this watch
    #[serde(default)]
    pub additional_to: Vec<String>,
}

impl Watch {
    /// Create an enabled watch without any rules.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            disabled: false,
            pattern: None,
            replaces: Vec::new(),
            additional_http_errors_to_ignore: Vec::new(),
            additional_to: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    /// Extraction pattern, treating an empty string as unset.
    pub fn extraction_pattern(&self) -> Option<&str> {
        self.pattern.as_deref().filter(|p| !p.is_empty())
    }
}

/// A regex substitution rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Replace {
    pub pattern: String,
    #[serde(default)]
    pub replace_with: String,
}
