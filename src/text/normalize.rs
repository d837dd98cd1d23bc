//! Literal text substitutions applied before batching.
//!
//! OCR output spells ellipses and doubled punctuation with full-width
//! characters; the analysis channel expects the single-codepoint forms.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// One literal substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

impl Replacement {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Default rules. Order matters: the three-dot form must run first.
pub fn default_replacements() -> Vec<Replacement> {
    vec![
        Replacement::new("．．．", "…"),
        Replacement::new("．．", "…"),
        Replacement::new("！！", "‼"),
        Replacement::new("！？", "⁉"),
    ]
}

/// Ordered list of literal replacements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    rules: Vec<Replacement>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(default_replacements())
    }
}

impl Normalizer {
    /// Rules with an empty `from` are dropped; they would match everywhere.
    pub fn new(rules: Vec<Replacement>) -> Self {
        let rules = rules
            .into_iter()
            .filter(|rule| !rule.from.is_empty())
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[Replacement] {
        &self.rules
    }

    /// Apply every rule in order; borrows when nothing matched.
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut current = Cow::Borrowed(text);
        for rule in &self.rules {
            if current.contains(rule.from.as_str()) {
                current = Cow::Owned(current.replace(rule.from.as_str(), &rule.to));
            }
        }
        current
    }
}
