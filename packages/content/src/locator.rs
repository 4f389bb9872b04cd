//! Best-effort descriptor for re-finding a node when its content key no
//! longer resolves. Every field is optional: a locator with only a
//! subset of fields is valid input to a degraded matching pass.

use pagewright_dom::PathStep;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of how to re-find a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locator {
    /// Positional path from the root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathStep>>,

    /// Shorthand structural query (`#id` or `tag.class1.class2:nth(i)`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// The node's own direct text, nested editable children excluded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Curated attribute subset (engine-internal attributes excluded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
}

impl Locator {
    /// Classes captured in the locator's `class` attribute, if any.
    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .as_ref()
            .and_then(|a| a.get("class"))
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Captured attributes other than `class`, used as exact
    /// disambiguators during similarity matching.
    pub fn disambiguating_attributes(&self) -> Vec<(&str, &str)> {
        self.attributes
            .as_ref()
            .map(|a| {
                a.iter()
                    .filter(|(k, _)| k.as_str() != "class")
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_none()
            && self.query.is_none()
            && self.direct_text.is_none()
            && self.tag.is_none()
            && self.attributes.is_none()
    }
}
