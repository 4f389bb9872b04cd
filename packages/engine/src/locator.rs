//! # Locator Generation
//!
//! Derives the structural descriptors used to re-find a node after a
//! fresh render: a positional path, a shorthand query, the node's own
//! direct text, its tag, and a curated attribute subset. Generation
//! never fails and never mutates the node; any field that cannot be
//! computed is simply omitted, and a partial locator is valid input to
//! a degraded matching pass.

use crate::keys::{is_internal_attribute, is_internal_class};
use pagewright_content::Locator;
use pagewright_dom::{path_from_root, resolve_query, NodeId, PageTree};
use std::collections::BTreeMap;

/// Attributes worth snapshotting for re-identification. `class` is
/// captured for overlap scoring; the rest are exact disambiguators.
/// Engine-internal `data-pw-*` attributes are never captured.
const SALIENT_ATTRS: &[&str] = &["id", "class", "role", "name", "type", "href", "alt"];

/// Maximum classes carried into the shorthand query.
const QUERY_CLASS_LIMIT: usize = 2;

pub fn generate_locator(tree: &PageTree, node: NodeId) -> Locator {
    let tag = tree.tag(node).map(|t| t.to_string());

    let direct_text = match tree.direct_text(node) {
        t if t.is_empty() => None,
        t => Some(t),
    };

    let attributes = salient_attributes(tree, node);

    Locator {
        path: path_from_root(tree, node),
        query: build_query(tree, node),
        direct_text,
        tag,
        attributes,
    }
}

/// Shorthand query: the node's own id when present, else tag plus up to
/// two non-internal classes, with an `:nth(i)` disambiguator appended
/// when the selector alone still matches several nodes.
fn build_query(tree: &PageTree, node: NodeId) -> Option<String> {
    if let Some(id) = tree.attribute(node, "id") {
        if !id.is_empty() {
            return Some(format!("#{}", id));
        }
    }

    let tag = tree.tag(node)?;
    let mut query = tag.to_string();
    for class in tree
        .classes(node)
        .iter()
        .filter(|c| !is_internal_class(c))
        .take(QUERY_CLASS_LIMIT)
    {
        query.push('.');
        query.push_str(class);
    }

    let matches = resolve_query(tree, &query);
    if matches.len() > 1 {
        let position = matches.iter().position(|m| *m == node)?;
        query.push_str(&format!(":nth({})", position));
    }
    Some(query)
}

fn salient_attributes(tree: &PageTree, node: NodeId) -> Option<BTreeMap<String, String>> {
    let attributes = tree.attributes(node)?;
    let mut captured = BTreeMap::new();

    for name in SALIENT_ATTRS {
        if is_internal_attribute(name) {
            continue;
        }
        if let Some(value) = attributes.get(*name) {
            if value.is_empty() {
                continue;
            }
            let value = if *name == "class" {
                // Engine-decorative classes would poison overlap scoring
                // on the next load.
                let kept: Vec<&str> = value
                    .split_whitespace()
                    .filter(|c| !is_internal_class(c))
                    .collect();
                if kept.is_empty() {
                    continue;
                }
                kept.join(" ")
            } else {
                value.clone()
            };
            captured.insert(name.to_string(), value);
        }
    }

    if captured.is_empty() {
        None
    } else {
        Some(captured)
    }
}
