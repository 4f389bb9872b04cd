//! # Structural Queries
//!
//! Two ways to re-find a node without a durable identifier:
//!
//! - **Positional path**: a chain of [`PathStep`]s from the root, each
//!   step a tag plus a same-tag sibling index (present only when
//!   same-tag siblings exist, so paths stay as loose as possible).
//! - **Shorthand query**: a selector-like string, `#id` or
//!   `tag.class1.class2` with an optional `:nth(i)` disambiguator.
//!
//! Both are hints, not guarantees: resolution returns nothing rather
//! than guessing, and ambiguous results are reported as-is so the
//! caller can decide to fall through to weaker matching.

use crate::tree::{NodeId, PageTree};
use serde::{Deserialize, Serialize};

/// One level of a positional path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub tag: String,
    /// Index among same-tag siblings. Absent when the tag is unique at
    /// this level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// Positional path from the root down to `node`. The root itself is not
/// represented; a path for the root is empty. Returns `None` for
/// detached or text nodes.
pub fn path_from_root(tree: &PageTree, node: NodeId) -> Option<Vec<PathStep>> {
    if !tree.is_element(node) || !tree.is_attached(node) {
        return None;
    }
    let mut steps = Vec::new();
    let mut current = node;
    while current != tree.root() {
        let tag = tree.tag(current)?.to_string();
        let index = tree.same_tag_index(current).map(|i| i as u32);
        steps.push(PathStep { tag, index });
        current = tree.parent(current)?;
    }
    steps.reverse();
    Some(steps)
}

/// Walk a positional path from the root. A step with no index must be
/// unique at its level; a step with an index must land on an existing
/// same-tag child. Anything else resolves to `None`.
pub fn resolve_path(tree: &PageTree, path: &[PathStep]) -> Option<NodeId> {
    let mut current = tree.root();
    for step in path {
        let same_tag: Vec<NodeId> = tree
            .children(current)
            .iter()
            .copied()
            .filter(|c| tree.tag(*c) == Some(step.tag.as_str()))
            .collect();
        current = match step.index {
            Some(i) => *same_tag.get(i as usize)?,
            None => {
                if same_tag.len() == 1 {
                    same_tag[0]
                } else {
                    // Zero or ambiguous: the tree drifted under this step.
                    return None;
                }
            }
        };
    }
    Some(current)
}

/// All attached elements matching a shorthand query. Supported forms:
/// `#id`, `tag`, `tag.class1.class2`, `.class`, each optionally
/// followed by `:nth(i)` which picks the i-th match (0-based).
pub fn resolve_query(tree: &PageTree, query: &str) -> Vec<NodeId> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let (selector, nth) = split_nth(query);

    let matches: Vec<NodeId> = if let Some(id) = selector.strip_prefix('#') {
        tree.elements()
            .into_iter()
            .filter(|n| tree.attribute(*n, "id") == Some(id))
            .collect()
    } else {
        let mut parts = selector.split('.');
        let tag = parts.next().unwrap_or("").to_string();
        let classes: Vec<&str> = parts.filter(|c| !c.is_empty()).collect();
        tree.elements()
            .into_iter()
            .filter(|n| tag.is_empty() || tree.tag(*n) == Some(tag.as_str()))
            .filter(|n| classes.iter().all(|c| tree.has_class(*n, c)))
            .collect()
    };

    match nth {
        Some(i) => matches.get(i).map(|n| vec![*n]).unwrap_or_default(),
        None => matches,
    }
}

fn split_nth(query: &str) -> (&str, Option<usize>) {
    if let Some(open) = query.find(":nth(") {
        let rest = &query[open + 5..];
        if let Some(close) = rest.find(')') {
            if let Ok(i) = rest[..close].parse::<usize>() {
                return (&query[..open], Some(i));
            }
        }
    }
    (query, None)
}

/// All attached elements with the given tag.
pub fn nodes_by_tag(tree: &PageTree, tag: &str) -> Vec<NodeId> {
    tree.elements()
        .into_iter()
        .filter(|n| tree.tag(*n) == Some(tag))
        .collect()
}

/// All attached elements whose attribute `name` equals `value`.
pub fn nodes_with_attribute(tree: &PageTree, name: &str, value: &str) -> Vec<NodeId> {
    tree.elements()
        .into_iter()
        .filter(|n| tree.attribute(*n, name) == Some(value))
        .collect()
}
