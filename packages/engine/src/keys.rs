//! # Content Key Assignment
//!
//! Synthesizes durable keys for otherwise-anonymous nodes:
//! `[zone-]tag-slug-epochmillis-random6`. The zone prefix (navigation /
//! footer / banner) comes from walking ancestors for recognizable
//! structural landmarks; it aids debugging and narrows heuristic
//! matching later, and keeps textually similar but visually distant
//! nodes from colliding.

use pagewright_dom::{NodeId, PageTree, TreeError};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Durable key attribute written onto nodes.
pub const CONTENT_KEY_ATTR: &str = "data-pw-key";

/// Prefix of every engine-internal attribute.
pub const INTERNAL_ATTR_PREFIX: &str = "data-pw-";

/// Prefix of engine-decorative classes.
pub const INTERNAL_CLASS_PREFIX: &str = "pw-";

/// Zone names a key may be prefixed with.
pub const ZONES: &[&str] = &["navigation", "footer", "banner"];

const SLUG_MAX: usize = 20;

/// Return the node's durable key, assigning one if absent. Idempotent:
/// repeat calls on the same node instance return the same key.
pub fn ensure_key(tree: &mut PageTree, node: NodeId) -> Result<String, TreeError> {
    if let Some(existing) = tree.attribute(node, CONTENT_KEY_ATTR) {
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    let tag = tree
        .tag(node)
        .ok_or(TreeError::NotAnElement)?
        .to_string();
    let slug = slug(&tree.direct_text(node), SLUG_MAX);
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = random_suffix(6);

    let mut parts: Vec<String> = Vec::new();
    if let Some(zone) = detect_zone(tree, node) {
        parts.push(zone.to_string());
    }
    parts.push(tag);
    if !slug.is_empty() {
        parts.push(slug);
    }
    parts.push(millis.to_string());
    parts.push(suffix);

    let key = parts.join("-");
    tree.set_attribute(node, CONTENT_KEY_ATTR, &key)?;
    Ok(key)
}

/// Coarse structural zone of a node, from the node itself and its
/// ancestors: `nav`/`role=navigation` → navigation, `footer` → footer,
/// `header` or carousel/banner/hero/slider classes → banner.
pub fn detect_zone(tree: &PageTree, node: NodeId) -> Option<&'static str> {
    let mut chain = vec![node];
    chain.extend(tree.ancestors(node));

    for id in chain {
        match tree.tag(id) {
            Some("nav") => return Some("navigation"),
            Some("footer") => return Some("footer"),
            Some("header") => return Some("banner"),
            _ => {}
        }
        if tree.attribute(id, "role") == Some("navigation") {
            return Some("navigation");
        }
        let banner_hint = tree.classes(id).iter().any(|c| {
            let c = c.to_ascii_lowercase();
            ["carousel", "banner", "hero", "slider", "slide"]
                .iter()
                .any(|hint| c.contains(hint))
        });
        if banner_hint {
            return Some("banner");
        }
    }
    None
}

/// Zone hint embedded in a key's leading segment, if any.
pub fn zone_from_key(key: &str) -> Option<&'static str> {
    let first = key.split('-').next()?;
    ZONES.iter().find(|z| **z == first).copied()
}

/// Lowercase alphanumerics; runs of anything else collapse to single
/// hyphens. Truncated to `max` characters.
pub fn slug(text: &str, max: usize) -> String {
    let mut out = String::new();
    for c in text.chars() {
        if out.len() >= max {
            break;
        }
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// Whether an attribute belongs to the engine, not the page.
pub fn is_internal_attribute(name: &str) -> bool {
    name.starts_with(INTERNAL_ATTR_PREFIX)
}

/// Whether a class is engine-decorative.
pub fn is_internal_class(class: &str) -> bool {
    class.starts_with(INTERNAL_CLASS_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_key_is_idempotent() {
        let mut tree = PageTree::new("body");
        let h1 = tree.create_element("h1");
        let text = tree.create_text("Welcome to the shop");
        tree.append_child(tree.root(), h1).unwrap();
        tree.append_child(h1, text).unwrap();

        let first = ensure_key(&mut tree, h1).unwrap();
        let second = ensure_key(&mut tree, h1).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("h1-welcome-to-the"));
    }

    #[test]
    fn test_distinct_nodes_get_distinct_keys() {
        let mut tree = PageTree::new("body");
        let a = tree.create_element("p");
        let b = tree.create_element("p");
        tree.append_child(tree.root(), a).unwrap();
        tree.append_child(tree.root(), b).unwrap();

        let key_a = ensure_key(&mut tree, a).unwrap();
        let key_b = ensure_key(&mut tree, b).unwrap();
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn test_zone_prefix_from_landmark_ancestor() {
        let mut tree = PageTree::new("body");
        let footer = tree.create_element("footer");
        let link = tree.create_element("a");
        tree.append_child(tree.root(), footer).unwrap();
        tree.append_child(footer, link).unwrap();

        let key = ensure_key(&mut tree, link).unwrap();
        assert!(key.starts_with("footer-a-"));
        assert_eq!(zone_from_key(&key), Some("footer"));
    }

    #[test]
    fn test_banner_zone_from_carousel_class() {
        let mut tree = PageTree::new("body");
        let wrap = tree.create_element("div");
        tree.set_attribute(wrap, "class", "main-carousel").unwrap();
        let img = tree.create_element("img");
        tree.append_child(tree.root(), wrap).unwrap();
        tree.append_child(wrap, img).unwrap();

        assert_eq!(detect_zone(&tree, img), Some("banner"));
    }

    #[test]
    fn test_slug_collapses_and_truncates() {
        assert_eq!(slug("Hello,  World!", 20), "hello-world");
        assert_eq!(slug("Ünïcode — stripped", 20), "n-code-stripped");
        assert_eq!(slug("", 20), "");
        assert!(slug("a very long heading that keeps going", 20).len() <= 20);
    }
}
