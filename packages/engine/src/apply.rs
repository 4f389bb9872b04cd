//! # Record Application
//!
//! Kind-specific tree mutation for an attached record. Every apply is
//! idempotent: replaying the same record produces the same visible
//! state. Dispatch is exhaustive over the payload enum; unknown kinds
//! were already rejected at parse time and cannot reach here.

use crate::errors::EngineError;
use pagewright_content::{EditPayload, EditRecord};
use pagewright_dom::{NodeId, PageTree};

/// Marker distinguishing a standalone image from one nested in a slide
/// composite, so later re-edits route to the right editor surface.
pub const IMAGE_ROLE_ATTR: &str = "data-pw-img";

/// Raw numeric value behind a counter's display text. Updated in the
/// same call as the text so a reader never sees them disagree.
pub const COUNTER_VALUE_ATTR: &str = "data-pw-count";

/// Background presentation pinned alongside the image reference.
const BACKGROUND_PRESENTATION: &[(&str, &str)] = &[
    ("background-size", "cover !important"),
    ("background-position", "center !important"),
    ("background-repeat", "no-repeat !important"),
];

pub fn apply_record(
    tree: &mut PageTree,
    node: NodeId,
    key: &str,
    record: &EditRecord,
) -> Result<(), EngineError> {
    match &record.payload {
        EditPayload::Text { text } => {
            tree.set_direct_text(node, text)?;
        }

        EditPayload::ImageReference { src, alt } => {
            tree.set_attribute(node, "src", src)?;
            if let Some(alt) = alt {
                tree.set_attribute(node, "alt", alt)?;
            }
            let role = if in_slide_context(tree, node) {
                "slide"
            } else {
                "standalone"
            };
            tree.set_attribute(node, IMAGE_ROLE_ATTR, role)?;
        }

        EditPayload::BackgroundReference { background_image } => {
            tree.set_style(
                node,
                "background-image",
                format!("url({}) !important", background_image),
            )?;
            for (name, value) in BACKGROUND_PRESENTATION {
                tree.set_style(node, *name, *value)?;
            }
            force_repaint(tree, node);
        }

        EditPayload::Composite { title, description } => {
            // Sub-fields are located independently; a record carrying
            // only one leaves the other's target untouched.
            if let Some(title) = title {
                match find_title_target(tree, node) {
                    Some(target) => tree.set_direct_text(target, title)?,
                    None => return Err(EngineError::LocatorUnresolvable(key.to_string())),
                }
            }
            if let Some(description) = description {
                match find_description_target(tree, node) {
                    Some(target) => tree.set_direct_text(target, description)?,
                    None => return Err(EngineError::LocatorUnresolvable(key.to_string())),
                }
            }
        }

        EditPayload::Counter { value, suffix } => {
            // Attribute and display text in one call, no observable
            // intermediate state.
            tree.set_attribute(node, COUNTER_VALUE_ATTR, format_number(*value))?;
            tree.set_direct_text(node, format_counter(*value, suffix.as_deref()))?;
        }
    }
    Ok(())
}

/// First heading-like descendant, else one designated by a title class.
fn find_title_target(tree: &PageTree, node: NodeId) -> Option<NodeId> {
    let heading_tags = ["h1", "h2", "h3", "h4", "h5", "h6"];
    tree.descendants(node)
        .into_iter()
        .find(|d| {
            tree.tag(*d)
                .map(|t| heading_tags.contains(&t))
                .unwrap_or(false)
        })
        .or_else(|| {
            tree.descendants(node)
                .into_iter()
                .find(|d| tree.has_class(*d, "title"))
        })
}

/// First paragraph descendant, else one designated by a description
/// class.
fn find_description_target(tree: &PageTree, node: NodeId) -> Option<NodeId> {
    tree.descendants(node)
        .into_iter()
        .find(|d| tree.tag(*d) == Some("p"))
        .or_else(|| {
            tree.descendants(node)
                .into_iter()
                .find(|d| tree.has_class(*d, "description"))
        })
}

fn in_slide_context(tree: &PageTree, node: NodeId) -> bool {
    tree.ancestors(node).into_iter().any(|a| {
        tree.classes(a).iter().any(|c| {
            let c = c.to_ascii_lowercase();
            c.contains("slide") || c.contains("carousel")
        })
    })
}

/// Hide/measure/show cycle: some rendering layers cache background
/// layout and only repaint after a reflow is forced.
fn force_repaint(tree: &mut PageTree, node: NodeId) {
    let previous = tree.style(node, "display").map(|d| d.to_string());
    let _ = tree.set_style(node, "display", "none");
    let _ = tree.subtree_size(node); // reflow read
    match previous {
        Some(display) => {
            let _ = tree.set_style(node, "display", display);
        }
        None => tree.remove_style(node, "display"),
    }
}

pub fn format_counter(value: f64, suffix: Option<&str>) -> String {
    format!("{}{}", format_number(value), suffix.unwrap_or(""))
}

/// Integral values render without a fractional part.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
