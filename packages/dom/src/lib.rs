//! # Pagewright DOM
//!
//! Arena-backed model of the host page's rendered tree.
//!
//! The editing engine never owns the real page; the rendering layer
//! rebuilds it from scratch on every visit. This crate is the engine's
//! working copy of that tree: element and text nodes addressed by
//! [`NodeId`], with the attribute/style/text accessors the engine needs
//! to annotate and mutate content in place.
//!
//! ```text
//! PageTree (arena)
//!   ├── Element { tag, attributes, styles }
//!   │     └── children: Vec<NodeId>
//!   └── Text { content }
//! ```
//!
//! Nodes can disappear (detach) and reappear as new ids across loads;
//! every read path tolerates stale ids by returning `None` rather than
//! panicking.

pub mod query;
pub mod tree;

pub use query::{
    nodes_by_tag, nodes_with_attribute, path_from_root, resolve_path, resolve_query, PathStep,
};
pub use tree::{NodeData, NodeId, PageTree, TreeError};
