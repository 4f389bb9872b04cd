//! # Reconciliation
//!
//! Re-attaches persisted edit records to nodes in a freshly rendered
//! tree. The matching ladder, each step tried only when the previous
//! one produced zero or ambiguous results:
//!
//! 1. exact durable-key attribute lookup
//! 2. positional path from the locator (unique resolution only)
//! 3. shorthand structural query (unique resolution only)
//! 4. heuristic similarity over same-tag candidates, strict tier then
//!    loose tier, optionally narrowed by the key's zone hint
//! 5. for image/background records, transplant onto a sufficiently
//!    large node that already exposes some background reference
//!
//! Ambiguity at steps 2-3 falls through rather than auto-picking. The
//! first candidate satisfying the active tier wins; no further scoring
//! is attempted, since a wrong-but-plausible match is a visually
//! inspectable error rather than data loss. Exhausting the ladder
//! yields an orphan, which gets one loosened recovery pass before the
//! caller prunes it.

use crate::keys::{detect_zone, zone_from_key, CONTENT_KEY_ATTR};
use pagewright_content::{ContentMap, EditKind, EditRecord, Locator};
use pagewright_dom::{nodes_by_tag, nodes_with_attribute, resolve_path, resolve_query, NodeId, PageTree};
use std::collections::HashSet;

/// All heuristic thresholds in one place. The source system scattered
/// slightly different ratios across image, background, and generic
/// matching; they are consolidated here as tunable constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    /// Class overlap required in the strict tier (direct text must also
    /// match exactly).
    pub strict_class_overlap: f32,
    /// Class overlap required in the loose tier (direct text skipped).
    pub loose_class_overlap: f32,
    /// Class overlap required for the background-transplant pass.
    pub transplant_class_overlap: f32,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            strict_class_overlap: 0.8,
            loose_class_overlap: 0.5,
            transplant_class_overlap: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Strict,
    Loose,
}

/// Result of attaching one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Node(NodeId),
    Orphan,
}

/// Result of reconciling a whole map against a tree.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub attachments: Vec<(String, NodeId)>,
    /// Keys that stayed unattached after the recovery pass.
    pub orphans: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Reconciler {
    policy: MatchPolicy,
}

impl Reconciler {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Run the matching ladder for a single record.
    pub fn attach(&self, tree: &PageTree, key: &str, record: &EditRecord) -> Attachment {
        self.attach_excluding(tree, key, record, &HashSet::new())
    }

    fn attach_excluding(
        &self,
        tree: &PageTree,
        key: &str,
        record: &EditRecord,
        claimed: &HashSet<NodeId>,
    ) -> Attachment {
        // Step 1: the durable key survived the render.
        if let Some(node) = nodes_with_attribute(tree, CONTENT_KEY_ATTR, key).first() {
            return Attachment::Node(*node);
        }

        let Some(locator) = &record.locator else {
            tracing::debug!(key, "no locator snapshot, skipping to orphan");
            return Attachment::Orphan;
        };

        // Step 2: positional path, unique resolution only. A resolved
        // node whose direct text contradicts the snapshot is a reordered
        // sibling, not a match.
        if let Some(path) = &locator.path {
            match resolve_path(tree, path) {
                Some(node)
                    if !claimed.contains(&node)
                        && tag_matches(tree, node, locator)
                        && text_compatible(tree, node, locator) =>
                {
                    return Attachment::Node(node);
                }
                _ => tracing::debug!(key, "path unresolved or contradicted, falling through"),
            }
        }

        // Step 3: shorthand query, unique resolution only.
        if let Some(query) = &locator.query {
            let matches = resolve_query(tree, query);
            if matches.len() == 1
                && !claimed.contains(&matches[0])
                && text_compatible(tree, matches[0], locator)
            {
                return Attachment::Node(matches[0]);
            }
            tracing::debug!(key, found = matches.len(), "query not unique, falling through");
        }

        // Step 4: heuristic similarity, strict tier then loose.
        for tier in [Tier::Strict, Tier::Loose] {
            if let Some(node) = self.heuristic_match(tree, key, locator, tier, false, claimed) {
                return Attachment::Node(node);
            }
        }

        // Step 5: background transplant for image-bearing records.
        if matches!(
            record.kind(),
            EditKind::ImageReference | EditKind::BackgroundReference
        ) {
            if let Some(node) = self.transplant_match(tree, locator, claimed) {
                return Attachment::Node(node);
            }
        }

        Attachment::Orphan
    }

    fn heuristic_match(
        &self,
        tree: &PageTree,
        key: &str,
        locator: &Locator,
        tier: Tier,
        ignore_disambiguators: bool,
        claimed: &HashSet<NodeId>,
    ) -> Option<NodeId> {
        let tag = locator.tag.as_deref()?;
        let mut candidates = nodes_by_tag(tree, tag);

        // Narrow by the key's zone hint; an over-aggressive narrowing
        // that empties the pool is undone rather than forcing an orphan.
        if let Some(zone) = zone_from_key(key) {
            let narrowed: Vec<NodeId> = candidates
                .iter()
                .copied()
                .filter(|c| detect_zone(tree, *c) == Some(zone))
                .collect();
            if !narrowed.is_empty() {
                candidates = narrowed;
            }
        }

        candidates
            .into_iter()
            .filter(|c| !claimed.contains(c))
            .find(|c| self.similar(tree, *c, locator, tier, ignore_disambiguators))
    }

    fn similar(
        &self,
        tree: &PageTree,
        candidate: NodeId,
        locator: &Locator,
        tier: Tier,
        ignore_disambiguators: bool,
    ) -> bool {
        // Tag equality is a precondition of candidate selection.
        let threshold = match tier {
            Tier::Strict => {
                if let Some(text) = &locator.direct_text {
                    if tree.direct_text(candidate) != *text {
                        return false;
                    }
                }
                self.policy.strict_class_overlap
            }
            Tier::Loose => {
                // With text skipped, classes are the only signal left; a
                // locator that captured none matches nothing loosely.
                if locator.classes().is_empty() {
                    return false;
                }
                self.policy.loose_class_overlap
            }
        };
        if class_overlap(tree, candidate, locator) < threshold {
            return false;
        }

        if !ignore_disambiguators {
            for (name, value) in locator.disambiguating_attributes() {
                if tree.attribute(candidate, name) != Some(value) {
                    return false;
                }
            }
        }
        true
    }

    /// Last resort for image/background records: any sufficiently large
    /// node already carrying some background reference, when class
    /// overlap clears the transplant threshold. Locators without class
    /// signal never transplant.
    fn transplant_match(
        &self,
        tree: &PageTree,
        locator: &Locator,
        claimed: &HashSet<NodeId>,
    ) -> Option<NodeId> {
        if locator.classes().is_empty() {
            return None;
        }
        tree.elements()
            .into_iter()
            .filter(|c| !claimed.contains(c))
            .filter(|c| tree.style(*c, "background-image").is_some())
            .filter(|c| is_sufficiently_large(tree, *c))
            .find(|c| class_overlap(tree, *c, locator) >= self.policy.transplant_class_overlap)
    }

    /// Reconcile every record in the map: first the full ladder per
    /// key, then one loosened recovery pass over the orphans against
    /// nodes no other record claimed.
    pub fn reconcile(&self, tree: &PageTree, map: &ContentMap) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let mut claimed: HashSet<NodeId> = HashSet::new();
        let mut held: Vec<&String> = Vec::new();

        for (key, record) in map.iter() {
            match self.attach_excluding(tree, key, record, &claimed) {
                Attachment::Node(node) => {
                    claimed.insert(node);
                    outcome.attachments.push((key.clone(), node));
                }
                Attachment::Orphan => held.push(key),
            }
        }

        for key in held {
            let record = map.get(key).expect("key taken from this map");
            let recovered = record.locator.as_ref().and_then(|locator| {
                self.heuristic_match(tree, key, locator, Tier::Loose, true, &claimed)
            });
            match recovered {
                Some(node) => {
                    tracing::debug!(key = key.as_str(), "orphan recovered on late pass");
                    claimed.insert(node);
                    outcome.attachments.push((key.clone(), node));
                }
                None => outcome.orphans.push(key.clone()),
            }
        }

        outcome
    }
}

fn tag_matches(tree: &PageTree, node: NodeId, locator: &Locator) -> bool {
    match &locator.tag {
        Some(tag) => tree.tag(node) == Some(tag.as_str()),
        None => true,
    }
}

fn text_compatible(tree: &PageTree, node: NodeId, locator: &Locator) -> bool {
    match &locator.direct_text {
        Some(text) => tree.direct_text(node) == *text,
        None => true,
    }
}

/// Fraction of the locator's captured classes present on the candidate.
/// A locator that captured no classes constrains nothing.
fn class_overlap(tree: &PageTree, candidate: NodeId, locator: &Locator) -> f32 {
    let wanted = locator.classes();
    if wanted.is_empty() {
        return 1.0;
    }
    let have = tree.classes(candidate);
    let present = wanted.iter().filter(|w| have.contains(w)).count();
    present as f32 / wanted.len() as f32
}

/// Stand-in for visual size: a subtree of some substance or an explicit
/// width/height style.
fn is_sufficiently_large(tree: &PageTree, node: NodeId) -> bool {
    tree.subtree_size(node) >= 3
        || tree.style(node, "width").is_some()
        || tree.style(node, "height").is_some()
}
