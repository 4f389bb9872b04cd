//! # Edit Session
//!
//! Owns one page's editing lifecycle: the in-memory content map, the
//! `Viewing ↔ Editing` state machine, structural observation with
//! self-suppression and debounce, counter animation gating, and the
//! load/save choreography against the persistence gateway.
//!
//! ## Lifecycle
//!
//! ```text
//! reload → reconcile → apply          (records re-attach to new tree)
//!    ↑                    ↓
//! gateway ← save ← edit_* operations  (user actions, map order)
//! ```
//!
//! The session is constructed once by the host page and passed by
//! reference wherever needed; there is no ambient singleton. A
//! monotonically increasing load generation guards against a stale
//! in-flight load overwriting newer state.

use crate::apply::apply_record;
use crate::errors::EngineError;
use crate::keys::{ensure_key, CONTENT_KEY_ATTR};
use crate::locator::generate_locator;
use crate::reconcile::{MatchPolicy, Reconciler};
use pagewright_content::{
    ContentMap, Diagnostic, EditPayload, EditRecord, LoadOutcome, Locator, PersistenceGateway,
    SaveOutcome,
};
use pagewright_dom::{NodeId, PageTree};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Marker the engine sets on nodes it is about to mutate. The observer
/// consumes it instead of re-entering the pipeline.
pub const ENGINE_CHANGE_ATTR: &str = "data-pw-engine-change";

/// Truthy while the host animates a counter node. Such nodes are gated
/// out of editability and observation until the animation settles.
pub const ANIMATING_ATTR: &str = "data-pw-animating";

/// Marks nodes the session has set up for direct manipulation.
pub const EDITABLE_ATTR: &str = "data-pw-editable";

const DEBOUNCE_WINDOW: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Viewing,
    Editing,
}

/// What a completed reload did to the tree and the map.
#[derive(Debug, Default)]
pub struct ReloadReport {
    /// Records attached and applied.
    pub applied: usize,
    /// Keys pruned after the orphan recovery pass.
    pub pruned: Vec<String>,
    /// True when a total load failure fell back to the last known-good
    /// in-memory map.
    pub used_fallback: bool,
    /// Per-key failures; the rest of the map was still processed.
    pub errors: Vec<EngineError>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct EditSession {
    page_identity: String,
    state: SessionState,
    map: ContentMap,
    /// Fallback when a load totally fails; never user-visible clearing.
    last_good: ContentMap,
    gateway: PersistenceGateway,
    reconciler: Reconciler,
    /// Locator snapshots taken when a node first became editable, so
    /// records carry pre-edit identity signatures.
    captured_locators: HashMap<String, Locator>,
    /// Counter applies waiting for an animation to settle.
    deferred: Vec<(NodeId, String)>,
    /// Nodes the engine mutated this burst. One apply can touch several
    /// descendants, so suppression is scoped to the whole burst rather
    /// than consumed by the first observation.
    engine_changes: HashSet<NodeId>,
    pending_observations: Vec<NodeId>,
    last_observation: Option<Instant>,
    debounce_window: Duration,
    load_generation: u64,
}

impl EditSession {
    pub fn new(page_identity: impl Into<String>, gateway: PersistenceGateway) -> Self {
        Self {
            page_identity: page_identity.into(),
            state: SessionState::Viewing,
            map: ContentMap::new(),
            last_good: ContentMap::new(),
            gateway,
            reconciler: Reconciler::default(),
            captured_locators: HashMap::new(),
            deferred: Vec::new(),
            engine_changes: HashSet::new(),
            pending_observations: Vec::new(),
            last_observation: None,
            debounce_window: DEBOUNCE_WINDOW,
            load_generation: 0,
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.reconciler = Reconciler::new(policy);
        self
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn page_identity(&self) -> &str {
        &self.page_identity
    }

    pub fn map(&self) -> &ContentMap {
        &self.map
    }

    pub fn begin_editing(&mut self) {
        self.state = SessionState::Editing;
        // Applies made while viewing (reloads) were never observable;
        // their suppression must not leak into the editing session.
        self.engine_changes.clear();
    }

    pub fn end_editing(&mut self) {
        self.state = SessionState::Viewing;
        self.pending_observations.clear();
        self.engine_changes.clear();
        self.last_observation = None;
    }

    /// Set a node up for direct manipulation: durable key plus a
    /// locator snapshot of its pre-edit identity. Gated against counter
    /// nodes mid-animation.
    pub fn make_editable(
        &mut self,
        tree: &mut PageTree,
        node: NodeId,
    ) -> Result<String, EngineError> {
        if self.state != SessionState::Editing {
            return Err(EngineError::NotEditing);
        }
        if is_animating(tree, node) {
            return Err(EngineError::MidAnimation);
        }
        let key = ensure_key(tree, node)?;
        self.captured_locators
            .entry(key.clone())
            .or_insert_with(|| generate_locator(tree, node));
        tree.set_attribute(node, EDITABLE_ATTR, "true")?;
        Ok(key)
    }

    pub fn edit_text(
        &mut self,
        tree: &mut PageTree,
        node: NodeId,
        text: impl Into<String>,
    ) -> Result<String, EngineError> {
        self.record_edit(tree, node, EditPayload::Text { text: text.into() })
    }

    pub fn edit_image(
        &mut self,
        tree: &mut PageTree,
        node: NodeId,
        src: impl Into<String>,
        alt: Option<String>,
    ) -> Result<String, EngineError> {
        self.record_edit(
            tree,
            node,
            EditPayload::ImageReference {
                src: src.into(),
                alt,
            },
        )
    }

    pub fn edit_background(
        &mut self,
        tree: &mut PageTree,
        node: NodeId,
        background_image: impl Into<String>,
    ) -> Result<String, EngineError> {
        self.record_edit(
            tree,
            node,
            EditPayload::BackgroundReference {
                background_image: background_image.into(),
            },
        )
    }

    pub fn edit_composite(
        &mut self,
        tree: &mut PageTree,
        node: NodeId,
        title: Option<String>,
        description: Option<String>,
    ) -> Result<String, EngineError> {
        self.record_edit(tree, node, EditPayload::Composite { title, description })
    }

    pub fn edit_counter(
        &mut self,
        tree: &mut PageTree,
        node: NodeId,
        value: f64,
        suffix: Option<String>,
    ) -> Result<String, EngineError> {
        if !value.is_finite() {
            let key = ensure_key(tree, node)?;
            return Err(EngineError::RecordValidationFailed {
                key,
                reason: "counter value is not a finite number".to_string(),
            });
        }
        self.record_edit(tree, node, EditPayload::Counter { value, suffix })
    }

    /// Common path of every edit: key, locator, record into the map in
    /// user-action order, immediate application. A counter edit landing
    /// on an animating node is applied later, not immediately, so an
    /// animation frame never flickers back to a stale value.
    fn record_edit(
        &mut self,
        tree: &mut PageTree,
        node: NodeId,
        payload: EditPayload,
    ) -> Result<String, EngineError> {
        if self.state != SessionState::Editing {
            return Err(EngineError::NotEditing);
        }
        let key = ensure_key(tree, node)?;
        let locator = self.locator_for(tree, node, &key);
        let record = EditRecord::new(payload, Some(locator), now_timestamp());
        let defer =
            matches!(record.payload, EditPayload::Counter { .. }) && is_animating(tree, node);
        self.map.insert(key.clone(), record);

        if defer {
            self.deferred.push((node, key.clone()));
        } else {
            self.engine_apply(tree, node, &key)?;
        }
        Ok(key)
    }

    /// Pre-edit locator for a key: the one already persisted with the
    /// record, else the snapshot taken at make-editable time, else a
    /// fresh one as a last resort.
    fn locator_for(&self, tree: &PageTree, node: NodeId, key: &str) -> Locator {
        if let Some(record) = self.map.get(key) {
            if let Some(locator) = &record.locator {
                return locator.clone();
            }
        }
        if let Some(locator) = self.captured_locators.get(key) {
            return locator.clone();
        }
        generate_locator(tree, node)
    }

    /// Apply with the engine-owned marker set first, so the observer
    /// can tell this mutation from a user's.
    fn engine_apply(
        &mut self,
        tree: &mut PageTree,
        node: NodeId,
        key: &str,
    ) -> Result<(), EngineError> {
        let Some(record) = self.map.get(key) else {
            return Ok(());
        };
        tree.set_attribute(node, ENGINE_CHANGE_ATTR, "true")?;
        self.engine_changes.insert(node);
        apply_record(tree, node, key, record)
    }

    /// Host callback for an observed structural change. Engine-owned
    /// changes are ignored for the whole burst (one apply can mutate
    /// several descendants of the marked node); real ones queue a
    /// debounced re-scan. Returns whether the change was queued.
    pub fn observe(&mut self, tree: &mut PageTree, node: NodeId) -> bool {
        if self.state != SessionState::Editing {
            return false;
        }
        // The engine-touched node may be the mutated node itself or an
        // ancestor (a composite apply rewrites descendants of it).
        let mut chain = vec![node];
        chain.extend(tree.ancestors(node));
        if chain.iter().any(|id| self.engine_changes.contains(id)) {
            return false;
        }
        if is_animating(tree, node) {
            return false;
        }
        self.pending_observations.push(node);
        self.last_observation = Some(Instant::now());
        true
    }

    /// Re-scan once the debounce window has passed. Returns the number
    /// of nodes processed (zero while the window is still open).
    pub fn maybe_flush_observations(&mut self, tree: &mut PageTree) -> usize {
        match self.last_observation {
            Some(at) if at.elapsed() >= self.debounce_window => self.flush_observations(tree),
            _ => 0,
        }
    }

    /// Coalesced re-scan of the observed burst: every changed node that
    /// is still attached and not animating gets its key ensured, so new
    /// structure becomes addressable. Closes the burst: engine-change
    /// suppression ends here and the markers come off.
    pub fn flush_observations(&mut self, tree: &mut PageTree) -> usize {
        for node in self.engine_changes.drain() {
            tree.remove_attribute(node, ENGINE_CHANGE_ATTR);
        }
        let mut pending = std::mem::take(&mut self.pending_observations);
        self.last_observation = None;
        pending.sort();
        pending.dedup();

        let mut processed = 0;
        for node in pending {
            if !tree.is_attached(node) || !tree.is_element(node) || is_animating(tree, node) {
                continue;
            }
            if ensure_key(tree, node).is_ok() {
                processed += 1;
            }
        }
        processed
    }

    /// The host signals a counter animation reached its terminal state:
    /// the node becomes observable again and deferred applies flush.
    pub fn finish_animation(
        &mut self,
        tree: &mut PageTree,
        node: NodeId,
    ) -> Result<(), EngineError> {
        tree.remove_attribute(node, ANIMATING_ATTR);
        let due: Vec<(NodeId, String)> = {
            let mut kept = Vec::new();
            let mut due = Vec::new();
            for entry in self.deferred.drain(..) {
                if entry.0 == node {
                    due.push(entry);
                } else {
                    kept.push(entry);
                }
            }
            self.deferred = kept;
            due
        };
        for (node, key) in due {
            self.engine_apply(tree, node, &key)?;
        }
        Ok(())
    }

    /// Flush a snapshot of the map to the gateway. Mutations made after
    /// this call are not folded into the write.
    pub fn save(&mut self) -> SaveOutcome {
        let snapshot = self.map.clone();
        let outcome = self.gateway.save(&self.page_identity, &snapshot);
        if outcome.success {
            self.last_good = snapshot;
        }
        outcome
    }

    /// Start a (re)load and get its generation ticket. Any previously
    /// issued ticket is superseded from this moment.
    pub fn begin_reload(&mut self) -> u64 {
        self.load_generation += 1;
        self.load_generation
    }

    pub fn fetch(&mut self) -> LoadOutcome {
        self.gateway.load(&self.page_identity)
    }

    /// Load, reconcile, apply, prune. Convenience wrapper over
    /// `begin_reload` / `fetch` / `complete_reload`.
    pub fn reload(&mut self, tree: &mut PageTree) -> Result<ReloadReport, EngineError> {
        let ticket = self.begin_reload();
        let outcome = self.fetch();
        self.complete_reload(tree, ticket, outcome)
    }

    /// Fold a finished load into the session. A stale ticket means a
    /// newer reload superseded this one; its result is discarded, which
    /// is expected flow rather than a user-facing failure.
    pub fn complete_reload(
        &mut self,
        tree: &mut PageTree,
        ticket: u64,
        outcome: LoadOutcome,
    ) -> Result<ReloadReport, EngineError> {
        if ticket != self.load_generation {
            return Err(EngineError::ConcurrentLoadSuperseded {
                stale: ticket,
                current: self.load_generation,
            });
        }

        let mut report = ReloadReport {
            diagnostics: outcome.diagnostics,
            ..ReloadReport::default()
        };

        if !outcome.success {
            // Total storage failure: the last known-good map stays
            // authoritative instead of clearing user-visible content.
            self.map = self.last_good.clone();
            report.used_fallback = true;
            report
                .errors
                .push(EngineError::PersistenceUnavailable(format!(
                    "load failed for page {}",
                    self.page_identity
                )));
            return Ok(report);
        }

        self.map = outcome.map;
        let reconciled = self.reconciler.reconcile(tree, &self.map);

        for (key, node) in &reconciled.attachments {
            // Re-stamp the durable key: heuristic attachments landed on
            // nodes that lost it in the fresh render.
            if tree.attribute(*node, CONTENT_KEY_ATTR).is_none() {
                let _ = tree.set_attribute(*node, CONTENT_KEY_ATTR, key.clone());
            }
            let is_counter = matches!(
                self.map.get(key).map(|r| &r.payload),
                Some(EditPayload::Counter { .. })
            );
            if is_counter && is_animating(tree, *node) {
                self.deferred.push((*node, key.clone()));
                continue;
            }
            match self.engine_apply(tree, *node, key) {
                Ok(()) => report.applied += 1,
                Err(e) => report.errors.push(e),
            }
        }

        for key in reconciled.orphans {
            tracing::warn!(key = key.as_str(), "pruning unrecoverable orphan");
            self.map.remove(&key);
            report.errors.push(EngineError::OrphanUnrecovered(key.clone()));
            report.pruned.push(key);
        }

        self.last_good = self.map.clone();
        Ok(report)
    }
}

fn is_animating(tree: &PageTree, node: NodeId) -> bool {
    matches!(tree.attribute(node, ANIMATING_ATTR), Some("true") | Some("1"))
}

fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
