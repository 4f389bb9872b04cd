//! # Pagewright Engine
//!
//! Content addressing and reconciliation for live-edited pages.
//!
//! The host page is regenerated from scratch on every visit, so no
//! server-assigned node identifiers survive a reload. This engine gives
//! otherwise-anonymous nodes durable content keys, records edits
//! against those keys, and re-attaches each record to the right node in
//! the freshly rendered tree, falling down a ladder of weaker matching
//! strategies when the key itself is gone.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ keys + locator: durable key & re-find hints │
//! └─────────────────────────────────────────────┘
//!                     ↓ edits
//! ┌─────────────────────────────────────────────┐
//! │ content map → persistence gateway (I/O)     │
//! └─────────────────────────────────────────────┘
//!                     ↓ next load
//! ┌─────────────────────────────────────────────┐
//! │ reconcile: key → path → query → heuristics  │
//! │ apply: kind-specific tree mutation          │
//! │ session: state machine, debounce, orphans   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Keys are durable, locators are hints**: a key never changes for
//!    a node instance; a locator may fail and that is normal
//! 2. **Per-key failure isolation**: one unattachable or corrupt record
//!    never aborts the rest of the map
//! 3. **First plausible match wins**: a wrong-but-plausible attachment
//!    is a visually inspectable error, not data loss, so no scoring
//!    refinement beyond the ladder's tiers
//! 4. **Engine changes are self-suppressing**: the engine marks its own
//!    mutations and ignores them when observing the tree

pub mod apply;
pub mod errors;
pub mod keys;
pub mod locator;
pub mod reconcile;
pub mod session;

pub use apply::apply_record;
pub use errors::EngineError;
pub use keys::{detect_zone, ensure_key, CONTENT_KEY_ATTR};
pub use locator::generate_locator;
pub use reconcile::{Attachment, MatchPolicy, ReconcileOutcome, Reconciler};
pub use session::{EditSession, ReloadReport, SessionState};

// Re-export the types hosts wire the engine up with.
pub use pagewright_content::{
    ContentMap, EditPayload, EditRecord, LoadOutcome, Locator, PersistenceGateway, SaveOutcome,
};
pub use pagewright_dom::{NodeId, PageTree};
