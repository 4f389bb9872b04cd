//! Error taxonomy of the engine. Failures scoped to one content key
//! never abort processing of the rest of the map; callers collect these
//! per key and keep going.

use pagewright_dom::TreeError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A locator field was present but pointed at nothing; the caller
    /// falls through to the next matching step.
    #[error("Locator unresolvable for key {0}")]
    LocatorUnresolvable(String),

    #[error("Record validation failed for key {key}: {reason}")]
    RecordValidationFailed { key: String, reason: String },

    /// Remote storage is down; the local cache stays authoritative.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// Exhausted every recovery attempt; the entry was pruned.
    #[error("Orphan unrecovered, entry pruned: {0}")]
    OrphanUnrecovered(String),

    /// A newer load superseded this one; its result was discarded.
    /// Expected flow under forced reloads, not a user-facing failure.
    #[error("Load superseded (generation {stale}, current {current})")]
    ConcurrentLoadSuperseded { stale: u64, current: u64 },

    #[error("Session is not in editing state")]
    NotEditing,

    /// Guard on the transition into editable: the node is mid-animation
    /// and will be picked up once the animation settles.
    #[error("Node is mid-animation, editability deferred")]
    MidAnimation,

    #[error(transparent)]
    Tree(#[from] TreeError),
}
