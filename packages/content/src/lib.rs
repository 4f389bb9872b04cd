//! # Pagewright Content
//!
//! The portable edit state of a page: edit records keyed by content
//! key, the content map that holds them, and the persistence gateway
//! that moves the map in and out of storage.
//!
//! ## Core Principles
//!
//! 1. **The map is the unit of persistence**: saves flush the whole
//!    map, last writer wins on the whole map, never per-key merges
//! 2. **Corruption is per-entry**: one malformed record is dropped and
//!    reported; the rest of the map always survives
//! 3. **Storage never fails the caller**: malformed or missing storage
//!    loads as an empty map plus diagnostics
//! 4. **Forward-compatible records**: unknown fields written by
//!    collaborators ride through a save/load round trip untouched

pub mod gateway;
pub mod locator;
pub mod map;
pub mod record;
pub mod store;

pub use gateway::{LoadOutcome, PersistenceGateway, SaveOutcome};
pub use locator::Locator;
pub use map::{ContentMap, Diagnostic};
pub use record::{EditKind, EditPayload, EditRecord, RecordError};
pub use store::{page_identity, InMemoryRemote, LocalCache, RemoteStore, StoreError};
