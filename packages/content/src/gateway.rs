//! # Persistence Gateway
//!
//! The single I/O boundary of the engine. Dual-write on save: the
//! local cache first (authoritative), then a best-effort remote push.
//! A remote failure degrades to "saved locally, not yet synchronized"
//! instead of failing the operation. Load prefers the remote and falls
//! back to the cache, and never fails the caller over malformed
//! storage.

use crate::map::{ContentMap, Diagnostic};
use crate::store::{LocalCache, RemoteStore};

/// Result of a save. `success` is false only when every storage leg
/// failed; `synchronized` reports whether the remote took the write.
#[derive(Debug)]
pub struct SaveOutcome {
    pub success: bool,
    pub synchronized: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of a load. Always carries a map (possibly empty) plus
/// diagnostics for anything dropped or degraded along the way.
#[derive(Debug)]
pub struct LoadOutcome {
    pub success: bool,
    pub map: ContentMap,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct PersistenceGateway {
    cache: LocalCache,
    remote: Option<Box<dyn RemoteStore>>,
}

impl PersistenceGateway {
    pub fn new(cache: LocalCache) -> Self {
        Self {
            cache,
            remote: None,
        }
    }

    pub fn with_remote(cache: LocalCache, remote: Box<dyn RemoteStore>) -> Self {
        Self {
            cache,
            remote: Some(remote),
        }
    }

    /// Persist a snapshot of the map. Records failing validation are
    /// dropped individually and reported, never fatal. Idempotent:
    /// saving the same map twice writes equivalent state.
    pub fn save(&mut self, identity: &str, map: &ContentMap) -> SaveOutcome {
        let mut diagnostics = Vec::new();

        let mut sanitized = map.clone();
        let mut dropped: Vec<(String, String)> = Vec::new();
        sanitized.retain(|key, record| match record.validate() {
            Ok(()) => true,
            Err(e) => {
                dropped.push((key.clone(), e.to_string()));
                false
            }
        });
        for (key, reason) in dropped {
            diagnostics.push(Diagnostic::for_key(key, format!("record dropped: {}", reason)));
        }

        let payload = sanitized.to_string_pretty();

        let local_ok = match self.cache.write(identity, &payload) {
            Ok(()) => true,
            Err(e) => {
                diagnostics.push(Diagnostic::general(format!("local cache write failed: {}", e)));
                false
            }
        };

        let synchronized = match &mut self.remote {
            Some(remote) => match remote.push(identity, &payload) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(identity, "remote save failed, local copy kept: {}", e);
                    diagnostics.push(Diagnostic::general(format!(
                        "saved locally, not yet synchronized: {}",
                        e
                    )));
                    false
                }
            },
            None => false,
        };

        SaveOutcome {
            success: local_ok || synchronized,
            synchronized,
            diagnostics,
        }
    }

    /// Read the map back: remote first when configured, local cache as
    /// fallback, empty map on a total miss.
    pub fn load(&mut self, identity: &str) -> LoadOutcome {
        let mut diagnostics = Vec::new();

        if let Some(remote) = &mut self.remote {
            match remote.pull(identity) {
                Ok(Some(payload)) => {
                    let (map, mut entry_diagnostics) = ContentMap::parse(&payload);
                    diagnostics.append(&mut entry_diagnostics);
                    // An unparsable remote document falls through to the
                    // cache; per-entry drops do not.
                    if !map.is_empty() || payload_is_object(&payload) {
                        return LoadOutcome {
                            success: true,
                            map,
                            diagnostics,
                        };
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(identity, "remote load failed, trying local cache: {}", e);
                    diagnostics.push(Diagnostic::general(format!("remote load failed: {}", e)));
                }
            }
        }

        match self.cache.read(identity) {
            Ok(Some(payload)) => {
                let (map, mut entry_diagnostics) = ContentMap::parse(&payload);
                diagnostics.append(&mut entry_diagnostics);
                LoadOutcome {
                    success: true,
                    map,
                    diagnostics,
                }
            }
            Ok(None) => LoadOutcome {
                success: true,
                map: ContentMap::new(),
                diagnostics,
            },
            Err(e) => {
                diagnostics.push(Diagnostic::general(format!("local cache read failed: {}", e)));
                LoadOutcome {
                    // Total failure of both legs.
                    success: false,
                    map: ContentMap::new(),
                    diagnostics,
                }
            }
        }
    }
}

fn payload_is_object(payload: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(payload),
        Ok(serde_json::Value::Object(_))
    )
}
