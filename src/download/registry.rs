// MirrorCore - Telegram media download coordination
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Process-wide download registries
//!
//! Three structures are shared between concurrently running requests:
//!
//! - [`InFlightRegistry`]: media identifiers currently being downloaded
//! - [`StatusRegistry`]: status records keyed by request id
//! - [`NonQueuedSet`]: request ids counted against the concurrency limit
//!
//! Each one owns a single `std::sync::Mutex`. Guards are taken and dropped
//! inside one synchronous method call, so no guard can live across an
//! `.await`, and no method touches two registries at once.

use super::status::StatusRegistry;
use super::RequestId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Lock a registry mutex, recovering the data if a holder panicked.
///
/// Critical sections only insert/remove/clone, so a poisoned set is still
/// consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Set of media identifiers held by live sessions
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    ids: Mutex<HashSet<String>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-insert in one critical section.
    ///
    /// Returns `None` when the identifier is already held (duplicate
    /// download). The returned guard releases the identifier exactly once,
    /// either through [`Reservation::release`] or on drop.
    pub fn try_reserve(self: &Arc<Self>, media_id: &str) -> Option<Reservation> {
        let inserted = lock(&self.ids).insert(media_id.to_string());
        if !inserted {
            debug!(media_id, "Media identifier already in flight");
            return None;
        }
        Some(Reservation {
            registry: Arc::clone(self),
            media_id: Some(media_id.to_string()),
        })
    }

    /// Remove an identifier. Absent identifiers are ignored.
    ///
    /// Returns whether the identifier was present.
    pub fn release(&self, media_id: &str) -> bool {
        lock(&self.ids).remove(media_id)
    }

    pub fn contains(&self, media_id: &str) -> bool {
        lock(&self.ids).contains(media_id)
    }

    pub fn len(&self) -> usize {
        lock(&self.ids).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.ids).is_empty()
    }
}

/// Ownership of one in-flight media identifier
#[derive(Debug)]
pub struct Reservation {
    registry: Arc<InFlightRegistry>,
    media_id: Option<String>,
}

impl Reservation {
    pub fn media_id(&self) -> &str {
        self.media_id.as_deref().unwrap_or_default()
    }

    /// Give the identifier back. Consumes the guard, so it runs once.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(id) = self.media_id.take() {
            self.registry.release(&id);
            debug!(media_id = %id, "Released media identifier");
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Request ids that hold a concurrency slot
#[derive(Debug, Default)]
pub struct NonQueuedSet {
    ids: Mutex<HashSet<RequestId>>,
}

impl NonQueuedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the id was already counted
    pub fn insert(&self, request_id: RequestId) -> bool {
        lock(&self.ids).insert(request_id)
    }

    pub fn remove(&self, request_id: RequestId) -> bool {
        lock(&self.ids).remove(&request_id)
    }

    pub fn contains(&self, request_id: RequestId) -> bool {
        lock(&self.ids).contains(&request_id)
    }

    pub fn len(&self) -> usize {
        lock(&self.ids).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.ids).is_empty()
    }
}

/// Handles to the three shared registries
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub in_flight: Arc<InFlightRegistry>,
    pub status: Arc<StatusRegistry>,
    pub non_queued: Arc<NonQueuedSet>,
}

lazy_static::lazy_static! {
    // Created on first use, lives until process exit
    static ref GLOBAL_REGISTRIES: Registries = Registries::new();
}

impl Registries {
    /// Fresh, unshared registries
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registries
    pub fn global() -> Self {
        GLOBAL_REGISTRIES.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_is_exclusive() {
        let registry = Arc::new(InFlightRegistry::new());

        let first = registry.try_reserve("abc123");
        assert!(first.is_some());
        assert!(registry.try_reserve("abc123").is_none());
        assert!(registry.contains("abc123"));

        // Different identifiers don't interfere
        let other = registry.try_reserve("def456");
        assert!(other.is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reservation_releases_once() {
        let registry = Arc::new(InFlightRegistry::new());
        let reservation = registry.try_reserve("abc123").unwrap();
        assert_eq!(reservation.media_id(), "abc123");

        reservation.release();
        assert!(!registry.contains("abc123"));

        // Someone else may take it now; a stale release must not evict them
        let _next = registry.try_reserve("abc123").unwrap();
        assert!(registry.contains("abc123"));
    }

    #[test]
    fn test_drop_releases() {
        let registry = Arc::new(InFlightRegistry::new());
        {
            let _reservation = registry.try_reserve("abc123").unwrap();
            assert!(registry.contains("abc123"));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_double_release_is_absorbed() {
        let registry = Arc::new(InFlightRegistry::new());
        let _ = registry.try_reserve("abc123").map(std::mem::forget);

        assert!(registry.release("abc123"));
        assert!(!registry.release("abc123"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_reserve_single_winner() {
        let registry = Arc::new(InFlightRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.try_reserve("same").map(std::mem::forget).is_some())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_non_queued_set() {
        let set = NonQueuedSet::new();
        assert!(set.insert(7));
        assert!(!set.insert(7));
        assert!(set.contains(7));
        assert!(set.remove(7));
        assert!(set.is_empty());
    }

    #[test]
    fn test_global_is_shared() {
        let a = Registries::global();
        let b = Registries::global();
        assert!(Arc::ptr_eq(&a.in_flight, &b.in_flight));
        assert!(Arc::ptr_eq(&a.status, &b.status));
        assert!(!Arc::ptr_eq(&a.non_queued, &Registries::new().non_queued));
    }
}
