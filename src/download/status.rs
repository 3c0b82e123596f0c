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


//! Status records and the registry the status board reads
//!
//! A request has at most one record: a [`QueuedStatus`] while it waits for
//! admission, replaced by an [`ActiveDownloadStatus`] once it starts. The
//! status-reporting side removes records when it is done with them; the
//! coordinator never does, except when a queued wait times out.

use super::progress::{DownloadProgress, DownloadState};
use super::registry::lock;
use super::session::DownloadSession;
use super::RequestId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Transfer direction tag shown on the status board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "dl")]
    Download,
    #[serde(rename = "up")]
    Upload,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Download => "dl",
            Direction::Upload => "up",
        }
    }
}

/// Random hex correlation token, two characters per byte
pub fn generate_gid(bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    let raw: Vec<u8> = (0..bytes).map(|_| rng.gen::<u8>()).collect();
    hex::encode(raw)
}

/// Record of a running download
#[derive(Debug, Clone)]
pub struct ActiveDownloadStatus {
    session: Arc<DownloadSession>,
    size: u64,
    gid: String,
    direction: Direction,
}

impl ActiveDownloadStatus {
    pub fn new(session: Arc<DownloadSession>, size: u64, gid: String, direction: Direction) -> Self {
        Self {
            session,
            size,
            gid,
            direction,
        }
    }

    pub fn session(&self) -> &Arc<DownloadSession> {
        &self.session
    }

    pub fn processed_bytes(&self) -> u64 {
        self.session.processed_bytes()
    }

    pub fn speed(&self) -> f64 {
        self.session.speed()
    }

    /// Forward a cancellation command to the session
    pub fn cancel(&self) {
        self.session.cancel_download();
    }
}

/// Record of a request waiting for admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedStatus {
    name: String,
    size: u64,
    gid: String,
    request_id: RequestId,
    direction: Direction,
}

impl QueuedStatus {
    pub fn new(name: String, size: u64, gid: String, request_id: RequestId, direction: Direction) -> Self {
        Self {
            name,
            size,
            gid,
            request_id,
            direction,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}

#[derive(Debug, Clone)]
pub enum StatusRecord {
    Active(ActiveDownloadStatus),
    Queued(QueuedStatus),
}

impl StatusRecord {
    pub fn gid(&self) -> &str {
        match self {
            StatusRecord::Active(a) => &a.gid,
            StatusRecord::Queued(q) => &q.gid,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StatusRecord::Active(a) => a.session.name(),
            StatusRecord::Queued(q) => &q.name,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            StatusRecord::Active(a) => a.size,
            StatusRecord::Queued(q) => q.size,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            StatusRecord::Active(a) => a.direction,
            StatusRecord::Queued(q) => q.direction,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, StatusRecord::Queued(_))
    }

    pub fn as_active(&self) -> Option<&ActiveDownloadStatus> {
        match self {
            StatusRecord::Active(a) => Some(a),
            StatusRecord::Queued(_) => None,
        }
    }

    /// Snapshot for rendering
    pub fn progress(&self) -> DownloadProgress {
        match self {
            StatusRecord::Active(a) => DownloadProgress::new(
                a.gid.clone(),
                a.session.name().to_string(),
                a.size,
                DownloadState::from(a.session.state()),
                a.direction,
            )
            .with_transfer(a.processed_bytes(), a.speed()),
            StatusRecord::Queued(q) => DownloadProgress::new(
                q.gid.clone(),
                q.name.clone(),
                q.size,
                DownloadState::Queued,
                q.direction,
            ),
        }
    }
}

/// Synchronized map from request id to status record
#[derive(Debug, Default)]
pub struct StatusRegistry {
    records: Mutex<HashMap<RequestId, StatusRecord>>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the previous record
    pub fn set(&self, request_id: RequestId, record: StatusRecord) -> Option<StatusRecord> {
        lock(&self.records).insert(request_id, record)
    }

    pub fn get(&self, request_id: RequestId) -> Option<StatusRecord> {
        lock(&self.records).get(&request_id).cloned()
    }

    pub fn remove(&self, request_id: RequestId) -> Option<StatusRecord> {
        lock(&self.records).remove(&request_id)
    }

    /// Remove only if the record is still queued
    pub fn remove_queued(&self, request_id: RequestId) -> Option<QueuedStatus> {
        let mut records = lock(&self.records);
        match records.get(&request_id) {
            Some(StatusRecord::Queued(_)) => match records.remove(&request_id) {
                Some(StatusRecord::Queued(q)) => Some(q),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn contains(&self, request_id: RequestId) -> bool {
        lock(&self.records).contains_key(&request_id)
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    /// Progress of every record, ordered by request id
    pub fn snapshot(&self) -> Vec<(RequestId, DownloadProgress)> {
        // Clone out first so rendering happens without the guard
        let records: Vec<(RequestId, StatusRecord)> = lock(&self.records)
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect();

        let mut snapshot: Vec<_> = records
            .into_iter()
            .map(|(id, record)| (id, record.progress()))
            .collect();
        snapshot.sort_by_key(|(id, _)| *id);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(request_id: RequestId) -> StatusRecord {
        StatusRecord::Queued(QueuedStatus::new(
            "movie.mkv".to_string(),
            4096,
            "uniq1".to_string(),
            request_id,
            Direction::Download,
        ))
    }

    #[test]
    fn test_generate_gid() {
        let gid = generate_gid(4);
        assert_eq!(gid.len(), 8);
        assert!(gid.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(generate_gid(6).len(), 12);
    }

    #[test]
    fn test_one_record_per_request() {
        let registry = StatusRegistry::new();
        assert!(registry.set(1, queued(1)).is_none());
        assert!(registry.set(1, queued(1)).is_some());
        assert_eq!(registry.len(), 1);

        let record = registry.get(1).unwrap();
        assert!(record.is_queued());
        assert_eq!(record.name(), "movie.mkv");
        assert_eq!(record.gid(), "uniq1");
        assert_eq!(record.direction().as_str(), "dl");
    }

    #[test]
    fn test_remove_queued_only_touches_queued() {
        let registry = StatusRegistry::new();
        registry.set(3, queued(3));

        let removed = registry.remove_queued(3).unwrap();
        assert_eq!(removed.request_id(), 3);
        assert!(registry.is_empty());
        assert!(registry.remove_queued(3).is_none());
    }

    #[test]
    fn test_snapshot_renders_queued() {
        let registry = StatusRegistry::new();
        registry.set(9, queued(9));
        registry.set(2, queued(2));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].0, 2);
        assert_eq!(snapshot[1].1.state, DownloadState::Queued);
        assert_eq!(snapshot[1].1.total_bytes, 4096);
    }
}
