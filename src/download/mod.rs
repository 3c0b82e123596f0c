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


//! Download coordination
//!
//! Single-flight downloads of Telegram media: one session per media
//! identifier, optional queueing behind an admission controller, progress
//! and cancellation, and a status record per request for the status board.

pub mod coordinator;
pub mod hooks;
pub mod progress;
pub mod registry;
pub mod session;
pub mod status;

/// Identity of one download request
pub type RequestId = u64;

// Re-export commonly used types
pub use coordinator::{DownloadCoordinator, DownloadOutcome, SessionMode};
pub use hooks::{
    Admission, AdmissionControl, AdmissionSignal, Button, Collaborators, DownloadListener,
    DuplicateChecker, DuplicateNotice, ElevatedClient, LimitChecker, MessageSource, Notifier,
    WaitHandle,
};
pub use progress::{DownloadProgress, DownloadState};
pub use registry::{InFlightRegistry, NonQueuedSet, Registries, Reservation};
pub use session::{DownloadSession, SessionState};
pub use status::{ActiveDownloadStatus, Direction, QueuedStatus, StatusRecord, StatusRegistry};
