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


//! One download's lifecycle
//!
//! ```text
//! Created -> Starting -> Active -> Completed
//!                              \-> Failed
//!                              \-> Cancelled
//! ```
//!
//! The terminal states are entered at most once. Entering one gives the
//! media identifier back to the in-flight registry and fires the matching
//! listener hook.

use super::hooks::DownloadListener;
use super::registry::{lock, Reservation};
use super::RequestId;
use crate::error::MirrorError;
use crate::transport::{AbortSignal, ProgressCallback};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Floor for elapsed time in speed calculations
const MIN_ELAPSED: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Starting,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// State of one running (or cancelled-pending) download
pub struct DownloadSession {
    name: String,
    media_id: String,
    request_id: RequestId,
    start_time: Instant,
    processed_bytes: AtomicU64,
    cancelled: AtomicBool,
    state: Mutex<SessionState>,
    abort: AbortSignal,
    reservation: Mutex<Option<Reservation>>,
    listener: Weak<dyn DownloadListener>,
}

impl DownloadSession {
    /// Take ownership of a reservation. The listener is held weakly; the
    /// requester keeps it alive.
    pub fn new(name: String, reservation: Reservation, listener: &Arc<dyn DownloadListener>) -> Self {
        Self {
            name,
            media_id: reservation.media_id().to_string(),
            request_id: listener.request_id(),
            start_time: Instant::now(),
            processed_bytes: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            state: Mutex::new(SessionState::Created),
            abort: AbortSignal::new(),
            reservation: Mutex::new(Some(reservation)),
            listener: Arc::downgrade(listener),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_id(&self) -> &str {
        &self.media_id
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn processed_bytes(&self) -> u64 {
        self.processed_bytes.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average bytes per second since the session was created
    pub fn speed(&self) -> f64 {
        let elapsed = self.elapsed().max(MIN_ELAPSED).as_secs_f64();
        self.processed_bytes() as f64 / elapsed
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Flag the session as cancelled.
    ///
    /// The transfer notices on its next progress callback, or right after
    /// the transport returns, and routes to the error transition.
    pub fn cancel_download(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            file = %self.name,
            media_id = %self.media_id,
            "Cancelling download via user"
        );
    }

    /// Progress hook for the transport.
    ///
    /// Bytes are recorded even on the call that requests the abort.
    pub fn on_progress(&self, current: u64) {
        if self.is_cancelled() {
            self.abort.abort();
        }
        self.processed_bytes.fetch_max(current, Ordering::SeqCst);
    }

    pub fn progress_callback(self: &Arc<Self>) -> ProgressCallback {
        let session = Arc::clone(self);
        Arc::new(move |current| session.on_progress(current))
    }

    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    pub(crate) fn mark_starting(&self) -> bool {
        self.advance(SessionState::Created, SessionState::Starting)
    }

    pub(crate) fn mark_active(&self) -> bool {
        self.advance(SessionState::Starting, SessionState::Active)
    }

    fn advance(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = lock(&self.state);
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    /// Move into a terminal state unless one was already entered
    fn enter_terminal(&self, terminal: SessionState) -> bool {
        let mut state = lock(&self.state);
        if state.is_terminal() {
            warn!(
                file = %self.name,
                current = ?*state,
                requested = ?terminal,
                "Ignoring second terminal transition"
            );
            return false;
        }
        *state = terminal;
        true
    }

    fn release_reservation(&self) {
        let reservation = lock(&self.reservation).take();
        if let Some(reservation) = reservation {
            reservation.release();
        }
    }

    fn listener(&self) -> Option<Arc<dyn DownloadListener>> {
        let listener = self.listener.upgrade();
        if listener.is_none() {
            warn!(request_id = self.request_id, "Listener dropped before download finished");
        }
        listener
    }

    /// Fail the session without notifying anyone.
    ///
    /// Used when the request driving the session is dropped mid-flight, so
    /// it must not await. No-op once a terminal state was entered.
    pub(crate) fn abandon(&self) -> bool {
        {
            let mut state = lock(&self.state);
            if state.is_terminal() {
                return false;
            }
            *state = SessionState::Failed;
        }
        warn!(
            file = %self.name,
            media_id = %self.media_id,
            "Download request dropped before finishing"
        );
        self.release_reservation();
        true
    }

    /// Completed transition: listener first, then release.
    pub(crate) async fn on_download_complete(&self) -> bool {
        if !self.enter_terminal(SessionState::Completed) {
            return false;
        }
        if let Some(listener) = self.listener() {
            listener.on_download_complete().await;
        }
        self.release_reservation();
        true
    }

    /// Failed/Cancelled transition: release, then listener.
    pub(crate) async fn on_download_error(&self, error: &MirrorError) -> bool {
        let terminal = if error.is_cancellation() {
            SessionState::Cancelled
        } else {
            SessionState::Failed
        };
        if !self.enter_terminal(terminal) {
            return false;
        }
        self.release_reservation();
        if let Some(listener) = self.listener() {
            listener.on_download_error(&error.user_message()).await;
        }
        true
    }
}

impl fmt::Debug for DownloadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadSession")
            .field("name", &self.name)
            .field("media_id", &self.media_id)
            .field("request_id", &self.request_id)
            .field("processed_bytes", &self.processed_bytes())
            .field("cancelled", &self.is_cancelled())
            .field("state", &self.state())
            .finish()
    }
}
