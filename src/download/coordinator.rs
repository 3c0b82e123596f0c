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


//! Download coordinator
//!
//! # Request flow
//! 1. Session-mode check (user session only in supergroups)
//! 2. Re-fetch the message through the user client when required
//! 3. Project the attached media
//! 4. Reserve the media identifier (duplicate downloads stop here)
//! 5. Duplicate-content and size-limit checks
//! 6. Queue admission, waiting if the controller says so
//! 7. Start the session and publish its status record
//! 8. Run the transfer and enter a terminal state
//!
//! Every rejection is reported to the requester before `add_download`
//! returns the same error to the caller.

use super::hooks::{Admission, Collaborators, DownloadListener};
use super::registry::Registries;
use super::session::DownloadSession;
use super::status::{generate_gid, ActiveDownloadStatus, QueuedStatus, StatusRecord, StatusRegistry};
use super::RequestId;
use crate::config::CoordinatorConfig;
use crate::error::{MirrorError, Result};
use crate::media::{Media, MediaInfo, Message};
use crate::transport::{Destination, MediaTransport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Which Telegram client performs the download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// The bot account
    Bot,
    /// The logged-in user account; supergroups only
    User,
}

/// How a request that was not rejected ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// File written to the contained path
    Completed(PathBuf),
    /// Status record was removed while the request sat in the queue
    CancelledWhileQueued,
}

enum AdmissionPath {
    Immediate,
    Promoted,
    Withdrawn,
}

/// Fails a started session if the request future is dropped before it ends
struct AbandonOnDrop(Arc<DownloadSession>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.abandon();
    }
}

/// Removes the queued record if the request future is dropped while waiting
struct QueuedRecordGuard<'a> {
    status: &'a StatusRegistry,
    request_id: RequestId,
    armed: bool,
}

impl QueuedRecordGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for QueuedRecordGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.status.remove_queued(self.request_id).is_some() {
            warn!(request_id = self.request_id, "Queued request dropped before admission");
        }
    }
}

/// Coordinates Telegram media downloads
pub struct DownloadCoordinator {
    collaborators: Collaborators,
    registries: Registries,
    config: CoordinatorConfig,
}

impl DownloadCoordinator {
    /// Coordinator over the process-wide registries
    pub fn new(collaborators: Collaborators, config: CoordinatorConfig) -> Result<Self> {
        Self::with_registries(collaborators, Registries::global(), config)
    }

    pub fn with_registries(
        collaborators: Collaborators,
        registries: Registries,
        config: CoordinatorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            collaborators,
            registries,
            config,
        })
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Download the media of `message` into `path`.
    ///
    /// With a non-empty `filename` the file is written to `path/filename`
    /// and shown under that name; otherwise `path` is a directory and the
    /// media's own file name is used.
    pub async fn add_download(
        &self,
        listener: Arc<dyn DownloadListener>,
        message: &Message,
        path: &Path,
        filename: Option<&str>,
        mode: SessionMode,
    ) -> Result<DownloadOutcome> {
        let notifier = &self.collaborators.notifier;

        if mode == SessionMode::User && !listener.is_super_group() {
            let err = MirrorError::InvalidSession;
            notifier
                .send_message(listener.message(), &err.to_string(), None)
                .await;
            return Err(err);
        }

        let (message, transport) = match self.resolve_message(message, mode).await {
            Ok(resolved) => resolved,
            Err(e) => return self.reject(listener.as_ref(), e).await,
        };

        let info = match message.media_info() {
            Ok(info) => info,
            Err(e) => return self.reject(listener.as_ref(), e).await,
        };
        debug!(
            request_id = listener.request_id(),
            kind = message.media.as_ref().map_or("none", Media::kind),
            media_id = %info.unique_id,
            "Resolved media"
        );

        let Some(reservation) = self.registries.in_flight.try_reserve(&info.unique_id) else {
            return self.reject(listener.as_ref(), MirrorError::AlreadyDownloading).await;
        };

        let (name, destination) = match filename.filter(|f| !f.is_empty()) {
            Some(name) => (name.to_string(), Destination::File(path.join(name))),
            None => (
                info.file_name
                    .clone()
                    .unwrap_or_else(|| self.config.default_file_name.clone()),
                Destination::Directory(path.to_path_buf()),
            ),
        };

        if let Some(notice) = self
            .collaborators
            .duplicates
            .check_duplicate(&name, listener.as_ref())
            .await
        {
            notifier
                .send_message(listener.message(), &notice.message, notice.button.as_ref())
                .await;
            notifier.delete_links(listener.message()).await;
            return Err(MirrorError::duplicate(notice.message));
        }

        if let Some(limit) = self
            .collaborators
            .limits
            .check_limit(info.size, listener.as_ref())
            .await
        {
            listener.on_download_error(&limit).await;
            notifier.delete_links(listener.message()).await;
            return Err(MirrorError::LimitExceeded(limit));
        }

        let from_queue = match self.admit(listener.as_ref(), &name, &info).await? {
            AdmissionPath::Immediate => false,
            AdmissionPath::Promoted => true,
            AdmissionPath::Withdrawn => return Ok(DownloadOutcome::CancelledWhileQueued),
        };

        let session = Arc::new(DownloadSession::new(name, reservation, &listener));
        let _abandon = AbandonOnDrop(Arc::clone(&session));
        self.start_session(&listener, &session, info.size, from_queue).await;
        self.run_transfer(&session, transport.as_ref(), &message, &destination)
            .await
    }

    /// Cancel whatever `request_id` is doing.
    ///
    /// Active sessions are flagged; queued requests lose their record, which
    /// makes the waiter bail out once admitted. Returns false if the request
    /// has no record.
    pub fn cancel(&self, request_id: RequestId) -> bool {
        if let Some(queued) = self.registries.status.remove_queued(request_id) {
            info!(request_id = queued.request_id(), "Removed queued download");
            return true;
        }
        match self.registries.status.get(request_id) {
            Some(StatusRecord::Active(active)) => {
                active.cancel();
                true
            }
            _ => false,
        }
    }

    async fn reject<T>(&self, listener: &dyn DownloadListener, err: MirrorError) -> Result<T> {
        let request_id = listener.request_id();
        if err.is_validation() {
            info!(request_id, error = %err, "Rejected invalid download request");
        } else if err.is_admission() {
            info!(request_id, error = %err, "Download request not admitted");
        } else {
            warn!(request_id, error = %err, "Download request failed before start");
        }
        listener.on_download_error(&err.user_message()).await;
        Err(err)
    }

    /// Pick the message copy and transport for the session mode
    async fn resolve_message(
        &self,
        message: &Message,
        mode: SessionMode,
    ) -> Result<(Message, Arc<dyn MediaTransport>)> {
        match mode {
            SessionMode::Bot => Ok((message.clone(), Arc::clone(&self.collaborators.transport))),
            SessionMode::User => {
                let elevated = self
                    .collaborators
                    .elevated
                    .as_ref()
                    .ok_or_else(|| MirrorError::config("No user session configured"))?;
                let fetched = elevated
                    .messages
                    .get_message(message.chat_id, message.id)
                    .await
                    .map_err(|e| match e {
                        MirrorError::MessageUnavailable { .. } => e,
                        other => MirrorError::MessageUnavailable {
                            chat_id: message.chat_id,
                            message_id: message.id,
                            reason: other.to_string(),
                        },
                    })?;
                Ok((fetched, Arc::clone(&elevated.transport)))
            }
        }
    }

    /// Ask admission control; park in the queue if told to
    async fn admit(
        &self,
        listener: &dyn DownloadListener,
        name: &str,
        info: &MediaInfo,
    ) -> Result<AdmissionPath> {
        let request_id = listener.request_id();
        let handle = match self.collaborators.admission.is_queued(request_id).await {
            Admission::Proceed => return Ok(AdmissionPath::Immediate),
            Admission::Queued(handle) => handle,
        };

        info!(file = %name, request_id, "Added to queue");
        self.registries.status.set(
            request_id,
            StatusRecord::Queued(QueuedStatus::new(
                name.to_string(),
                info.size,
                info.unique_id.clone(),
                request_id,
                self.config.direction,
            )),
        );
        let guard = QueuedRecordGuard {
            status: &self.registries.status,
            request_id,
            armed: true,
        };
        listener.on_download_start().await;
        self.collaborators
            .notifier
            .send_status_message(listener.message())
            .await;

        let waited = match self.config.queue_wait_timeout() {
            Some(limit) => match tokio::time::timeout(limit, handle.wait()).await {
                Ok(result) => result,
                Err(_) => Err(MirrorError::QueueTimeout(limit.as_secs())),
            },
            None => handle.wait().await,
        };

        guard.disarm();

        if !self.registries.status.contains(request_id) {
            info!(file = %name, request_id, "Queued download withdrawn before start");
            return Ok(AdmissionPath::Withdrawn);
        }

        if let Err(e) = waited {
            self.registries.status.remove_queued(request_id);
            warn!(file = %name, request_id, error = %e, "Queue wait ended without admission");
            listener.on_download_error(&e.user_message()).await;
            return Err(e);
        }

        Ok(AdmissionPath::Promoted)
    }

    /// Starting transition: publish the active record and account the slot
    async fn start_session(
        &self,
        listener: &Arc<dyn DownloadListener>,
        session: &Arc<DownloadSession>,
        size: u64,
        from_queue: bool,
    ) {
        let request_id = listener.request_id();
        session.mark_starting();

        let gid = generate_gid(self.config.gid_bytes);
        self.registries.status.set(
            request_id,
            StatusRecord::Active(ActiveDownloadStatus::new(
                Arc::clone(session),
                size,
                gid.clone(),
                self.config.direction,
            )),
        );
        self.registries.non_queued.insert(request_id);

        if from_queue {
            info!(file = session.name(), gid = %gid, "Start queued download from Telegram");
        } else {
            listener.on_download_start().await;
            self.collaborators
                .notifier
                .send_status_message(listener.message())
                .await;
            info!(file = session.name(), gid = %gid, "Download from Telegram");
        }
    }

    /// Run the transport and route its outcome to a terminal state
    async fn run_transfer(
        &self,
        session: &Arc<DownloadSession>,
        transport: &dyn MediaTransport,
        message: &Message,
        destination: &Destination,
    ) -> Result<DownloadOutcome> {
        session.mark_active();
        let result = transport
            .download_media(
                message,
                destination,
                session.progress_callback(),
                session.abort_signal(),
            )
            .await;

        if session.is_cancelled() {
            session.on_download_error(&MirrorError::Cancelled).await;
            return Err(MirrorError::Cancelled);
        }

        match result {
            Ok(Some(path)) => {
                session.on_download_complete().await;
                Ok(DownloadOutcome::Completed(path))
            }
            Ok(None) => {
                session.on_download_error(&MirrorError::Internal).await;
                Err(MirrorError::Internal)
            }
            Err(e) => {
                error!(file = session.name(), media_id = session.media_id(), error = %e, "Telegram download failed");
                session.on_download_error(&e).await;
                Err(e)
            }
        }
    }
}
