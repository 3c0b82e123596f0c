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


//! Collaborator interfaces
//!
//! The coordinator talks to the rest of the bot only through these traits:
//! the requester's [`DownloadListener`], the chat [`Notifier`], the
//! duplicate and limit checkers, queue [`AdmissionControl`], and the
//! elevated (user-session) client.

use super::RequestId;
use crate::error::{MirrorError, Result};
use crate::media::Message;
use crate::transport::MediaTransport;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Inline button attached to a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub url: String,
}

/// Lifecycle hooks and identity of whoever asked for the download
#[async_trait]
pub trait DownloadListener: Send + Sync {
    fn request_id(&self) -> RequestId;

    /// Message that triggered the request; replies are anchored here
    fn message(&self) -> &Message;

    fn is_super_group(&self) -> bool;

    /// Fired when a request starts, or when it is accepted into the queue
    async fn on_download_start(&self);

    async fn on_download_complete(&self);

    async fn on_download_error(&self, error: &str);
}

/// Chat-side output
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, message: &Message, text: &str, button: Option<&Button>);

    /// Broadcast the current status board
    async fn send_status_message(&self, message: &Message);

    /// Remove the link messages that started the request
    async fn delete_links(&self, message: &Message);
}

/// Result of a positive duplicate check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateNotice {
    pub message: String,
    pub button: Option<Button>,
}

#[async_trait]
pub trait DuplicateChecker: Send + Sync {
    async fn check_duplicate(&self, name: &str, listener: &dyn DownloadListener) -> Option<DuplicateNotice>;
}

#[async_trait]
pub trait LimitChecker: Send + Sync {
    /// Returns the rejection message when `size` is over a limit
    async fn check_limit(&self, size: u64, listener: &dyn DownloadListener) -> Option<String>;
}

/// Decision of the admission controller
#[derive(Debug)]
pub enum Admission {
    /// A slot is free, start now
    Proceed,
    /// Wait until the handle is signalled
    Queued(WaitHandle),
}

#[async_trait]
pub trait AdmissionControl: Send + Sync {
    async fn is_queued(&self, request_id: RequestId) -> Admission;
}

/// Receiving side of a queue admission
#[derive(Debug)]
pub struct WaitHandle {
    rx: oneshot::Receiver<()>,
}

/// Sending side of a queue admission, held by the admission controller
#[derive(Debug)]
pub struct AdmissionSignal {
    tx: oneshot::Sender<()>,
}

impl WaitHandle {
    pub fn channel() -> (AdmissionSignal, WaitHandle) {
        let (tx, rx) = oneshot::channel();
        (AdmissionSignal { tx }, WaitHandle { rx })
    }

    /// Suspend until admitted. Errors if the signal was dropped unsent.
    pub async fn wait(self) -> Result<()> {
        self.rx.await.map_err(|_| MirrorError::AdmissionDropped)
    }
}

impl AdmissionSignal {
    pub fn admit(self) {
        // The waiter may already be gone
        let _ = self.tx.send(());
    }
}

/// Looks messages up by chat and id
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn get_message(&self, chat_id: i64, message_id: i64) -> Result<Message>;
}

/// The user-session client: re-fetches messages and downloads with stronger
/// credentials than the bot.
#[derive(Clone)]
pub struct ElevatedClient {
    pub messages: Arc<dyn MessageSource>,
    pub transport: Arc<dyn MediaTransport>,
}

/// Everything the coordinator consumes
#[derive(Clone)]
pub struct Collaborators {
    /// Bot-session transport
    pub transport: Arc<dyn MediaTransport>,
    pub elevated: Option<ElevatedClient>,
    pub notifier: Arc<dyn Notifier>,
    pub duplicates: Arc<dyn DuplicateChecker>,
    pub limits: Arc<dyn LimitChecker>,
    pub admission: Arc<dyn AdmissionControl>,
}
