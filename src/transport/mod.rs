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


//! Media transports
//!
//! A transport moves the bytes of one message's media to local storage. The
//! coordinator never looks inside a transfer: it hands the transport a
//! progress callback and an [`AbortSignal`], and reads the outcome.
//!
//! # Contract
//! - `progress` is called with the running byte count, in order, from the
//!   task doing the transfer.
//! - `abort` is checked at every chunk boundary; once set, the transport
//!   stops as soon as it notices and returns either `Ok(None)` or an error.
//! - `Ok(Some(path))` means the file is complete at `path`.

pub mod bot_api;

use crate::error::Result;
use crate::media::Message;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use bot_api::BotApiTransport;

/// Callback type for byte-count updates
pub type ProgressCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Out-of-band stop request for one transfer
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the transfer to stop. Safe to call any number of times.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Where a transfer should land
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Exact file path chosen by the requester
    File(PathBuf),
    /// Directory; the transport picks the file name
    Directory(PathBuf),
}

impl Destination {
    /// Final file path, using `default_name` for directories
    pub fn resolve(&self, default_name: &str) -> PathBuf {
        match self {
            Destination::File(path) => path.clone(),
            Destination::Directory(dir) => dir.join(default_name),
        }
    }
}

/// Something that can fetch a message's media to disk
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Download the media attached to `message`.
    ///
    /// For [`Destination::Directory`] the file is named after the media's
    /// own file name, falling back to whatever the transport knows.
    async fn download_media(
        &self,
        message: &Message,
        destination: &Destination,
        progress: ProgressCallback,
        abort: AbortSignal,
    ) -> Result<Option<PathBuf>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_is_idempotent_and_shared() {
        let signal = AbortSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_aborted());

        signal.abort();
        signal.abort();
        assert!(clone.is_aborted());
    }

    #[test]
    fn test_destination_resolve() {
        let file = Destination::File(PathBuf::from("/data/custom.mp4"));
        assert_eq!(file.resolve("ignored.mp4"), PathBuf::from("/data/custom.mp4"));

        let dir = Destination::Directory(PathBuf::from("/data/42"));
        assert_eq!(dir.resolve("clip.mp4"), PathBuf::from("/data/42/clip.mp4"));
    }
}
