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


//! Download progress snapshots for status reporting
//!
//! # Progress Information
//! - gid and name for identification
//! - Bytes processed / total bytes
//! - Average speed since the session started
//! - Estimated time remaining
//! - Percentage complete
//! - Download state (Queued, Downloading, ...)

use super::session::SessionState;
use super::status::Direction;
use serde::{Deserialize, Serialize};

/// Download state as shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadState {
    /// Waiting for queue admission
    Queued,
    /// Bytes are (or are about to be) flowing
    Downloading,
    /// Download completed successfully
    Completed,
    /// Download failed with error
    Failed,
    /// Download cancelled by user
    Cancelled,
}

impl From<SessionState> for DownloadState {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Created | SessionState::Starting | SessionState::Active => {
                DownloadState::Downloading
            }
            SessionState::Completed => DownloadState::Completed,
            SessionState::Failed => DownloadState::Failed,
            SessionState::Cancelled => DownloadState::Cancelled,
        }
    }
}

/// Progress snapshot for a single status record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Short correlation token of the status record
    pub gid: String,

    /// Display name
    pub name: String,

    /// Bytes downloaded so far
    pub processed_bytes: u64,

    /// Total bytes to download (0 if unknown)
    pub total_bytes: u64,

    /// Percentage complete (0.0 - 100.0)
    pub percent_complete: f64,

    /// Average download speed in bytes per second
    pub download_speed: f64,

    /// Estimated time remaining in seconds (0 if unknown)
    pub eta_seconds: u64,

    /// Current state of the download
    pub state: DownloadState,

    pub direction: Direction,
}

impl DownloadProgress {
    /// Create a new progress snapshot
    pub fn new(gid: String, name: String, total_bytes: u64, state: DownloadState, direction: Direction) -> Self {
        Self {
            gid,
            name,
            processed_bytes: 0,
            total_bytes,
            percent_complete: 0.0,
            download_speed: 0.0,
            eta_seconds: 0,
            state,
            direction,
        }
    }

    /// Fill in bytes and speed, then derive percentage and ETA
    pub fn with_transfer(mut self, processed_bytes: u64, download_speed: f64) -> Self {
        self.processed_bytes = processed_bytes;
        self.download_speed = download_speed;
        self.calculate_percentage();
        self.calculate_eta();
        self
    }

    /// Calculate percentage from bytes
    pub fn calculate_percentage(&mut self) {
        if self.total_bytes > 0 {
            let ratio = self.processed_bytes as f64 / self.total_bytes as f64;
            self.percent_complete = (ratio * 100.0).min(100.0);
        } else {
            self.percent_complete = 0.0;
        }
    }

    /// Calculate ETA from speed and remaining bytes
    pub fn calculate_eta(&mut self) {
        if self.download_speed > 0.0 && self.total_bytes > 0 {
            let remaining_bytes = self.total_bytes.saturating_sub(self.processed_bytes);
            self.eta_seconds = (remaining_bytes as f64 / self.download_speed) as u64;
        } else {
            self.eta_seconds = 0;
        }
    }

    /// Format download speed (e.g., "2.5 MB/s")
    pub fn speed_string(&self) -> String {
        format!("{}/s", Self::bytes_string(self.download_speed as u64))
    }

    /// Format ETA (e.g., "5m 30s")
    pub fn eta_string(&self) -> String {
        if self.eta_seconds == 0 {
            return "-".to_string();
        }

        let hours = self.eta_seconds / 3600;
        let minutes = (self.eta_seconds % 3600) / 60;
        let seconds = self.eta_seconds % 60;

        if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Format bytes with a binary unit (e.g., "45.2 MiB")
    pub fn bytes_string(bytes: u64) -> String {
        const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
        let mut value = bytes as f64;
        let mut unit = 0;
        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{} B", bytes)
        } else {
            format!("{:.2} {}", value, UNITS[unit])
        }
    }

    /// Format progress as display string
    pub fn display_string(&self) -> String {
        match self.state {
            DownloadState::Queued => {
                format!(
                    "{}: Queued ({}) [{}]",
                    self.name,
                    Self::bytes_string(self.total_bytes),
                    self.gid
                )
            }
            DownloadState::Downloading => {
                format!(
                    "{}: {:.1}% ({} / {}) - {} - ETA {} [{}]",
                    self.name,
                    self.percent_complete,
                    Self::bytes_string(self.processed_bytes),
                    Self::bytes_string(self.total_bytes),
                    self.speed_string(),
                    self.eta_string(),
                    self.gid
                )
            }
            DownloadState::Completed => format!("{}: Completed", self.name),
            DownloadState::Failed => format!("{}: Failed", self.name),
            DownloadState::Cancelled => format!("{}: Cancelled", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(total: u64) -> DownloadProgress {
        DownloadProgress::new(
            "0a1b2c3d".to_string(),
            "video.mp4".to_string(),
            total,
            DownloadState::Downloading,
            Direction::Download,
        )
    }

    #[test]
    fn test_progress_percentage() {
        let progress = snapshot(1_000_000).with_transfer(250_000, 0.0);
        assert_eq!(progress.percent_complete, 25.0);

        let progress = snapshot(1_000_000).with_transfer(1_000_000, 0.0);
        assert_eq!(progress.percent_complete, 100.0);

        // Unknown size never divides by zero
        let progress = snapshot(0).with_transfer(500, 10.0);
        assert_eq!(progress.percent_complete, 0.0);
        assert_eq!(progress.eta_seconds, 0);
    }

    #[test]
    fn test_eta_calculation() {
        let progress = snapshot(10_000_000).with_transfer(5_000_000, 1_000_000.0);
        assert_eq!(progress.eta_seconds, 5);
        assert_eq!(progress.eta_string(), "5s");
    }

    #[test]
    fn test_bytes_string() {
        assert_eq!(DownloadProgress::bytes_string(512), "512 B");
        assert_eq!(DownloadProgress::bytes_string(1536), "1.50 KiB");
        assert_eq!(DownloadProgress::bytes_string(5 * 1024 * 1024), "5.00 MiB");
    }

    #[test]
    fn test_state_from_session() {
        assert_eq!(DownloadState::from(SessionState::Active), DownloadState::Downloading);
        assert_eq!(DownloadState::from(SessionState::Cancelled), DownloadState::Cancelled);
    }

    #[test]
    fn test_display_queued() {
        let progress = DownloadProgress::new(
            "ffff0000".to_string(),
            "doc.zip".to_string(),
            2048,
            DownloadState::Queued,
            Direction::Download,
        );
        assert_eq!(progress.display_string(), "doc.zip: Queued (2.00 KiB) [ffff0000]");
    }
}
