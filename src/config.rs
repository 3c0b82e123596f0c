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


//! Coordinator configuration

use crate::download::status::Direction;
use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Random bytes per status gid (hex-encoded, so 4 bytes = 8 chars)
    pub gid_bytes: usize,

    /// Display name used when neither an override nor a file name exists
    pub default_file_name: String,

    /// Maximum seconds to wait for queue admission (None = wait forever)
    pub queue_wait_timeout_secs: Option<u64>,

    /// Direction tag attached to status records
    pub direction: Direction,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            gid_bytes: 4,
            default_file_name: "None".to_string(),
            queue_wait_timeout_secs: None,
            direction: Direction::Download,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from a JSON file; absent fields take defaults
    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gid_bytes == 0 || self.gid_bytes > 16 {
            return Err(MirrorError::config(format!(
                "gid_bytes must be between 1 and 16, got {}",
                self.gid_bytes
            )));
        }
        if self.queue_wait_timeout_secs == Some(0) {
            return Err(MirrorError::config(
                "queue_wait_timeout_secs must be positive when set",
            ));
        }
        Ok(())
    }

    pub fn queue_wait_timeout(&self) -> Option<Duration> {
        self.queue_wait_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.gid_bytes, 4);
        assert_eq!(config.default_file_name, "None");
        assert!(config.queue_wait_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = CoordinatorConfig {
            gid_bytes: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MirrorError::Config(_))));

        let config = CoordinatorConfig {
            queue_wait_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_partial_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.json");
        tokio::fs::write(&path, r#"{"queue_wait_timeout_secs": 600}"#)
            .await
            .unwrap();

        let config = CoordinatorConfig::from_json_file(&path).await.unwrap();
        assert_eq!(config.queue_wait_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.gid_bytes, 4);
        assert_eq!(config.direction, Direction::Download);
    }

    #[tokio::test]
    async fn test_upload_direction_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.json");
        tokio::fs::write(&path, r#"{"direction": "up", "gid_bytes": 6}"#)
            .await
            .unwrap();

        let config = CoordinatorConfig::from_json_file(&path).await.unwrap();
        assert_eq!(config.direction, Direction::Upload);
        assert_eq!(config.direction.as_str(), "up");
        assert_eq!(config.gid_bytes, 6);
    }
}
