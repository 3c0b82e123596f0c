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


//! Bot API file transport
//!
//! Two requests per transfer:
//! 1. `GET {api}/bot{token}/getFile?file_id=...` resolves the server-side
//!    `file_path`
//! 2. `GET {api}/file/bot{token}/{file_path}` streams the bytes
//!
//! The body is written through a buffered writer with periodic flushes.
//! Progress is reported after every chunk and the abort signal is checked
//! before every chunk and once more after the last. An aborted or failed
//! transfer removes its partial file.

use super::{AbortSignal, Destination, MediaTransport, ProgressCallback};
use crate::error::{MirrorError, Result};
use crate::media::Message;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const DOWNLOAD_BUFF_SZ: usize = 64 * 1024;
const DATA_FLUSH_SZ: u64 = 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Envelope every Bot API method answers with
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

/// `File` object returned by `getFile`
#[derive(Debug, Deserialize)]
struct RemoteFile {
    file_unique_id: String,
    file_size: Option<u64>,
    file_path: Option<String>,
}

/// Downloads media with a bot token
pub struct BotApiTransport {
    client: Client,
    api_base: String,
    token: String,
}

impl BotApiTransport {
    pub fn new<S: Into<String>>(token: S) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
        })
    }

    /// Point at a different server, e.g. a local Bot API instance
    pub fn with_api_base<S: Into<String>>(mut self, api_base: S) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token, file_path)
    }

    async fn get_file(&self, file_id: &str) -> Result<RemoteFile> {
        let response = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await?;

        let body: ApiResponse<RemoteFile> = response.json().await?;
        match body.result {
            Some(file) if body.ok => Ok(file),
            _ => Err(MirrorError::BotApi {
                description: body
                    .description
                    .unwrap_or_else(|| "getFile returned no result".to_string()),
                error_code: body.error_code,
            }),
        }
    }

    /// Stream `url` into `path`. `Ok(false)` means the transfer was aborted.
    ///
    /// Nothing is left at `path` unless the whole body was written.
    async fn stream_to_file(
        &self,
        url: &str,
        path: &Path,
        expected: u64,
        progress: &ProgressCallback,
        abort: &AbortSignal,
    ) -> Result<bool> {
        let response = self.client.get(url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(MirrorError::transport(format!(
                "Unexpected status code: {}",
                response.status()
            )));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = File::create(path).await?;

        match write_body(response, file, expected, progress, abort).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                debug!(path = %path.display(), "Transfer aborted");
                remove_partial(path).await;
                Ok(false)
            }
            Err(e) => {
                remove_partial(path).await;
                Err(e)
            }
        }
    }
}

/// Copy the response body into `file`; `Ok(false)` if aborted
async fn write_body(
    response: reqwest::Response,
    file: File,
    expected: u64,
    progress: &ProgressCallback,
    abort: &AbortSignal,
) -> Result<bool> {
    let mut writer = BufWriter::with_capacity(DOWNLOAD_BUFF_SZ, file);
    let mut stream = response.bytes_stream();

    let mut written = 0u64;
    let mut next_flush = DATA_FLUSH_SZ;

    while let Some(chunk) = stream.next().await {
        if abort.is_aborted() {
            return Ok(false);
        }

        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
        progress(written);

        if written >= next_flush {
            writer.flush().await?;
            next_flush = written + DATA_FLUSH_SZ;
        }
    }

    // The last progress call may have raised the abort
    if abort.is_aborted() {
        return Ok(false);
    }

    writer.flush().await?;

    if expected > 0 && written < expected {
        return Err(MirrorError::Incomplete {
            expected,
            actual: written,
        });
    }
    Ok(true)
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Could not remove partial download");
    }
}

/// File name for a directory destination
fn default_file_name(message_name: Option<&str>, remote: &RemoteFile) -> String {
    if let Some(name) = message_name.filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    remote
        .file_path
        .as_deref()
        .and_then(|p| p.rsplit('/').next())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| remote.file_unique_id.clone())
}

#[async_trait]
impl MediaTransport for BotApiTransport {
    async fn download_media(
        &self,
        message: &Message,
        destination: &Destination,
        progress: ProgressCallback,
        abort: AbortSignal,
    ) -> Result<Option<PathBuf>> {
        let media = message.media.as_ref().ok_or(MirrorError::NoValidMedia)?;
        let file = media.file();
        let info = media.info();

        if abort.is_aborted() {
            return Ok(None);
        }

        let remote = self.get_file(&file.file_id).await?;
        let file_path = remote.file_path.clone().ok_or_else(|| {
            MirrorError::transport(format!("No file path for {}", remote.file_unique_id))
        })?;

        let target = destination.resolve(&default_file_name(info.file_name.as_deref(), &remote));
        let expected = remote.file_size.unwrap_or(info.size);
        debug!(target_path = %target.display(), expected, "Streaming file from Bot API");

        let finished = self
            .stream_to_file(&self.file_url(&file_path), &target, expected, &progress, &abort)
            .await?;
        Ok(finished.then_some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ChatType, Media, MediaFile};
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "123:TEST";

    fn document(name: Option<&str>, size: u64) -> Message {
        let mut file = MediaFile::new("BQACfile", "uniq-doc", size);
        if let Some(name) = name {
            file = file.with_name(name);
        }
        Message::new(-100, 7, ChatType::Supergroup).with_media(Media::Document(file))
    }

    fn recording_progress() -> (ProgressCallback, Arc<AtomicU64>) {
        let last = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&last);
        let callback: ProgressCallback = Arc::new(move |bytes| sink.store(bytes, Ordering::SeqCst));
        (callback, last)
    }

    async fn mount_get_file(server: &MockServer, file_path: &str, size: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/bot{}/getFile", TOKEN)))
            .and(query_param("file_id", "BQACfile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {
                    "file_id": "BQACfile",
                    "file_unique_id": "uniq-doc",
                    "file_size": size,
                    "file_path": file_path
                }
            })))
            .mount(server)
            .await;
    }

    async fn mount_body(server: &MockServer, file_path: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(format!("/file/bot{}/{}", TOKEN, file_path)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(server)
            .await;
    }

    fn transport(server: &MockServer) -> BotApiTransport {
        BotApiTransport::new(TOKEN).unwrap().with_api_base(server.uri())
    }

    #[tokio::test]
    async fn test_download_into_directory_uses_media_name() {
        let server = MockServer::start().await;
        let body = vec![7u8; 2048];
        mount_get_file(&server, "documents/file_3.pdf", 2048).await;
        mount_body(&server, "documents/file_3.pdf", body.clone()).await;

        let dir = TempDir::new().unwrap();
        let (progress, last) = recording_progress();
        let result = transport(&server)
            .download_media(
                &document(Some("report.pdf"), 2048),
                &Destination::Directory(dir.path().join("42")),
                progress,
                AbortSignal::new(),
            )
            .await
            .unwrap();

        let written = result.unwrap();
        assert_eq!(written, dir.path().join("42").join("report.pdf"));
        assert_eq!(tokio::fs::read(&written).await.unwrap(), body);
        assert_eq!(last.load(Ordering::SeqCst), 2048);
    }

    #[tokio::test]
    async fn test_unnamed_media_falls_back_to_remote_path() {
        let server = MockServer::start().await;
        mount_get_file(&server, "photos/file_9.jpg", 16).await;
        mount_body(&server, "photos/file_9.jpg", vec![1u8; 16]).await;

        let dir = TempDir::new().unwrap();
        let (progress, _) = recording_progress();
        let written = transport(&server)
            .download_media(
                &document(None, 16),
                &Destination::Directory(dir.path().to_path_buf()),
                progress,
                AbortSignal::new(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(written, dir.path().join("file_9.jpg"));
    }

    #[tokio::test]
    async fn test_explicit_file_destination() {
        let server = MockServer::start().await;
        mount_get_file(&server, "videos/file_1.mp4", 4).await;
        mount_body(&server, "videos/file_1.mp4", b"abcd".to_vec()).await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("renamed.mp4");
        let (progress, _) = recording_progress();
        let written = transport(&server)
            .download_media(
                &document(Some("clip.mp4"), 4),
                &Destination::File(target.clone()),
                progress,
                AbortSignal::new(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(written, target);
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/bot{}/getFile", TOKEN)))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: file is too big"
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let (progress, _) = recording_progress();
        let err = transport(&server)
            .download_media(
                &document(Some("big.bin"), 1),
                &Destination::Directory(dir.path().to_path_buf()),
                progress,
                AbortSignal::new(),
            )
            .await
            .unwrap_err();

        match err {
            MirrorError::BotApi { description, error_code } => {
                assert_eq!(description, "Bad Request: file is too big");
                assert_eq!(error_code, Some(400));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_short_body_is_incomplete() {
        let server = MockServer::start().await;
        mount_get_file(&server, "documents/file_4.bin", 100).await;
        mount_body(&server, "documents/file_4.bin", vec![0u8; 60]).await;

        let dir = TempDir::new().unwrap();
        let (progress, _) = recording_progress();
        let err = transport(&server)
            .download_media(
                &document(Some("short.bin"), 100),
                &Destination::Directory(dir.path().to_path_buf()),
                progress,
                AbortSignal::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MirrorError::Incomplete { expected: 100, actual: 60 }));
        assert!(!dir.path().join("short.bin").exists());
    }

    /// Progress callback that raises the abort once `threshold` bytes arrived
    fn aborting_progress(abort: &AbortSignal, threshold: u64) -> ProgressCallback {
        let abort = abort.clone();
        Arc::new(move |bytes| {
            if bytes >= threshold {
                abort.abort();
            }
        })
    }

    #[tokio::test]
    async fn test_abort_on_last_chunk_discards_file() {
        let server = MockServer::start().await;
        mount_get_file(&server, "documents/file_5.bin", 16).await;
        mount_body(&server, "documents/file_5.bin", vec![3u8; 16]).await;

        let dir = TempDir::new().unwrap();
        let abort = AbortSignal::new();
        let result = transport(&server)
            .download_media(
                &document(Some("tiny.bin"), 16),
                &Destination::Directory(dir.path().to_path_buf()),
                aborting_progress(&abort, 16),
                abort.clone(),
            )
            .await
            .unwrap();

        assert!(abort.is_aborted());
        assert!(result.is_none());
        assert!(!dir.path().join("tiny.bin").exists());
    }

    #[tokio::test]
    async fn test_abort_mid_stream_discards_file() {
        let server = MockServer::start().await;
        let size = 4 * 1024 * 1024;
        mount_get_file(&server, "videos/file_6.mp4", size).await;
        mount_body(&server, "videos/file_6.mp4", vec![9u8; size as usize]).await;

        let dir = TempDir::new().unwrap();
        let abort = AbortSignal::new();
        let result = transport(&server)
            .download_media(
                &document(Some("large.mp4"), size),
                &Destination::Directory(dir.path().to_path_buf()),
                aborting_progress(&abort, 1),
                abort.clone(),
            )
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(!dir.path().join("large.mp4").exists());
    }

    #[tokio::test]
    async fn test_aborted_before_start_returns_none() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let (progress, _) = recording_progress();
        let abort = AbortSignal::new();
        abort.abort();

        let result = transport(&server)
            .download_media(
                &document(Some("never.bin"), 10),
                &Destination::Directory(dir.path().to_path_buf()),
                progress,
                abort,
            )
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_message_without_media() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let (progress, _) = recording_progress();
        let err = transport(&server)
            .download_media(
                &Message::new(1, 1, ChatType::Private),
                &Destination::Directory(dir.path().to_path_buf()),
                progress,
                AbortSignal::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MirrorError::NoValidMedia));
    }
}
