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


use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use mirror_core::download::{
    Admission, AdmissionControl, Button, Collaborators, DownloadCoordinator, DownloadListener,
    DownloadOutcome, DuplicateChecker, DuplicateNotice, LimitChecker, Notifier, RequestId,
    SessionMode,
};
use mirror_core::logging::init_logging;
use mirror_core::transport::BotApiTransport;
use mirror_core::{ChatType, CoordinatorConfig, Media, MediaFile, Message};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const STATUS_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "mirror-cli")]
#[command(about = "MirrorCore CLI - Desktop testing tool", long_about = None)]
struct Cli {
    /// Default log directive when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download one file through the Bot API
    Download {
        /// Bot token
        #[arg(long, env = "BOT_TOKEN")]
        token: String,
        /// Telegram file_id
        #[arg(long)]
        file_id: String,
        /// Telegram file_unique_id
        #[arg(long)]
        unique_id: String,
        /// Advertised size in bytes
        #[arg(long, default_value_t = 0)]
        size: u64,
        /// Save under this name instead of the media's own
        #[arg(long)]
        name: Option<String>,
        /// Target directory
        #[arg(long, default_value = "downloads")]
        dir: PathBuf,
        /// Coordinator settings (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Bot API server
        #[arg(long)]
        api_base: Option<String>,
    },
}

/// Prints lifecycle events to stdout
struct ConsoleListener {
    request_id: RequestId,
    message: Message,
}

#[async_trait]
impl DownloadListener for ConsoleListener {
    fn request_id(&self) -> RequestId {
        self.request_id
    }

    fn message(&self) -> &Message {
        &self.message
    }

    fn is_super_group(&self) -> bool {
        self.message.chat_type == ChatType::Supergroup
    }

    async fn on_download_start(&self) {
        println!("Download started");
    }

    async fn on_download_complete(&self) {
        println!("Download complete");
    }

    async fn on_download_error(&self, error: &str) {
        println!("Download failed: {}", error);
    }
}

struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send_message(&self, _message: &Message, text: &str, button: Option<&Button>) {
        match button {
            Some(button) => println!("{} [{}: {}]", text, button.text, button.url),
            None => println!("{}", text),
        }
    }

    async fn send_status_message(&self, _message: &Message) {}

    async fn delete_links(&self, _message: &Message) {}
}

/// Accepts everything and never queues
struct AllowAll;

#[async_trait]
impl DuplicateChecker for AllowAll {
    async fn check_duplicate(&self, _name: &str, _listener: &dyn DownloadListener) -> Option<DuplicateNotice> {
        None
    }
}

#[async_trait]
impl LimitChecker for AllowAll {
    async fn check_limit(&self, _size: u64, _listener: &dyn DownloadListener) -> Option<String> {
        None
    }
}

#[async_trait]
impl AdmissionControl for AllowAll {
    async fn is_queued(&self, _request_id: RequestId) -> Admission {
        Admission::Proceed
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log)?;

    match cli.command {
        Commands::Download {
            token,
            file_id,
            unique_id,
            size,
            name,
            dir,
            config,
            api_base,
        } => {
            let config = match config {
                Some(path) => CoordinatorConfig::from_json_file(&path)
                    .await
                    .with_context(|| format!("loading {}", path.display()))?,
                None => CoordinatorConfig::default(),
            };

            let mut transport = BotApiTransport::new(token)?;
            if let Some(api_base) = api_base {
                transport = transport.with_api_base(api_base);
            }

            let allow_all = Arc::new(AllowAll);
            let collaborators = Collaborators {
                transport: Arc::new(transport),
                elevated: None,
                notifier: Arc::new(ConsoleNotifier),
                duplicates: allow_all.clone(),
                limits: allow_all.clone(),
                admission: allow_all,
            };
            let coordinator = Arc::new(DownloadCoordinator::new(collaborators, config)?);

            let message = Message::new(0, 1, ChatType::Private)
                .with_media(Media::Document(MediaFile::new(file_id, unique_id, size)));
            let listener: Arc<dyn DownloadListener> = Arc::new(ConsoleListener {
                request_id: 1,
                message: message.clone(),
            });

            let cancel_on_ctrl_c = {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        coordinator.cancel(1);
                    }
                })
            };
            let status_board = {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
                    loop {
                        ticker.tick().await;
                        for (_, progress) in coordinator.registries().status.snapshot() {
                            println!("{}", progress.display_string());
                        }
                    }
                })
            };

            let outcome = coordinator
                .add_download(listener, &message, &dir, name.as_deref(), SessionMode::Bot)
                .await;
            cancel_on_ctrl_c.abort();
            status_board.abort();

            match outcome? {
                DownloadOutcome::Completed(path) => println!("Saved to {}", path.display()),
                DownloadOutcome::CancelledWhileQueued => println!("Removed from queue"),
            }
        }
    }

    Ok(())
}
