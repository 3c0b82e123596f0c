//! MirrorCore: coordinates Telegram media downloads for the mirror bot.
//!
//! The entry point is [`download::DownloadCoordinator::add_download`]; the
//! rest of the bot plugs in through the traits in [`download::hooks`] and
//! [`transport::MediaTransport`].

pub mod config;
pub mod download;
pub mod error;
pub mod logging;
pub mod media;
pub mod transport;

pub use config::CoordinatorConfig;
pub use error::{MirrorError, Result};
pub use media::{ChatType, Media, MediaFile, MediaInfo, Message};
