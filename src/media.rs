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


//! Telegram message and media model
//!
//! A message carries at most one piece of media. Every media kind exposes the
//! same projection ([`MediaInfo`]): the unique identifier used for
//! deduplication, the size, and the file name when Telegram knows one.

use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};

/// Kind of chat a message was posted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
}

/// File attributes shared by all media kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Identifier used to fetch the file; may differ between bots
    pub file_id: String,

    /// Identifier stable across bots and time; the deduplication key
    pub file_unique_id: String,

    /// Size in bytes (0 if Telegram did not report one)
    #[serde(default)]
    pub file_size: u64,

    #[serde(default)]
    pub file_name: Option<String>,

    #[serde(default)]
    pub mime_type: Option<String>,
}

impl MediaFile {
    pub fn new<S: Into<String>>(file_id: S, file_unique_id: S, file_size: u64) -> Self {
        Self {
            file_id: file_id.into(),
            file_unique_id: file_unique_id.into(),
            file_size,
            file_name: None,
            mime_type: None,
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// Media attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "file", rename_all = "snake_case")]
pub enum Media {
    Photo(MediaFile),
    Video(MediaFile),
    Document(MediaFile),
    Audio(MediaFile),
    Voice(MediaFile),
    VideoNote(MediaFile),
    Sticker(MediaFile),
    Animation(MediaFile),
}

impl Media {
    /// Underlying file attributes
    pub fn file(&self) -> &MediaFile {
        match self {
            Media::Photo(f)
            | Media::Video(f)
            | Media::Document(f)
            | Media::Audio(f)
            | Media::Voice(f)
            | Media::VideoNote(f)
            | Media::Sticker(f)
            | Media::Animation(f) => f,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Media::Photo(_) => "photo",
            Media::Video(_) => "video",
            Media::Document(_) => "document",
            Media::Audio(_) => "audio",
            Media::Voice(_) => "voice",
            Media::VideoNote(_) => "video_note",
            Media::Sticker(_) => "sticker",
            Media::Animation(_) => "animation",
        }
    }

    /// Uniform projection used by the coordinator
    pub fn info(&self) -> MediaInfo {
        let file = self.file();
        // Photos never carry a file name
        let file_name = match self {
            Media::Photo(_) => None,
            _ => file.file_name.clone(),
        };
        MediaInfo {
            unique_id: file.file_unique_id.clone(),
            size: file.file_size,
            file_name,
        }
    }
}

/// What the coordinator needs to know about a piece of media
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub unique_id: String,
    pub size: u64,
    pub file_name: Option<String>,
}

/// A Telegram message as seen by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub chat_id: i64,
    pub id: i64,
    pub chat_type: ChatType,
    #[serde(default)]
    pub media: Option<Media>,
}

impl Message {
    pub fn new(chat_id: i64, id: i64, chat_type: ChatType) -> Self {
        Self {
            chat_id,
            id,
            chat_type,
            media: None,
        }
    }

    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    /// Project the attached media, failing when there is none
    pub fn media_info(&self) -> Result<MediaInfo> {
        self.media
            .as_ref()
            .map(Media::info)
            .ok_or(MirrorError::NoValidMedia)
    }
}
