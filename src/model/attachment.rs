//! Attachment rows and sticker metadata.
//!
//! Attachment bytes are NOT loaded when a message is scanned; the file is
//! read from disk only when a part is rendered.

use std::path::{Path, PathBuf};

use crate::error::ConvertError;

/// Where a sticker attachment came from, per the `pid` field of its
/// `sticker_user_info` plist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StickerSource {
    #[default]
    None,
    Genmoji,
    Animoji,
    AnimojiJellyfish,
    UserGenerated,
}

impl StickerSource {
    /// Match a `pid` identifier; unknown identifiers map to `None`.
    pub fn from_pid(pid: &str) -> Self {
        match pid {
            "com.apple.messages.genmoji" => Self::Genmoji,
            "com.apple.Animoji.StickersApp.MessagesExtension" => Self::Animoji,
            "com.apple.Jellyfish.Animoji" => Self::AnimojiJellyfish,
            "com.apple.Stickers.UserGenerated.MessagesExtension" => Self::UserGenerated,
            _ => Self::None,
        }
    }
}

/// One attachment row joined to a message.
#[derive(Debug, Clone, Default)]
pub struct Attachment {
    pub guid: String,
    /// Path as stored in the database; may start with `~/`.
    pub path_on_disk: String,
    /// May be empty; sniffed from the file content on demand.
    pub mime_type: String,
    pub file_name: String,
    pub is_sticker: bool,
    pub sticker_source: StickerSource,
    pub emoji_image_short_description: String,
}

impl Attachment {
    /// Read the attachment bytes, expanding a leading `~/` against the
    /// user's home directory.
    pub fn read(&self) -> Result<Vec<u8>, ConvertError> {
        let path = expand_home(&self.path_on_disk);
        std::fs::read(&path).map_err(|source| ConvertError::AttachmentRead { path, source })
    }

    /// The stored mime type, or a magic-byte sniff of the file when the
    /// database column was empty.
    pub fn mime_type(&self) -> String {
        if !self.mime_type.is_empty() {
            return self.mime_type.clone();
        }
        let path = expand_home(&self.path_on_disk);
        match infer::get_from_path(&path) {
            Ok(Some(kind)) => kind.mime_type().to_string(),
            _ => String::new(),
        }
    }
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_home(input: &str) -> PathBuf {
    if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    Path::new(input).to_path_buf()
}
