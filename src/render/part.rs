//! Rendered message parts and the media-upload seam.

use crate::error::ConvertError;

/// What a rendered part is, mapped to media kind by mime prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Text,
    Notice,
    Image,
    Video,
    Audio,
    File,
}

/// One entry of the rendered output sequence delivered downstream.
#[derive(Debug, Clone)]
pub struct MessagePart {
    /// Sequential part id: `"0"`, `"1"`, …
    pub id: String,
    pub kind: PartKind,
    pub body: String,
    /// HTML body, present when the part carries formatting.
    pub formatted_body: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<usize>,
    pub url: Option<String>,
    pub encryption: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Set on notice parts produced from errors or unsupported rows.
    pub unsupported: bool,
}

impl MessagePart {
    pub fn text(body: String) -> Self {
        Self {
            id: String::new(),
            kind: PartKind::Text,
            body,
            formatted_body: None,
            mime_type: None,
            size: None,
            url: None,
            encryption: None,
            width: None,
            height: None,
            unsupported: false,
        }
    }

    /// A notice part carrying an error or unsupported-row explanation.
    pub fn notice(body: impl Into<String>) -> Self {
        Self {
            kind: PartKind::Notice,
            unsupported: true,
            ..Self::text(body.into())
        }
    }
}

/// Where an upload landed: a content URL plus optional encryption details.
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub url: String,
    pub encryption: Option<String>,
}

/// Injected media-upload callback.
///
/// The renderer hands over attachment bytes and receives a reference the
/// downstream network can resolve; it never transports media itself.
pub trait MediaUploader {
    fn upload(
        &self,
        room_id: &str,
        data: &[u8],
        file_name: &str,
        mime_type: &str,
    ) -> Result<MediaRef, ConvertError>;
}

/// Uploader for contexts that never touch media (dry runs, tests).
pub struct NoopUploader;

impl MediaUploader for NoopUploader {
    fn upload(
        &self,
        _room_id: &str,
        _data: &[u8],
        file_name: &str,
        _mime_type: &str,
    ) -> Result<MediaRef, ConvertError> {
        Ok(MediaRef {
            url: format!("about:blank#{file_name}"),
            encryption: None,
        })
    }
}
