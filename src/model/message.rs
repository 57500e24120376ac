//! The scanned message row and everything reconstructed from it.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::BridgeError;
use crate::model::attachment::Attachment;
use crate::model::component::CombinedComponent;
use crate::parser::archivable::Archivable;
use crate::parser::edited::{EditStatus, EditedMessagePart};

/// Zero point of all on-disk date columns: 2001-01-01T00:00:00Z.
pub const APPLE_EPOCH_UNIX_SECS: i64 = 978_307_200;

/// Convert nanoseconds since the platform epoch to a UTC timestamp.
pub fn apple_ns_to_utc(ns: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(APPLE_EPOCH_UNIX_SECS * 1_000_000_000 + ns)
}

/// Row classification from the `item_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Message,
    MemberChange,
    NameChange,
    AvatarChange,
    LocationShare,
    SharePlay,
    Other(i64),
}

impl Default for ItemType {
    fn default() -> Self {
        Self::Message
    }
}

impl ItemType {
    pub fn from_i64(value: i64) -> Self {
        match value {
            0 => Self::Message,
            1 => Self::MemberChange,
            2 => Self::NameChange,
            3 => Self::AvatarChange,
            4 => Self::LocationShare,
            6 => Self::SharePlay,
            other => Self::Other(other),
        }
    }
}

/// Group-action subtypes, overloaded by item type.
pub mod group_action {
    pub const MEMBER_ADD: i64 = 0;
    pub const MEMBER_REMOVE: i64 = 1;
    pub const AVATAR_SET: i64 = 1;
    pub const AVATAR_REMOVE: i64 = 2;
}

/// A `service;[+|-];local_id` handle triple. Group chats carry `+`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifier {
    pub local_id: String,
    pub service: String,
    pub is_group: bool,
}

impl Identifier {
    pub fn parse(identifier: &str) -> Self {
        if identifier.is_empty() {
            return Self::default();
        }
        let parts: Vec<&str> = identifier.split(';').collect();
        if parts.len() < 3 {
            return Self::default();
        }
        Self {
            service: parts[0].to_string(),
            is_group: parts[1] == "+",
            local_id: parts[2].to_string(),
        }
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.local_id.is_empty() {
            return Ok(());
        }
        let type_char = if self.is_group { '+' } else { '-' };
        write!(f, "{};{};{}", self.service, type_char, self.local_id)
    }
}

/// A reaction attached to another message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapbackType {
    Love,
    Like,
    Dislike,
    Laugh,
    Emphasis,
    Question,
    Emoji,
    Sticker,
    Unknown(i64),
}

impl TapbackType {
    pub fn from_i64(value: i64) -> Self {
        match value {
            2000 => Self::Love,
            2001 => Self::Like,
            2002 => Self::Dislike,
            2003 => Self::Laugh,
            2004 => Self::Emphasis,
            2005 => Self::Question,
            2006 => Self::Emoji,
            2007 => Self::Sticker,
            other => Self::Unknown(other),
        }
    }

    pub fn to_i64(self) -> i64 {
        match self {
            Self::Love => 2000,
            Self::Like => 2001,
            Self::Dislike => 2002,
            Self::Laugh => 2003,
            Self::Emphasis => 2004,
            Self::Question => 2005,
            Self::Emoji => 2006,
            Self::Sticker => 2007,
            Self::Unknown(other) => other,
        }
    }
}

/// Types in `[3000, 4000)` encode the removal of the reaction `type − 1000`.
const TAPBACK_REMOVE_OFFSET: i64 = 1000;

/// A parsed tapback row: the reaction and the message part it targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Tapback {
    pub target_guid: String,
    pub tapback_type: TapbackType,
    pub remove: bool,
    pub target_part: i64,
    /// Raw `associated_message_emoji` column, used by the `Emoji` type.
    pub raw_emoji: String,
}

impl Tapback {
    /// Interpret the raw `associated_message_*` columns.
    ///
    /// The target is either `bp:<guid>`, `p:<part>/<guid>`, or a bare
    /// 36-character GUID; anything else is malformed.
    pub fn parse(
        raw_type: i64,
        target_guid: &str,
        raw_emoji: &str,
    ) -> Result<Self, BridgeError> {
        let mut raw_type = raw_type;
        let mut remove = false;
        if (3000..4000).contains(&raw_type) {
            raw_type -= TAPBACK_REMOVE_OFFSET;
            remove = true;
        }

        let mut target_part = 0;
        let target = if let Some(stripped) = target_guid.strip_prefix("bp:") {
            stripped.to_string()
        } else if let Some(stripped) = target_guid.strip_prefix("p:") {
            let parts: Vec<&str> = stripped.splitn(2, '/').collect();
            if parts.len() != 2 {
                return Err(BridgeError::TapbackMalformed {
                    target: target_guid.to_string(),
                });
            }
            target_part = parts[0].parse().map_err(|_| BridgeError::TapbackMalformed {
                target: target_guid.to_string(),
            })?;
            parts[1].to_string()
        } else if target_guid.chars().count() == 36 {
            target_guid.to_string()
        } else {
            return Err(BridgeError::TapbackMalformed {
                target: target_guid.to_string(),
            });
        };

        Ok(Self {
            target_guid: target,
            tapback_type: TapbackType::from_i64(raw_type),
            remove,
            target_part,
            raw_emoji: raw_emoji.to_string(),
        })
    }

    /// Reserialize the target in the explicit `p:<part>/<guid>` form.
    pub fn encode_target(&self) -> String {
        format!("p:{}/{}", self.target_part, self.target_guid)
    }

    /// The raw numeric type, with the removal offset applied back.
    pub fn encode_type(&self) -> i64 {
        let base = self.tapback_type.to_i64();
        if self.remove {
            base + TAPBACK_REMOVE_OFFSET
        } else {
            base
        }
    }

    /// Emoji shown for this reaction.
    pub fn emoji(&self) -> String {
        match self.tapback_type {
            TapbackType::Love => "\u{2764}\u{fe0f}".to_string(),
            TapbackType::Like => "\u{1f44d}\u{fe0f}".to_string(),
            TapbackType::Dislike => "\u{1f44e}\u{fe0f}".to_string(),
            TapbackType::Laugh => "\u{1f602}".to_string(),
            TapbackType::Emphasis => "\u{203c}\u{fe0f}".to_string(),
            TapbackType::Question => "\u{2753}\u{fe0f}".to_string(),
            TapbackType::Emoji => self.raw_emoji.clone(),
            TapbackType::Unknown(0) => String::new(),
            TapbackType::Sticker | TapbackType::Unknown(_) => "\u{fffd}".to_string(),
        }
    }
}

/// A read receipt row.
#[derive(Debug, Clone)]
pub struct ReadReceipt {
    pub chat_guid: String,
    pub read_up_to: String,
    pub read_at: DateTime<Utc>,
    pub is_from_me: bool,
    pub sender_guid: String,
}

/// One scanned message row plus everything reconstructed from its blobs.
///
/// Constructed by the SQL scanner, mutated only during its parse pass,
/// then immutable.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub row_id: i64,
    pub guid: String,

    /// Nanoseconds since the platform epoch.
    pub date: i64,
    pub date_read: i64,
    pub date_edited: i64,
    pub date_retracted: i64,

    pub is_sent: bool,
    pub is_from_me: bool,
    pub is_delivered: bool,
    pub is_emote: bool,
    pub is_audio_message: bool,
    pub is_read: bool,
    pub is_edited: bool,
    pub is_retracted: bool,

    pub subject: String,
    pub text: String,
    /// The user-visible string decoded from the attributed body.
    pub attributed_body_text: String,
    pub chat_guid: String,
    pub reply_to_guid: String,
    pub reply_to_part: i64,
    pub thread_id: String,
    pub new_group_title: String,
    pub balloon_bundle_id: String,

    pub sender: Identifier,
    pub target: Identifier,

    pub item_type: ItemType,
    pub group_action_type: i64,

    pub attachments: Vec<Attachment>,
    pub components: Vec<Archivable>,
    pub combined_components: Vec<CombinedComponent>,
    pub edited_message_parts: Vec<EditedMessagePart>,

    pub tapback: Option<Tapback>,
}

impl Message {
    pub fn created_at(&self) -> DateTime<Utc> {
        apple_ns_to_utc(self.date)
    }

    pub fn edited_at(&self) -> Option<DateTime<Utc>> {
        (self.date_edited != 0).then(|| apple_ns_to_utc(self.date_edited))
    }

    /// Whether the part at `index` carries an `Edited` status.
    pub fn is_part_edited(&self, index: usize) -> bool {
        self.edited_message_parts
            .get(index)
            .map(|part| part.status == EditStatus::Edited)
            .unwrap_or(false)
    }

    /// Merge the edited-part statuses into the combined components:
    /// every `Unsent` index gains a `Retraction` marker at that position
    /// (appended when the index is past the end).
    ///
    /// The body walk coalesces adjacent text runs, but the summary info
    /// carries the real part count (the `otr` cardinality, the same index
    /// space the retraction markers use). Before inserting markers,
    /// trailing effect runs are peeled back into their own text components
    /// until each surviving part has one component.
    pub fn apply_edited_parts(&mut self, parts: Vec<EditedMessagePart>) {
        let unsent = parts
            .iter()
            .filter(|part| part.status == EditStatus::Unsent)
            .count();
        let surviving = parts.len().saturating_sub(unsent);

        while self.combined_components.len() < surviving {
            let split = self
                .combined_components
                .iter_mut()
                .enumerate()
                .rev()
                .find_map(|(position, component)| match component {
                    CombinedComponent::Text(effects) if effects.len() > 1 => {
                        effects.pop().map(|effect| (position, effect))
                    }
                    _ => None,
                });
            let Some((position, effect)) = split else {
                break;
            };
            self.combined_components
                .insert(position + 1, CombinedComponent::Text(vec![effect]));
        }

        for (index, part) in parts.iter().enumerate() {
            if part.status == EditStatus::Unsent {
                if index >= self.combined_components.len() {
                    self.combined_components.push(CombinedComponent::Retraction);
                } else {
                    self.combined_components
                        .insert(index, CombinedComponent::Retraction);
                }
            }
        }
        self.edited_message_parts = parts;
    }
}
