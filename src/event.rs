//! Classification of scanned rows into neutral events for downstream
//! consumers.

use crate::model::message::{group_action, ItemType, Message};

/// What a message row means to the downstream network.
#[derive(Debug, Clone)]
pub enum MessageEvent {
    /// A normal message to deliver.
    Post(Message),
    /// An edit of an already delivered message.
    Edit(Message),
    /// The message was retracted entirely.
    Retraction(Message),
    /// A reaction row; `message.tapback` is always present.
    Tapback(Message),
    /// A member joined (`added`) or left the chat. Avatar-item rows with a
    /// zero action also encode a member leaving, attributed to the sender.
    MemberChange { message: Message, added: bool },
    /// The chat was renamed to `message.new_group_title`.
    NameChange(Message),
    /// The chat avatar was set or removed.
    AvatarChange { message: Message, removed: bool },
    /// A row this bridge does not translate.
    Unsupported(Message),
}

impl MessageEvent {
    /// Short name for logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Post(_) => "post",
            Self::Edit(_) => "edit",
            Self::Retraction(_) => "retraction",
            Self::Tapback(_) => "tapback",
            Self::MemberChange { added: true, .. } => "member-add",
            Self::MemberChange { added: false, .. } => "member-remove",
            Self::NameChange(_) => "name-change",
            Self::AvatarChange { removed: false, .. } => "avatar-set",
            Self::AvatarChange { removed: true, .. } => "avatar-remove",
            Self::Unsupported(_) => "unsupported",
        }
    }

    pub fn message(&self) -> &Message {
        match self {
            Self::Post(message)
            | Self::Edit(message)
            | Self::Retraction(message)
            | Self::Tapback(message)
            | Self::MemberChange { message, .. }
            | Self::NameChange(message)
            | Self::AvatarChange { message, .. }
            | Self::Unsupported(message) => message,
        }
    }
}

/// Route a message by item type and row state. Tapbacks win over
/// retractions, retractions over edits, edits over plain posts.
pub fn classify(message: Message) -> MessageEvent {
    match message.item_type {
        ItemType::Message => {
            if message.tapback.is_some() {
                MessageEvent::Tapback(message)
            } else if message.is_retracted {
                MessageEvent::Retraction(message)
            } else if message.is_edited {
                MessageEvent::Edit(message)
            } else {
                MessageEvent::Post(message)
            }
        }
        ItemType::MemberChange => {
            let added = message.group_action_type == group_action::MEMBER_ADD;
            MessageEvent::MemberChange { message, added }
        }
        ItemType::NameChange => MessageEvent::NameChange(message),
        ItemType::AvatarChange => match message.group_action_type {
            group_action::AVATAR_SET => MessageEvent::AvatarChange {
                message,
                removed: false,
            },
            group_action::AVATAR_REMOVE => MessageEvent::AvatarChange {
                message,
                removed: true,
            },
            // Action 0 on an avatar item records the sender leaving.
            _ => MessageEvent::MemberChange {
                message,
                added: false,
            },
        },
        _ => MessageEvent::Unsupported(message),
    }
}
