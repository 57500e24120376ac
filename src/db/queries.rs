//! SQL text for the chat database.
//!
//! Message queries select the scalar columns in one fixed order (see the
//! column list in [`crate::db::scan`]); the emoji columns only exist on
//! newer schema versions and are substituted per the probe result.

/// Column selected for `tapback_emoji` on schemas that carry it.
pub const MESSAGE_EMOJI_COLUMN: &str = "COALESCE(message.associated_message_emoji, '')";

/// Column selected for `emoji_image_short_description` on schemas that carry it.
pub const ATTACHMENT_EMOJI_COLUMN: &str = "COALESCE(attachment.emoji_image_short_description, '')";

/// Substituted when the schema predates the column.
pub const MISSING_COLUMN: &str = "''";

/// The shared SELECT/JOIN prefix of every message query. `{emoji}` is
/// replaced with the probed tapback-emoji column.
pub const BASE_MESSAGES_QUERY: &str = "
SELECT message.ROWID, message.guid, message.date,
COALESCE(message.subject, ''), COALESCE(message.text, ''),
message.attributedBody, message.message_summary_info,
chat.guid,
COALESCE(sender_handle.id, ''), COALESCE(sender_handle.service, ''),
COALESCE(target_handle.id, ''), COALESCE(target_handle.service, ''),
message.is_from_me, COALESCE(message.date_read, 0),
message.is_delivered, message.is_sent, message.is_emote, message.is_audio_message,
COALESCE(message.date_edited, 0), COALESCE(message.date_retracted, 0),
COALESCE(message.thread_originator_guid, ''), COALESCE(message.thread_originator_part, ''),
COALESCE(message.associated_message_guid, ''), COALESCE(message.associated_message_type, 0), {emoji},
COALESCE(message.group_title, ''), message.item_type, message.group_action_type,
COALESCE(chat.group_id, ''), COALESCE(message.balloon_bundle_id, '')
FROM message
JOIN chat_message_join         ON chat_message_join.message_id = message.ROWID
JOIN chat                      ON chat_message_join.chat_id = chat.ROWID
LEFT JOIN handle sender_handle ON message.handle_id = sender_handle.ROWID
LEFT JOIN handle target_handle ON message.other_handle = target_handle.ROWID
";

pub const MESSAGES_NEWER_THAN_SUFFIX: &str = "
WHERE message.date > ?1 OR message.date_edited > ?1 OR message.date_retracted > ?1
ORDER BY MAX(message.date, COALESCE(message.date_edited, 0), COALESCE(message.date_retracted, 0)) ASC
";

pub const MESSAGES_ABOVE_ROW_SUFFIX: &str = "
WHERE message.ROWID > ?1
ORDER BY message.date ASC
";

pub const MESSAGES_BETWEEN_SUFFIX: &str = "
WHERE message.ROWID > ?1 AND message.ROWID < ?2
ORDER BY message.date ASC
";

pub const MAX_MESSAGES_ROW_QUERY: &str = "SELECT MAX(ROWID) FROM message";

pub const MAX_MESSAGES_TIME_QUERY: &str =
    "SELECT MAX(MAX(date), MAX(date_edited), MAX(date_retracted)) FROM message";

/// Attachments joined to one message, in row order. `{emoji}` is replaced
/// with the probed short-description column.
pub const ATTACHMENTS_QUERY: &str = "
SELECT attachment.guid, COALESCE(attachment.filename, ''), COALESCE(attachment.mime_type, ''),
COALESCE(attachment.transfer_name, ''), attachment.is_sticker, attachment.sticker_user_info, {emoji}
FROM attachment
JOIN message_attachment_join ON message_attachment_join.attachment_id = attachment.ROWID
WHERE message_attachment_join.message_id = ?1
ORDER BY attachment.ROWID
";

pub const CHAT_QUERY: &str = "
SELECT COALESCE(display_name, '')
FROM chat
WHERE guid = ?1
";

pub const GROUP_MEMBER_QUERY: &str = "
SELECT handle.id FROM chat
JOIN chat_handle_join ON chat_handle_join.chat_id = chat.ROWID
JOIN handle ON chat_handle_join.handle_id = handle.ROWID
WHERE chat.guid = ?1
";

/// Latest attachment for a group action (avatar changes).
pub const GROUP_ACTION_QUERY: &str = "
SELECT COALESCE(attachment.filename, ''), COALESCE(attachment.mime_type, ''),
COALESCE(attachment.transfer_name, '')
FROM message
JOIN chat_message_join ON chat_message_join.message_id = message.ROWID
JOIN chat              ON chat_message_join.chat_id = chat.ROWID
LEFT JOIN message_attachment_join ON message_attachment_join.message_id = message.ROWID
LEFT JOIN attachment              ON message_attachment_join.attachment_id = attachment.ROWID
WHERE message.item_type = ?1 AND message.group_action_type = ?2 AND chat.guid = ?3
ORDER BY message.date DESC LIMIT 1
";

pub const NEW_RECEIPTS_QUERY: &str = "
SELECT chat.guid, message.guid, message.is_from_me, message.date_read
FROM message
JOIN chat_message_join ON chat_message_join.message_id = message.ROWID
JOIN chat              ON chat_message_join.chat_id = chat.ROWID
WHERE message.date_read > ?1 AND message.is_read = 1
";
