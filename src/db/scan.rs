//! Read-only scanner over the chat database.
//!
//! Each query returns fully reconstructed [`Message`] values: scalar
//! columns, decoded attributed body, combined components, edited parts and
//! tapback. Emission is atomic per row; a row that cannot be reconstructed
//! is logged and skipped, never half-emitted.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, Row};
use tracing::{debug, warn};

use crate::db::queries;
use crate::error::{BridgeError, Result};
use crate::model::attachment::{Attachment, StickerSource};
use crate::model::message::{apple_ns_to_utc, Identifier, ItemType, Message, ReadReceipt, Tapback};
use crate::parser::archivable::text_from_components;
use crate::parser::body::combine_components;
use crate::parser::edited::edited_parts_from_summary_info;
use crate::parser::plist::{as_string, decode_dictionary};
use crate::parser::typedstream::decode_components;

/// The scalar columns of one message row, in query order.
struct RawRow {
    row_id: i64,
    guid: String,
    date: i64,
    subject: String,
    text: String,
    attributed_body: Option<Vec<u8>>,
    summary_info: Option<Vec<u8>>,
    chat_guid: String,
    sender_local_id: String,
    sender_service: String,
    target_local_id: String,
    target_service: String,
    is_from_me: bool,
    date_read: i64,
    is_delivered: bool,
    is_sent: bool,
    is_emote: bool,
    is_audio_message: bool,
    date_edited: i64,
    date_retracted: i64,
    reply_to_guid: String,
    thread_originator_part: String,
    tapback_target_guid: String,
    tapback_type: i64,
    tapback_emoji: String,
    new_group_title: String,
    item_type: i64,
    group_action_type: i64,
    thread_id: String,
    balloon_bundle_id: String,
}

fn read_raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        row_id: row.get(0)?,
        guid: row.get(1)?,
        date: row.get(2)?,
        subject: row.get(3)?,
        text: row.get(4)?,
        attributed_body: row.get(5)?,
        summary_info: row.get(6)?,
        chat_guid: row.get(7)?,
        sender_local_id: row.get(8)?,
        sender_service: row.get(9)?,
        target_local_id: row.get(10)?,
        target_service: row.get(11)?,
        is_from_me: row.get::<_, i64>(12)? != 0,
        date_read: row.get(13)?,
        is_delivered: row.get::<_, i64>(14)? != 0,
        is_sent: row.get::<_, i64>(15)? != 0,
        is_emote: row.get::<_, i64>(16)? != 0,
        is_audio_message: row.get::<_, i64>(17)? != 0,
        date_edited: row.get(18)?,
        date_retracted: row.get(19)?,
        reply_to_guid: row.get(20)?,
        thread_originator_part: row.get(21)?,
        tapback_target_guid: row.get(22)?,
        tapback_type: row.get(23)?,
        tapback_emoji: row.get(24)?,
        new_group_title: row.get(25)?,
        item_type: row.get(26)?,
        group_action_type: row.get(27)?,
        thread_id: row.get(28)?,
        balloon_bundle_id: row.get(29)?,
    })
}

/// Scanner over one chat database, opened read-only.
pub struct MessageStore {
    conn: Connection,
    path: PathBuf,
    messages_base: String,
    attachments_query: String,
}

impl MessageStore {
    /// Open the chat database read-only and probe its schema version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        if !table_has_column(&conn, "message", "guid")? {
            return Err(BridgeError::UnknownSchema {
                reason: "no message.guid column".to_string(),
            });
        }

        // Emoji columns only exist on newer schema versions.
        let message_emoji = table_has_column(&conn, "message", "associated_message_emoji")?;
        let attachment_emoji =
            table_has_column(&conn, "attachment", "emoji_image_short_description")?;
        debug!(
            path = %path.display(),
            message_emoji, attachment_emoji, "Opened chat database"
        );

        let messages_base = queries::BASE_MESSAGES_QUERY.replace(
            "{emoji}",
            if message_emoji {
                queries::MESSAGE_EMOJI_COLUMN
            } else {
                queries::MISSING_COLUMN
            },
        );
        let attachments_query = queries::ATTACHMENTS_QUERY.replace(
            "{emoji}",
            if attachment_emoji {
                queries::ATTACHMENT_EMOJI_COLUMN
            } else {
                queries::MISSING_COLUMN
            },
        );

        Ok(Self {
            conn,
            path,
            messages_base,
            attachments_query,
        })
    }

    /// The standard location of the chat database in the user's home.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Library")
            .join("Messages")
            .join("chat.db")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Highest row id in the message table, 0 when empty.
    pub fn max_row_id(&self) -> Result<i64> {
        let max: Option<i64> = self
            .conn
            .query_row(queries::MAX_MESSAGES_ROW_QUERY, [], |row| row.get(0))?;
        Ok(max.unwrap_or(0))
    }

    /// Latest of `date`, `date_edited` and `date_retracted`, 0 when empty.
    pub fn max_message_time(&self) -> Result<i64> {
        let max: Option<i64> = self
            .conn
            .query_row(queries::MAX_MESSAGES_TIME_QUERY, [], |row| row.get(0))?;
        Ok(max.unwrap_or(0))
    }

    /// Messages whose date, edit date or retraction date passed `after_ns`.
    pub fn messages_newer_than(&self, after_ns: i64) -> Result<Vec<Message>> {
        let query = format!(
            "{}{}",
            self.messages_base,
            queries::MESSAGES_NEWER_THAN_SUFFIX
        );
        self.scan_messages(&query, rusqlite::params![after_ns])
    }

    pub fn messages_above_row(&self, row_id: i64) -> Result<Vec<Message>> {
        let query = format!("{}{}", self.messages_base, queries::MESSAGES_ABOVE_ROW_SUFFIX);
        self.scan_messages(&query, rusqlite::params![row_id])
    }

    pub fn messages_between(&self, min_row: i64, max_row: i64) -> Result<Vec<Message>> {
        let query = format!("{}{}", self.messages_base, queries::MESSAGES_BETWEEN_SUFFIX);
        self.scan_messages(&query, rusqlite::params![min_row, max_row])
    }

    /// Display name of a chat, when set.
    pub fn chat_display_name(&self, chat_guid: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare(queries::CHAT_QUERY)?;
        let mut rows = stmt.query([chat_guid])?;
        match rows.next()? {
            Some(row) => {
                let name: String = row.get(0)?;
                Ok((!name.is_empty()).then_some(name))
            }
            None => Ok(None),
        }
    }

    /// Raw member handles of a chat (no normalization).
    pub fn group_members(&self, chat_guid: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(queries::GROUP_MEMBER_QUERY)?;
        let members = stmt
            .query_map([chat_guid], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members.into_iter().filter(|m| !m.is_empty()).collect())
    }

    /// Path, mime type and name of the latest group-action attachment
    /// (used for avatar changes).
    pub fn group_action_attachment(
        &self,
        item_type: i64,
        group_action_type: i64,
        chat_guid: &str,
    ) -> Result<Option<(String, String, String)>> {
        let mut stmt = self.conn.prepare(queries::GROUP_ACTION_QUERY)?;
        let mut rows = stmt.query(rusqlite::params![item_type, group_action_type, chat_guid])?;
        match rows.next()? {
            Some(row) => Ok(Some((row.get(0)?, row.get(1)?, row.get(2)?))),
            None => Ok(None),
        }
    }

    /// Read receipts newer than `min_ns`, plus the advanced watermark.
    pub fn read_receipts_since(&self, min_ns: i64) -> Result<(Vec<ReadReceipt>, i64)> {
        let mut stmt = self.conn.prepare(queries::NEW_RECEIPTS_QUERY)?;
        let rows = stmt
            .query_map([min_ns], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)? != 0,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut watermark = min_ns;
        let mut receipts = Vec::new();
        for (chat_guid, message_guid, message_is_from_me, read_at_ns) in rows {
            if read_at_ns > watermark {
                watermark = read_at_ns;
            }
            let mut receipt = ReadReceipt {
                read_at: apple_ns_to_utc(read_at_ns),
                read_up_to: message_guid,
                is_from_me: !message_is_from_me,
                sender_guid: String::new(),
                chat_guid,
            };
            if message_is_from_me {
                if Identifier::parse(&receipt.chat_guid).is_group {
                    // No per-member receipts in groups; skip our own rows.
                    continue;
                }
                // A receipt on our own message in a private chat comes from
                // the one peer.
                receipt.sender_guid = receipt.chat_guid.clone();
            }
            receipts.push(receipt);
        }
        Ok((receipts, watermark))
    }

    fn scan_messages(
        &self,
        query: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Message>> {
        let mut stmt = self.conn.prepare(query)?;
        let raw_rows = stmt
            .query_map(params, read_raw_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut messages = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            let row_id = raw.row_id;
            let guid = raw.guid.clone();
            match self.build_message(raw) {
                Ok(message) => messages.push(message),
                Err(err) => {
                    warn!(row_id, guid = %guid, error = %err, "Skipping unreadable message row");
                }
            }
        }
        Ok(messages)
    }

    /// The per-row parse pass: attachments, attributed body, summary info
    /// and tapback. After this the message is immutable.
    fn build_message(&self, raw: RawRow) -> Result<Message> {
        let mut message = Message {
            row_id: raw.row_id,
            guid: raw.guid,
            date: raw.date,
            date_read: raw.date_read,
            date_edited: raw.date_edited,
            date_retracted: raw.date_retracted,
            is_sent: raw.is_sent,
            is_from_me: raw.is_from_me,
            is_delivered: raw.is_delivered,
            is_emote: raw.is_emote,
            is_audio_message: raw.is_audio_message,
            is_read: raw.date_read != 0,
            is_edited: raw.date_edited != 0,
            is_retracted: raw.date_retracted != 0,
            subject: raw.subject,
            text: raw.text,
            chat_guid: raw.chat_guid,
            reply_to_guid: raw.reply_to_guid,
            thread_id: raw.thread_id,
            new_group_title: raw.new_group_title,
            balloon_bundle_id: raw.balloon_bundle_id,
            sender: Identifier {
                local_id: raw.sender_local_id,
                service: raw.sender_service,
                is_group: false,
            },
            target: Identifier {
                local_id: raw.target_local_id,
                service: raw.target_service,
                is_group: false,
            },
            item_type: ItemType::from_i64(raw.item_type),
            group_action_type: raw.group_action_type,
            ..Default::default()
        };

        message.attachments = self.attachments_for(message.row_id)?;

        if let Some(body) = raw.attributed_body.as_deref().filter(|b| !b.is_empty()) {
            match decode_components(body) {
                Ok(components) => {
                    if let Some(text) = text_from_components(&components) {
                        message.attributed_body_text = text.to_string();
                        if message.balloon_bundle_id.is_empty() {
                            message.combined_components =
                                combine_components(&components, &message.attributed_body_text);
                        }
                    }
                    message.components = components;
                }
                Err(err) => {
                    warn!(
                        row_id = message.row_id,
                        guid = %message.guid,
                        error = %err,
                        "Failed to decode attributed body"
                    );
                }
            }
        }

        if let Some(summary) = raw.summary_info.as_deref().filter(|b| !b.is_empty()) {
            match edited_parts_from_summary_info(summary) {
                Ok(parts) => {
                    if !message.is_edited && parts.len() > 1 {
                        warn!(
                            row_id = message.row_id,
                            parts = parts.len(),
                            "Message has summary info but was not edited"
                        );
                    }
                    message.apply_edited_parts(parts);
                }
                Err(err) if message.is_edited => return Err(err),
                Err(err) => {
                    warn!(
                        row_id = message.row_id,
                        guid = %message.guid,
                        error = %err,
                        "Failed to decode summary info"
                    );
                }
            }
        }

        // The first `:`-separated field is the replied-to part index.
        if !raw.thread_originator_part.is_empty() {
            message.reply_to_part = raw
                .thread_originator_part
                .split(':')
                .next()
                .and_then(|part| part.parse().ok())
                .unwrap_or(0);
        }

        if message.is_from_me {
            message.sender.local_id = String::new();
        }

        if !raw.tapback_target_guid.is_empty() {
            match Tapback::parse(raw.tapback_type, &raw.tapback_target_guid, &raw.tapback_emoji) {
                Ok(tapback) => message.tapback = Some(tapback),
                Err(err) => {
                    warn!(
                        row_id = message.row_id,
                        guid = %message.guid,
                        error = %err,
                        "Failed to parse tapback"
                    );
                }
            }
        }

        Ok(message)
    }

    fn attachments_for(&self, message_row_id: i64) -> Result<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(&self.attachments_query)?;
        let rows = stmt
            .query_map([message_row_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)? != 0,
                    row.get::<_, Option<Vec<u8>>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut attachments = Vec::with_capacity(rows.len());
        for (guid, path, mime, name, is_sticker, sticker_info, emoji_desc) in rows {
            let mut attachment = Attachment {
                guid,
                path_on_disk: path,
                mime_type: mime,
                file_name: name,
                is_sticker,
                sticker_source: StickerSource::None,
                emoji_image_short_description: emoji_desc,
            };
            if let Some(info) = sticker_info.as_deref().filter(|b| !b.is_empty()) {
                attachment.sticker_source = sticker_source_from_info(info).unwrap_or_else(|err| {
                    warn!(
                        attachment = %attachment.guid,
                        error = %err,
                        "Failed to read sticker info"
                    );
                    StickerSource::None
                });
            }
            attachments.push(attachment);
        }
        Ok(attachments)
    }
}

/// Pull the sticker source out of a `sticker_user_info` plist.
fn sticker_source_from_info(info: &[u8]) -> Result<StickerSource> {
    let dictionary = decode_dictionary(info)?;
    let pid = as_string(&dictionary, "pid")?;
    Ok(StickerSource::from_pid(pid))
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names.iter().any(|name| name == column))
}
