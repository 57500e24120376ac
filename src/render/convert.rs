//! Conversion of a reconstructed message into rendered parts.

use tracing::warn;

use crate::model::attachment::{Attachment, StickerSource};
use crate::model::component::{AttachmentMeta, CombinedComponent, TextRangeEffect};
use crate::model::message::{ItemType, Message};
use crate::parser::body::combine_components;
use crate::parser::edited::EditStatus;
use crate::render::format::{escape_html, format_effects, mention_link};
use crate::render::part::{MediaUploader, MessagePart, PartKind};

/// Placeholder the fitness app prepends to shared-workout bodies.
const FITNESS_RECEIVER: &str = "$(kIMTranscriptPluginBreadcrumbTextReceiverIdentifier)";

/// An edit of a previously delivered message, paired against the parts
/// that already exist downstream.
#[derive(Debug, Clone, Default)]
pub struct ConvertedEdit {
    /// `(existing part id, replacement)` pairs, matched by index.
    pub modified: Vec<(String, MessagePart)>,
    /// New parts with no existing counterpart.
    pub added: Vec<MessagePart>,
    /// Existing part ids with no new counterpart.
    pub deleted: Vec<String>,
}

/// Convert a message into its ordered list of parts.
///
/// The policy ladder (first match wins): unsupported item types, app
/// messages, the combined-component walk, then the scalar-column fallback.
/// The walk never drops a row silently; failures surface as notice parts.
pub fn convert_message(
    message: &Message,
    room_id: &str,
    uploader: &dyn MediaUploader,
) -> Vec<MessagePart> {
    let mut parts = Vec::new();

    match message.item_type {
        ItemType::SharePlay => {
            parts.push(MessagePart::notice("unsupported item type (6: Shareplay)"));
            return assign_ids(parts);
        }
        ItemType::LocationShare => {
            parts.push(MessagePart::notice(
                "unsupported item type (4: Location Sharing)",
            ));
            return assign_ids(parts);
        }
        _ => {}
    }
    if !message.balloon_bundle_id.is_empty() {
        parts.push(MessagePart::notice("unsupported App message"));
        return assign_ids(parts);
    }

    let mut attachment_index = 0;
    for (component_index, component) in message.combined_components.iter().enumerate() {
        match component {
            CombinedComponent::Attachment(meta) => {
                if let Some(attachment) = message.attachments.get(attachment_index) {
                    let mut part = convert_attachment(attachment, meta, room_id, uploader);
                    annotate_sticker(&mut part, attachment);
                    parts.push(part);
                } else {
                    warn!(
                        row_id = message.row_id,
                        index = attachment_index,
                        "attachment component without attachment row"
                    );
                    parts.push(MessagePart::notice("attachment does not exist"));
                }
                attachment_index += 1;
            }
            CombinedComponent::Text(effects) => {
                if !message.attributed_body_text.is_empty() {
                    if let Some(part) = convert_text_part(message, effects, component_index) {
                        parts.push(part);
                    }
                }
            }
            CombinedComponent::Retraction => {
                if !message.edited_message_parts.is_empty() {
                    if let Some(part) = convert_edited_part(message, component_index) {
                        parts.push(part);
                    }
                }
            }
        }
    }

    if parts.is_empty() {
        if let Some(part) = convert_message_text(message) {
            parts.push(part);
        }
    }

    assign_ids(parts)
}

/// Convert an edit of an already delivered message, pairing new parts with
/// the previously emitted part ids by index.
pub fn convert_edit(
    message: &Message,
    existing_part_ids: &[String],
    room_id: &str,
    uploader: &dyn MediaUploader,
) -> ConvertedEdit {
    let new_parts = convert_message(message, room_id, uploader);
    let mut result = ConvertedEdit::default();

    let paired = new_parts.len().min(existing_part_ids.len());
    let mut new_parts = new_parts.into_iter();
    for existing_id in existing_part_ids.iter().take(paired) {
        if let Some(part) = new_parts.next() {
            result.modified.push((existing_id.clone(), part));
        }
    }
    result.added = new_parts.collect();
    if existing_part_ids.len() > paired {
        result.deleted = existing_part_ids[paired..].to_vec();
    }
    result
}

/// A styled text run, or the edited replacement when this part was edited.
fn convert_text_part(
    message: &Message,
    effects: &[TextRangeEffect],
    index: usize,
) -> Option<MessagePart> {
    if message.is_part_edited(index) {
        return convert_edited_part(message, index);
    }

    let mut part = MessagePart::text(escape_html(&message.attributed_body_text));
    let mut formatted = format_effects(&message.attributed_body_text, effects);
    if formatted.is_empty() {
        formatted = part.body.clone();
    }
    if let Some(stripped) = formatted.strip_prefix(FITNESS_RECEIVER) {
        formatted = stripped.to_string();
    }
    part.formatted_body = Some(formatted);
    Some(part)
}

/// Render an edited or unsent part by its index in the part list.
fn convert_edited_part(message: &Message, component_index: usize) -> Option<MessagePart> {
    let edited_part = message.edited_message_parts.get(component_index)?;
    match edited_part.status {
        EditStatus::Edited => {
            let Some(final_edit) = edited_part.edit_history.last() else {
                return Some(MessagePart::notice(
                    "Message edited but contained no edit history",
                ));
            };
            let Some(text) = final_edit.text.as_deref() else {
                return Some(MessagePart::notice(
                    "Message edited but final edit contained no text",
                ));
            };

            let mut part = MessagePart::text(escape_html(text));
            let combined = combine_components(&final_edit.components, text);
            if let Some(CombinedComponent::Text(effects)) = combined.last() {
                if !effects.is_empty() {
                    part.formatted_body = Some(format_effects(text, effects));
                }
            }
            Some(part)
        }
        EditStatus::Unsent => {
            let who = if message.is_from_me { "You" } else { "Sender" };
            let mut suffix = ".".to_string();
            if let Some(edited_at) = message.edited_at() {
                let elapsed = (edited_at - message.created_at()).num_seconds();
                let readable = humanize_seconds(elapsed);
                if !readable.is_empty() {
                    suffix = format!(" {readable} after sending.");
                }
            }
            let mut part = MessagePart::notice(format!("{who} unsent this message part{suffix}"));
            if !message.is_from_me {
                let sender = &message.sender.local_id;
                part.formatted_body = Some(format!(
                    "{} unsent this message part{suffix}",
                    mention_link(sender, sender)
                ));
            }
            Some(part)
        }
        EditStatus::Original => None,
    }
}

/// Fallback part built from the scalar `text`/`subject` columns.
fn convert_message_text(message: &Message) -> Option<MessagePart> {
    if message.text.is_empty() && message.subject.is_empty() {
        return None;
    }
    let mut part = MessagePart::text(message.text.clone());
    if !message.subject.is_empty() {
        part.body = format!("**{}**\n{}", message.subject, message.text);
        part.formatted_body = Some(format!(
            "<strong>{}</strong><br>{}",
            escape_html(&message.subject),
            escape_html(&message.text)
        ));
    }
    Some(part)
}

/// Read, upload and classify one attachment.
///
/// Failures produce a notice part; the rest of the message still converts.
fn convert_attachment(
    attachment: &Attachment,
    meta: &AttachmentMeta,
    room_id: &str,
    uploader: &dyn MediaUploader,
) -> MessagePart {
    let data = match attachment.read() {
        Ok(data) => data,
        Err(err) => return MessagePart::notice(format!("reading attachment failed: {err}")),
    };
    let mime_type = attachment.mime_type();

    let media = match uploader.upload(room_id, &data, &attachment.file_name, &mime_type) {
        Ok(media) => media,
        Err(err) => return MessagePart::notice(err.to_string()),
    };

    let mut part = MessagePart::text(attachment.file_name.clone());
    part.mime_type = Some(mime_type.clone());
    part.size = Some(data.len());
    part.url = Some(media.url);
    part.encryption = media.encryption;

    part.kind = if mime_type.starts_with("image/") {
        part.width = meta.width.map(|w| w as u32);
        part.height = meta.height.map(|h| h as u32);
        PartKind::Image
    } else if mime_type.starts_with("video/") {
        PartKind::Video
    } else if mime_type.starts_with("audio/") {
        if let Some(transcription) = meta.transcription.as_deref() {
            if !transcription.is_empty() {
                part.body = format!("{} | Transcript: {transcription}", part.body);
            }
        }
        PartKind::Audio
    } else {
        PartKind::File
    };
    part
}

/// Append the sticker-source annotation to an attachment part's body.
fn annotate_sticker(part: &mut MessagePart, attachment: &Attachment) {
    if !attachment.is_sticker {
        return;
    }
    match attachment.sticker_source {
        StickerSource::Genmoji => {
            if !attachment.emoji_image_short_description.is_empty() {
                part.body = format!(
                    "{} [Genmoji prompt: {}]",
                    part.body, attachment.emoji_image_short_description
                );
            }
        }
        StickerSource::Animoji | StickerSource::AnimojiJellyfish => {
            part.body = format!("{} [Animoji from Memoji]", part.body);
        }
        StickerSource::UserGenerated | StickerSource::None => {}
    }
}

fn assign_ids(mut parts: Vec<MessagePart>) -> Vec<MessagePart> {
    for (index, part) in parts.iter_mut().enumerate() {
        part.id = index.to_string();
    }
    parts
}

/// Render a non-negative duration as "N days N hours N minutes N seconds".
fn humanize_seconds(total_seconds: i64) -> String {
    if total_seconds < 0 {
        return String::new();
    }
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    let chunks = [
        ("day", days),
        ("hour", hours),
        ("minute", minutes),
        ("second", seconds),
    ];
    let mut parts = Vec::new();
    for (name, amount) in chunks {
        match amount {
            0 => continue,
            1 => parts.push(format!("1 {name}")),
            n => parts.push(format!("{n} {name}s")),
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::component::TextEffect;
    use crate::model::message::ItemType;
    use crate::render::part::NoopUploader;

    fn message_with_text(text: &str) -> Message {
        Message {
            attributed_body_text: text.to_string(),
            combined_components: vec![CombinedComponent::Text(vec![TextRangeEffect {
                start: 0,
                end: text.len(),
                effect: TextEffect::Default,
            }])],
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_text_message() {
        let message = message_with_text("Hello");
        let parts = convert_message(&message, "!room", &NoopUploader);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].kind, PartKind::Text);
        assert_eq!(parts[0].body, "Hello");
        assert_eq!(parts[0].formatted_body.as_deref(), Some("Hello"));
        assert_eq!(parts[0].id, "0");
    }

    #[test]
    fn test_unsupported_item_types() {
        let mut message = message_with_text("ignored");
        message.item_type = ItemType::SharePlay;
        let parts = convert_message(&message, "!room", &NoopUploader);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].kind, PartKind::Notice);
        assert!(parts[0].body.contains("Shareplay"));

        message.item_type = ItemType::LocationShare;
        let parts = convert_message(&message, "!room", &NoopUploader);
        assert!(parts[0].body.contains("Location Sharing"));
    }

    #[test]
    fn test_app_message_notice() {
        let mut message = message_with_text("ignored");
        message.balloon_bundle_id = "com.example.app".to_string();
        let parts = convert_message(&message, "!room", &NoopUploader);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, "unsupported App message");
        assert!(parts[0].unsupported);
    }

    #[test]
    fn test_fallback_to_subject_and_text() {
        let message = Message {
            subject: "Update".to_string(),
            text: "All good".to_string(),
            ..Default::default()
        };
        let parts = convert_message(&message, "!room", &NoopUploader);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, "**Update**\nAll good");
        assert_eq!(
            parts[0].formatted_body.as_deref(),
            Some("<strong>Update</strong><br>All good")
        );
    }

    #[test]
    fn test_missing_attachment_row_becomes_notice() {
        let message = Message {
            combined_components: vec![CombinedComponent::Attachment(AttachmentMeta::default())],
            ..Default::default()
        };
        let parts = convert_message(&message, "!room", &NoopUploader);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].kind, PartKind::Notice);
        assert_eq!(parts[0].body, "attachment does not exist");
    }

    #[test]
    fn test_fitness_prefix_stripped() {
        let text = format!("{FITNESS_RECEIVER}Ran 5k");
        let message = message_with_text(&text);
        let parts = convert_message(&message, "!room", &NoopUploader);
        assert_eq!(parts[0].formatted_body.as_deref(), Some("Ran 5k"));
    }

    #[test]
    fn test_edit_pairing_by_index() {
        let message = message_with_text("changed");
        let existing = vec!["0".to_string(), "1".to_string()];
        let edit = convert_edit(&message, &existing, "!room", &NoopUploader);
        assert_eq!(edit.modified.len(), 1);
        assert_eq!(edit.modified[0].0, "0");
        assert!(edit.added.is_empty());
        assert_eq!(edit.deleted, vec!["1".to_string()]);
    }

    #[test]
    fn test_edit_with_more_new_parts_adds() {
        let mut message = message_with_text("two");
        message
            .combined_components
            .push(CombinedComponent::Text(vec![TextRangeEffect {
                start: 0,
                end: 3,
                effect: TextEffect::Default,
            }]));
        let existing = vec!["0".to_string()];
        let edit = convert_edit(&message, &existing, "!room", &NoopUploader);
        assert_eq!(edit.modified.len(), 1);
        assert_eq!(edit.added.len(), 1);
        assert!(edit.deleted.is_empty());
    }

    #[test]
    fn test_humanize_seconds() {
        assert_eq!(humanize_seconds(0), "");
        assert_eq!(humanize_seconds(1), "1 second");
        assert_eq!(humanize_seconds(61), "1 minute 1 second");
        assert_eq!(humanize_seconds(3 * 86_400 + 2 * 3_600), "3 days 2 hours");
        assert_eq!(humanize_seconds(-5), "");
    }
}
