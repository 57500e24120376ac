//! Walks a decoded attributed body, pairing range descriptors with
//! attribute dictionaries to produce combined components.
//!
//! Stored ranges count user-visible characters; the walker translates them
//! to byte offsets through a character-index table before they reach the
//! renderer.

use crate::model::component::{
    keys, AnimationType, AttachmentMeta, CombinedComponent, ConversionType, Style, TextEffect,
    TextRangeEffect,
};
use crate::parser::archivable::Archivable;

/// Outcome of interpreting one range's attribute dictionary.
enum ComponentResult {
    /// A standalone component; never coalesces with its neighbors.
    New(CombinedComponent),
    /// A text effect that extends the preceding text component.
    Continuation(TextRangeEffect),
}

/// Convert the decoded component list plus its body string into combined
/// components (attachments and styled text; retractions are merged in later
/// from the summary info).
///
/// Index 0 holds the raw string; subsequent entries alternate between range
/// descriptors and optional attribute dictionaries.
pub fn combine_components(components: &[Archivable], text: &str) -> Vec<CombinedComponent> {
    // Map character positions to byte offsets once; the stored ranges
    // address code points, not bytes.
    let char_index_table: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();

    let mut combined: Vec<CombinedComponent> = Vec::new();
    let mut component_index = 1;
    let mut current_end = 0usize;

    while component_index < components.len() {
        let Some((_, length)) = components[component_index].range() else {
            component_index += 1;
            continue;
        };
        let current_start = current_end;
        current_end += length as usize;
        component_index += 1;

        let number_attributes = components
            .get(component_index)
            .map(Archivable::dictionary_len)
            .unwrap_or(0);
        if number_attributes > 0 {
            component_index += 1;
        }

        let selected = dictionary_objects(components, component_index, number_attributes);
        match interpret_dictionary(selected, text, current_start, current_end, &char_index_table) {
            Some(ComponentResult::New(component)) => combined.push(component),
            Some(ComponentResult::Continuation(effect)) => match combined.last_mut() {
                Some(CombinedComponent::Text(effects)) => effects.push(effect),
                _ => combined.push(CombinedComponent::Text(vec![effect])),
            },
            None => {}
        }
        component_index += selected.len();
    }
    combined
}

/// Slice out a dictionary's components: exactly `count` entries, stopping
/// early if a ranged component interrupts the run.
fn dictionary_objects(components: &[Archivable], start: usize, count: usize) -> &[Archivable] {
    if count == 0 || start >= components.len() {
        return &components[..0];
    }
    let cap = (start + count).min(components.len());
    let mut end = start;
    while end < cap && components[end].range().is_none() {
        end += 1;
    }
    &components[start..end]
}

/// Translate a character position to a byte offset, clamping past-the-end
/// positions to the string length.
fn byte_offset(position: usize, table: &[usize], text: &str) -> usize {
    table.get(position).copied().unwrap_or(text.len())
}

/// Recognize the attribute dictionary of one range and produce its
/// component. An empty dictionary yields a default-styled run.
fn interpret_dictionary(
    selected: &[Archivable],
    text: &str,
    start: usize,
    end: usize,
    char_index_table: &[usize],
) -> Option<ComponentResult> {
    let range_start = byte_offset(start, char_index_table, text);
    let range_end = byte_offset(end, char_index_table, text);
    let effect_at = |effect: TextEffect| {
        ComponentResult::Continuation(TextRangeEffect {
            start: range_start,
            end: range_end,
            effect,
        })
    };

    for (index, component) in selected.iter().enumerate() {
        let Some(key_name) = component.as_string() else {
            continue;
        };
        match key_name {
            keys::FILE_TRANSFER_GUID => {
                let meta = attachment_meta(selected)?;
                return Some(ComponentResult::New(CombinedComponent::Attachment(meta)));
            }
            keys::MENTION_CONFIRMED => {
                let mention = selected
                    .get(index + 1)?
                    .as_string()
                    .unwrap_or_default()
                    .to_string();
                return Some(effect_at(TextEffect::Mention(mention)));
            }
            keys::LINK => {
                let link = selected
                    .get(index + 2)?
                    .as_string()
                    .unwrap_or("#")
                    .to_string();
                return Some(effect_at(TextEffect::Link(link)));
            }
            keys::ONE_TIME_CODE => {
                return Some(effect_at(TextEffect::OneTimeCode));
            }
            keys::CALENDAR_EVENT => {
                return Some(effect_at(TextEffect::Conversion(ConversionType::Timezone)));
            }
            keys::TEXT_BOLD | keys::TEXT_UNDERLINE | keys::TEXT_ITALIC
            | keys::TEXT_STRIKETHROUGH => {
                return Some(effect_at(TextEffect::Styles(resolve_styles(selected))));
            }
            keys::TEXT_EFFECT => {
                let animation = selected.get(index + 1)?.as_i64().unwrap_or(0);
                return Some(effect_at(TextEffect::Animation(AnimationType::from_i64(
                    animation,
                ))));
            }
            _ => continue,
        }
    }

    Some(effect_at(TextEffect::Default))
}

/// Collect every style flag present in a dictionary's components.
fn resolve_styles(components: &[Archivable]) -> Vec<Style> {
    let mut resolved = Vec::new();
    for component in components {
        let Some(key_name) = component.as_string() else {
            continue;
        };
        match key_name {
            keys::TEXT_BOLD => resolved.push(Style::Bold),
            keys::TEXT_UNDERLINE => resolved.push(Style::Underline),
            keys::TEXT_ITALIC => resolved.push(Style::Italic),
            keys::TEXT_STRIKETHROUGH => resolved.push(Style::Strikethrough),
            _ => {}
        }
    }
    resolved
}

/// Scan a dictionary for attachment metadata keyed by the fixed key names.
///
/// Returns `None` when a key has no following value component.
pub fn attachment_meta(components: &[Archivable]) -> Option<AttachmentMeta> {
    let mut meta = AttachmentMeta::default();
    for (index, component) in components.iter().enumerate() {
        let Some(key_name) = component.as_string() else {
            continue;
        };
        let is_meta_key = matches!(
            key_name,
            keys::FILE_TRANSFER_GUID
                | keys::AUDIO_TRANSCRIPTION
                | keys::INLINE_MEDIA_HEIGHT
                | keys::INLINE_MEDIA_WIDTH
                | keys::FILENAME
        );
        if !is_meta_key {
            continue;
        }
        let next = components.get(index + 1)?;
        match key_name {
            keys::FILE_TRANSFER_GUID => meta.guid = next.as_string().map(String::from),
            keys::AUDIO_TRANSCRIPTION => meta.transcription = next.as_string().map(String::from),
            keys::INLINE_MEDIA_HEIGHT => meta.height = next.as_f64(),
            keys::INLINE_MEDIA_WIDTH => meta.width = next.as_f64(),
            keys::FILENAME => meta.name = next.as_string().map(String::from),
            _ => {}
        }
    }
    Some(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::archivable::text_from_components;
    use crate::parser::typedstream::decode_components;
    use crate::testutil::StreamBuilder;

    fn decode(bytes: Vec<u8>) -> Vec<Archivable> {
        decode_components(&bytes).unwrap()
    }

    #[test]
    fn test_plain_text_single_default_run() {
        let components = decode(StreamBuilder::new().string("Hello").range(0, 5).finish());
        let combined = combine_components(&components, "Hello");
        assert_eq!(
            combined,
            vec![CombinedComponent::Text(vec![TextRangeEffect {
                start: 0,
                end: 5,
                effect: TextEffect::Default,
            }])]
        );
    }

    #[test]
    fn test_bold_run_then_default() {
        let components = decode(
            StreamBuilder::new()
                .string("Hi there")
                .range(0, 2)
                .dictionary(1)
                .string(keys::TEXT_BOLD)
                .number_int(1)
                .range(2, 6)
                .finish(),
        );
        let text = text_from_components(&components).unwrap().to_string();
        let combined = combine_components(&components, &text);
        assert_eq!(
            combined,
            vec![CombinedComponent::Text(vec![
                TextRangeEffect {
                    start: 0,
                    end: 2,
                    effect: TextEffect::Styles(vec![Style::Bold]),
                },
                TextRangeEffect {
                    start: 2,
                    end: 8,
                    effect: TextEffect::Default,
                },
            ])]
        );
    }

    #[test]
    fn test_mention_uses_following_value() {
        let components = decode(
            StreamBuilder::new()
                .string("hey @ann")
                .range(0, 4)
                .range(4, 4)
                .dictionary(1)
                .string(keys::MENTION_CONFIRMED)
                .string("+15551234567")
                .finish(),
        );
        let combined = combine_components(&components, "hey @ann");
        let CombinedComponent::Text(effects) = &combined[0] else {
            panic!("expected text component");
        };
        assert_eq!(effects.len(), 2);
        assert_eq!(
            effects[1].effect,
            TextEffect::Mention("+15551234567".to_string())
        );
        assert_eq!(effects[1].start, 4);
        assert_eq!(effects[1].end, 8);
    }

    #[test]
    fn test_attachment_component_with_meta() {
        let components = decode(
            StreamBuilder::new()
                .string("\u{fffc}")
                .range(0, 1)
                .dictionary(3)
                .string(keys::FILE_TRANSFER_GUID)
                .string("AT-GUID-1")
                .string(keys::FILENAME)
                .string("photo.heic")
                .string(keys::INLINE_MEDIA_WIDTH)
                .number_double(640.0)
                .finish(),
        );
        let combined = combine_components(&components, "\u{fffc}");
        assert_eq!(combined.len(), 1);
        let CombinedComponent::Attachment(meta) = &combined[0] else {
            panic!("expected attachment component");
        };
        assert_eq!(meta.guid.as_deref(), Some("AT-GUID-1"));
        assert_eq!(meta.name.as_deref(), Some("photo.heic"));
        assert_eq!(meta.width, Some(640.0));
        assert_eq!(meta.height, None);
    }

    #[test]
    fn test_attachment_never_coalesces_with_text() {
        let components = decode(
            StreamBuilder::new()
                .string("\u{fffc} caption")
                .range(0, 1)
                .dictionary(1)
                .string(keys::FILE_TRANSFER_GUID)
                .string("AT-GUID-2")
                .range(1, 8)
                .finish(),
        );
        let combined = combine_components(&components, "\u{fffc} caption");
        assert_eq!(combined.len(), 2);
        assert!(matches!(combined[0], CombinedComponent::Attachment(_)));
        assert!(matches!(combined[1], CombinedComponent::Text(_)));
    }

    #[test]
    fn test_ranges_clamp_to_string_length() {
        let components = decode(
            StreamBuilder::new()
                .string("héllo")
                .range(0, 20)
                .finish(),
        );
        let text = "héllo";
        let combined = combine_components(&components, text);
        let CombinedComponent::Text(effects) = &combined[0] else {
            panic!("expected text component");
        };
        assert_eq!(effects[0].start, 0);
        assert_eq!(effects[0].end, text.len());
    }

    #[test]
    fn test_multibyte_offsets_translate_to_bytes() {
        // In "héllo", char 2 starts at byte 3.
        let components = decode(
            StreamBuilder::new()
                .string("héllo")
                .range(0, 2)
                .dictionary(1)
                .string(keys::TEXT_ITALIC)
                .number_int(1)
                .range(2, 3)
                .finish(),
        );
        let combined = combine_components(&components, "héllo");
        let CombinedComponent::Text(effects) = &combined[0] else {
            panic!("expected text component");
        };
        assert_eq!(effects[0].start, 0);
        assert_eq!(effects[0].end, 3);
        assert_eq!(effects[1].start, 3);
        assert_eq!(effects[1].end, 6);
    }

    #[test]
    fn test_animation_effect_value() {
        let components = decode(
            StreamBuilder::new()
                .string("boom")
                .range(0, 4)
                .dictionary(1)
                .string(keys::TEXT_EFFECT)
                .number_int(12)
                .finish(),
        );
        let combined = combine_components(&components, "boom");
        let CombinedComponent::Text(effects) = &combined[0] else {
            panic!("expected text component");
        };
        assert_eq!(
            effects[0].effect,
            TextEffect::Animation(AnimationType::Explode)
        );
    }

    #[test]
    fn test_unknown_keys_fall_back_to_default() {
        let components = decode(
            StreamBuilder::new()
                .string("plain")
                .range(0, 5)
                .dictionary(1)
                .string("__kIMBaseWritingDirectionAttributeName")
                .number_int(0)
                .finish(),
        );
        let combined = combine_components(&components, "plain");
        let CombinedComponent::Text(effects) = &combined[0] else {
            panic!("expected text component");
        };
        assert_eq!(effects[0].effect, TextEffect::Default);
    }

    #[test]
    fn test_adjacent_text_runs_coalesce() {
        let components = decode(
            StreamBuilder::new()
                .string("HelloWorld")
                .range(0, 5)
                .range(5, 5)
                .finish(),
        );
        let combined = combine_components(&components, "HelloWorld");
        assert_eq!(combined.len(), 1);
        let CombinedComponent::Text(effects) = &combined[0] else {
            panic!("expected text component");
        };
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].end, 5);
        assert_eq!(effects[1].start, 5);
    }

    #[test]
    fn test_dictionary_scan_stops_at_next_range() {
        let components = decode(
            StreamBuilder::new()
                .string("ab")
                .range(0, 1)
                .dictionary(3) // claims more entries than present
                .string(keys::TEXT_BOLD)
                .number_int(1)
                .range(1, 1)
                .finish(),
        );
        let combined = combine_components(&components, "ab");
        let CombinedComponent::Text(effects) = &combined[0] else {
            panic!("expected text component");
        };
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].effect, TextEffect::Styles(vec![Style::Bold]));
        assert_eq!(effects[1].effect, TextEffect::Default);
    }
}
