//! Per-part edit status and edit history from the summary-info plist.
//!
//! The summary-info blob carries three top-level keys: `otr` (one entry per
//! message part), `ec` (edit chains keyed by stringified part index) and
//! `rp` (indices of unsent parts). Each edit event embeds a typedstream of
//! the replacement text.

use crate::error::{PlistError, Result};
use crate::parser::archivable::{text_from_components, Archivable};
use crate::parser::plist::{as_array, as_bytes, as_f64, as_map, as_string, decode_dictionary};
use crate::parser::typedstream::decode_components;

/// Edit state of a single message part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStatus {
    Original,
    Edited,
    Unsent,
}

/// One part of a (possibly multi-part) message, with its edit history in
/// chronological order.
#[derive(Debug, Clone)]
pub struct EditedMessagePart {
    pub status: EditStatus,
    pub edit_history: Vec<EditedEvent>,
}

/// One revision of an edited part.
#[derive(Debug, Clone)]
pub struct EditedEvent {
    /// Nanoseconds since the platform epoch.
    pub date_ns: i64,
    /// Replacement text, when the revision's typedstream held one.
    pub text: Option<String>,
    pub components: Vec<Archivable>,
    pub guid: Option<String>,
}

/// Event timestamps are stored in seconds; dates elsewhere in nanoseconds.
const TIMESTAMP_FACTOR: i64 = 1_000_000_000;

/// Extract the per-part edit state from a `message_summary_info` blob.
///
/// The result has one entry per `otr` entry; parts default to
/// [`EditStatus::Original`]. A missing `ec` or `rp` key is not an error;
/// a type mismatch on any required key inside them is.
pub fn edited_parts_from_summary_info(summary_info: &[u8]) -> Result<Vec<EditedMessagePart>> {
    let dictionary = decode_dictionary(summary_info)?;

    let otr = as_map(&dictionary, "otr")?;
    let mut parts: Vec<EditedMessagePart> = (0..otr.len())
        .map(|_| EditedMessagePart {
            status: EditStatus::Original,
            edit_history: Vec::new(),
        })
        .collect();

    if let Ok(edit_chains) = as_map(&dictionary, "ec") {
        for (key, value) in edit_chains.iter() {
            let events = value
                .as_array()
                .ok_or_else(|| PlistError::wrong_type(key, "array"))?;
            let part_index: usize = key
                .parse()
                .map_err(|_| PlistError::wrong_type(key, "numeric part index"))?;

            for event in events {
                let data = event
                    .as_dictionary()
                    .ok_or_else(|| PlistError::wrong_type(key, "dictionary of events"))?;

                let timestamp = as_f64(data, "d")?;
                let date_ns = (timestamp as i64) * TIMESTAMP_FACTOR;

                let stream = as_bytes(data, "t")?;
                let components = decode_components(stream)?;
                let text = text_from_components(&components).map(String::from);
                let guid = as_string(data, "bcg").ok().map(String::from);

                if let Some(part) = parts.get_mut(part_index) {
                    part.status = EditStatus::Edited;
                    part.edit_history.push(EditedEvent {
                        date_ns,
                        text,
                        components,
                        guid,
                    });
                }
            }
        }
    }

    if let Ok(retracted) = as_array(&dictionary, "rp") {
        for (index, entry) in retracted.iter().enumerate() {
            let unsent_index = entry
                .as_unsigned_integer()
                .ok_or_else(|| PlistError::wrong_type(&format!("rp[{index}]"), "unsigned integer"))?;
            if let Some(part) = parts.get_mut(unsent_index as usize) {
                part.status = EditStatus::Unsent;
            }
        }
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::string_stream;
    use plist::{Dictionary, Value};

    /// Serialize a summary-info dictionary to binary plist bytes.
    fn summary_blob(
        part_count: usize,
        edits: &[(&str, Vec<(f64, Vec<u8>, Option<&str>)>)],
        unsent: &[u64],
    ) -> Vec<u8> {
        let mut root = Dictionary::new();

        let mut otr = Dictionary::new();
        for i in 0..part_count {
            otr.insert(i.to_string(), Value::Integer(0u64.into()));
        }
        root.insert("otr".into(), Value::Dictionary(otr));

        if !edits.is_empty() {
            let mut ec = Dictionary::new();
            for (key, events) in edits {
                let array = events
                    .iter()
                    .map(|(d, t, bcg)| {
                        let mut event = Dictionary::new();
                        event.insert("d".into(), Value::Real(*d));
                        event.insert("t".into(), Value::Data(t.clone()));
                        if let Some(guid) = bcg {
                            event.insert("bcg".into(), Value::String((*guid).into()));
                        }
                        Value::Dictionary(event)
                    })
                    .collect();
                ec.insert((*key).into(), Value::Array(array));
            }
            root.insert("ec".into(), Value::Dictionary(ec));
        }

        if !unsent.is_empty() {
            let array = unsent
                .iter()
                .map(|&i| Value::Integer(i.into()))
                .collect();
            root.insert("rp".into(), Value::Array(array));
        }

        let mut buf = Vec::new();
        Value::Dictionary(root).to_writer_binary(std::io::Cursor::new(&mut buf)).unwrap();
        buf
    }

    #[test]
    fn test_parts_default_to_original() {
        let blob = summary_blob(3, &[], &[]);
        let parts = edited_parts_from_summary_info(&blob).unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.status == EditStatus::Original));
        assert!(parts.iter().all(|p| p.edit_history.is_empty()));
    }

    #[test]
    fn test_edit_chain_sets_status_and_history() {
        let stream = string_stream("fixed");
        let blob = summary_blob(
            2,
            &[("1", vec![(740000000.0, stream, Some("G"))])],
            &[],
        );
        let parts = edited_parts_from_summary_info(&blob).unwrap();
        assert_eq!(parts[0].status, EditStatus::Original);
        assert_eq!(parts[1].status, EditStatus::Edited);
        assert_eq!(parts[1].edit_history.len(), 1);
        let event = &parts[1].edit_history[0];
        assert_eq!(event.date_ns, 740000000 * TIMESTAMP_FACTOR);
        assert_eq!(event.text.as_deref(), Some("fixed"));
        assert_eq!(event.guid.as_deref(), Some("G"));
    }

    #[test]
    fn test_unsent_indices_mark_parts() {
        let blob = summary_blob(3, &[], &[1]);
        let parts = edited_parts_from_summary_info(&blob).unwrap();
        assert_eq!(parts[0].status, EditStatus::Original);
        assert_eq!(parts[1].status, EditStatus::Unsent);
        assert_eq!(parts[2].status, EditStatus::Original);
    }

    #[test]
    fn test_out_of_range_indices_ignored() {
        let stream = string_stream("late");
        let blob = summary_blob(1, &[("7", vec![(1.0, stream, None)])], &[9]);
        let parts = edited_parts_from_summary_info(&blob).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].status, EditStatus::Original);
    }

    #[test]
    fn test_missing_otr_is_fatal() {
        let mut root = Dictionary::new();
        root.insert("rp".into(), Value::Array(vec![]));
        let mut buf = Vec::new();
        Value::Dictionary(root).to_writer_binary(std::io::Cursor::new(&mut buf)).unwrap();
        assert!(edited_parts_from_summary_info(&buf).is_err());
    }
}
