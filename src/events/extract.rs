//! Pulls the event JSON and optional picture out of a device request.
//!
//! Devices post `multipart/form-data` with the event as one text field and
//! snapshots as file parts. Field names vary across firmware, so the event
//! field is found by content rather than by name.

use serde_json::Value;
use tracing::debug;

use crate::error::{ListenerError, Result};

/// A single part of a multipart device request
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text { name: String, value: String },
    File(EventPicture),
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Classify a raw part: anything with a file name, or whose bytes are not
    /// UTF-8, is a file
    pub fn from_raw(
        name: Option<String>,
        file_name: Option<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let name = name.unwrap_or_default();
        if file_name.is_none() {
            match String::from_utf8(bytes) {
                Ok(value) => return Self::Text { name, value },
                Err(err) => {
                    return Self::File(EventPicture {
                        field_name: name,
                        file_name: None,
                        content_type,
                        bytes: err.into_bytes(),
                    })
                }
            }
        }
        Self::File(EventPicture {
            field_name: name,
            file_name,
            content_type,
            bytes,
        })
    }
}

/// Snapshot attached to an access event
#[derive(Debug, Clone, PartialEq)]
pub struct EventPicture {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl EventPicture {
    /// File extension from the file name, falling back to the content type
    pub fn extension(&self) -> &str {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
        if let Some(ext) = from_name {
            return ext;
        }
        match self.content_type.as_deref() {
            Some("image/png") => "png",
            Some("image/bmp") => "bmp",
            _ => "jpg",
        }
    }
}

/// Event JSON from the first non-file field that mentions `eventType`
pub fn extract_event_data(parts: &[FormPart]) -> Result<Value> {
    let json_string = parts
        .iter()
        .find_map(|part| match part {
            FormPart::Text { value, .. } if value.contains("eventType") => Some(value.as_str()),
            _ => None,
        })
        .ok_or_else(|| ListenerError::validation("Invalid event data"))?;

    debug!("Extracted JSON string: {}", json_string);
    parse_event_json(json_string.as_bytes())
}

/// First file part, if the device attached one
pub fn extract_picture(parts: &[FormPart]) -> Option<EventPicture> {
    parts.iter().find_map(|part| match part {
        FormPart::File(picture) => Some(picture.clone()),
        FormPart::Text { .. } => None,
    })
}

/// Parse a raw JSON body
pub fn parse_event_json(body: &[u8]) -> Result<Value> {
    serde_json::from_slice(body)
        .map_err(|e| ListenerError::validation(format!("Invalid event JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picture() -> FormPart {
        FormPart::File(EventPicture {
            field_name: "Picture".to_string(),
            file_name: Some("snapshot.jpg".to_string()),
            content_type: Some("image/jpeg".to_string()),
            bytes: vec![0xff, 0xd8, 0xff],
        })
    }

    #[test]
    fn test_picks_first_field_with_event_type() {
        let parts = vec![
            FormPart::text("boundary", "noise"),
            picture(),
            FormPart::text("event_log", r#"{"eventType":"heartBeat","n":1}"#),
            FormPart::text("other", r#"{"eventType":"heartBeat","n":2}"#),
        ];
        let value = extract_event_data(&parts).unwrap();
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn test_missing_event_field_is_invalid() {
        let parts = vec![FormPart::text("a", "{}"), picture()];
        let err = extract_event_data(&parts).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Invalid event data");
    }

    #[test]
    fn test_malformed_json_is_validation_error() {
        let parts = vec![FormPart::text("event_log", r#"{"eventType": "#)];
        assert!(extract_event_data(&parts).unwrap_err().is_validation());
    }

    #[test]
    fn test_binary_part_without_file_name_is_a_file() {
        let part = FormPart::from_raw(Some("Picture".into()), None, None, vec![0xff, 0xfe]);
        assert!(matches!(part, FormPart::File(_)));
        let part = FormPart::from_raw(Some("event_log".into()), None, None, b"{}".to_vec());
        assert!(matches!(part, FormPart::Text { .. }));
    }

    #[test]
    fn test_extract_picture_and_extension() {
        let parts = vec![FormPart::text("event_log", "{}"), picture()];
        let pic = extract_picture(&parts).unwrap();
        assert_eq!(pic.extension(), "jpg");

        let png = EventPicture {
            field_name: "Picture".into(),
            file_name: None,
            content_type: Some("image/png".into()),
            bytes: vec![],
        };
        assert_eq!(png.extension(), "png");
    }
}
