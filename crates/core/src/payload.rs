use serde_json::{Map, Value};

use crate::result::{FetchError, FetchResult};

/// Turns a raw message body into a result.
///
/// A JSON object becomes [`FetchResult::Structured`]. Anything else that is
/// valid UTF-8 (plain words, JSON scalars and arrays, malformed JSON) is kept
/// as [`FetchResult::Text`] without alteration. Only a body that cannot be
/// read as UTF-8 is reported as an error.
pub fn decode_payload(body: &[u8]) -> FetchResult {
    let text = match std::str::from_utf8(body) {
        Ok(text) => text,
        Err(e) => {
            return FetchResult::Error(FetchError::Decode(format!(
                "payload of {} bytes is not valid UTF-8 ({})",
                body.len(),
                e
            )))
        }
    };

    match serde_json::from_str::<Map<String, Value>>(text) {
        Ok(fields) => FetchResult::Structured(fields),
        Err(_) => FetchResult::Text(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_keeps_key_order() {
        let result = decode_payload(br#"{"temp": 21.5, "humidity": 40, "alarm": false}"#);
        let fields = match result {
            FetchResult::Structured(fields) => fields,
            other => panic!("expected structured payload, got {:?}", other),
        };
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["temp", "humidity", "alarm"]);
        assert_eq!(fields["temp"], json!(21.5));
        assert_eq!(fields["humidity"], json!(40));
    }

    #[test]
    fn test_plain_text_is_verbatim() {
        assert_eq!(decode_payload(b"ALIVE"), FetchResult::Text("ALIVE".into()));
        assert_eq!(
            decode_payload(b"  two\nlines \t"),
            FetchResult::Text("  two\nlines \t".into())
        );
    }

    #[test]
    fn test_json_that_is_not_an_object_is_text() {
        assert_eq!(decode_payload(b"42"), FetchResult::Text("42".into()));
        assert_eq!(decode_payload(b"[1,2]"), FetchResult::Text("[1,2]".into()));
        assert_eq!(decode_payload(b"{\"broken\": "), FetchResult::Text("{\"broken\": ".into()));
    }

    #[test]
    fn test_empty_object_is_structured() {
        assert_eq!(decode_payload(b"{}"), FetchResult::Structured(Map::new()));
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let result = decode_payload(&[0xff, 0xfe, 0x41]);
        assert!(matches!(result, FetchResult::Error(FetchError::Decode(_))));
    }
}
