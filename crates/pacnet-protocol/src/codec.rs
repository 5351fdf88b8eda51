//! The wire codec: one comma-separated text record per frame.
//!
//! ```text
//! TAG,field1,field2,...
//! START,classic,0~1~1~human,red~9~5~greedy
//! ```
//!
//! The codec is purely syntactic. It neither knows how many fields a tag
//! needs nor escapes separators; a field must not contain `,`, and grouped
//! sub-records use `~` instead.

use std::fmt;

/// Separates fields within a frame.
pub const FIELD_SEPARATOR: char = ',';

/// Separates the parts of a grouped sub-record such as a `START` entry.
pub const RECORD_SEPARATOR: char = '~';

/// One complete protocol message as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame(String);

impl Frame {
    /// Wraps already-encoded text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Returns the encoded text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the frame, returning the encoded text.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Splits the frame. See [`decode`].
    pub fn decode(&self) -> Option<(&str, Vec<&str>)> {
        decode(&self.0)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl AsRef<str> for Frame {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Joins a tag and its fields into a frame.
pub fn encode<I, S>(tag: &str, fields: I) -> Frame
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::from(tag);
    for field in fields {
        let field = field.as_ref();
        debug_assert!(
            !field.contains(FIELD_SEPARATOR),
            "field {field:?} contains the field separator"
        );
        text.push(FIELD_SEPARATOR);
        text.push_str(field);
    }
    Frame(text)
}

/// Splits a frame into its tag and fields.
///
/// Returns `None` for an empty frame, which the controller ignores.
pub fn decode(frame: &str) -> Option<(&str, Vec<&str>)> {
    if frame.is_empty() {
        return None;
    }
    let mut parts = frame.split(FIELD_SEPARATOR);
    let tag = parts.next()?;
    Some((tag, parts.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_joins_with_commas() {
        let frame = encode("LOCATION", ["red", "4", "7"]);
        assert_eq!(frame.as_str(), "LOCATION,red,4,7");
    }

    #[test]
    fn test_encode_without_fields_is_just_the_tag() {
        let frame = encode("HURRY", std::iter::empty::<&str>());
        assert_eq!(frame.as_str(), "HURRY");
    }

    #[test]
    fn test_decode_splits_tag_and_fields() {
        let (tag, fields) = decode("SELECT_FAIL,red,10.0.0.2:4000").unwrap();
        assert_eq!(tag, "SELECT_FAIL");
        assert_eq!(fields, vec!["red", "10.0.0.2:4000"]);
    }

    #[test]
    fn test_decode_empty_frame_is_none() {
        assert!(decode("").is_none());
    }

    #[test]
    fn test_decode_keeps_empty_fields() {
        let (tag, fields) = decode("MAP,").unwrap();
        assert_eq!(tag, "MAP");
        assert_eq!(fields, vec![""]);
    }

    #[test]
    fn test_decode_leaves_record_separator_alone() {
        let (_, fields) = decode("START,classic,0~1~1~human").unwrap();
        assert_eq!(fields, vec!["classic", "0~1~1~human"]);
    }

    #[test]
    fn test_decode_inverts_encode_for_separator_free_fields() {
        let samples: &[(&str, &[&str])] = &[
            ("CONFIRM", &[]),
            ("DIE", &["0", "2"]),
            ("START", &["maze-2", "pinky~3~-1~dfs", "1~0~0~human"]),
            ("SCARE", &["", "7000"]),
        ];
        for (tag, fields) in samples {
            let frame = encode(tag, fields.iter());
            let (decoded_tag, decoded_fields) = frame.decode().unwrap();
            assert_eq!(decoded_tag, *tag);
            assert_eq!(decoded_fields, fields.to_vec());
        }
    }
}
