use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

static HASHTAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").unwrap());

/// Where a record's hashtags come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Extraction {
    /// `doc.entities.hashtags[].text`
    #[default]
    Entities,
    /// `#word` matches in `doc.text`
    Text,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("unexpected record shape: {0}")]
    Shape(#[source] serde_json::Error),
}

impl From<serde_json::Error> for RecordError {
    fn from(e: serde_json::Error) -> Self {
        match e.classify() {
            serde_json::error::Category::Data => RecordError::Shape(e),
            _ => RecordError::Malformed(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub text: String,
    pub lang: String,
    pub hashtags: Vec<String>,
}

#[derive(Deserialize)]
struct Row<D> {
    doc: D,
}

#[derive(Deserialize)]
struct EntitiesDoc {
    #[serde(default)]
    text: String,
    lang: String,
    entities: Entities,
}

#[derive(Deserialize)]
struct Entities {
    hashtags: Vec<HashtagEntity>,
}

#[derive(Deserialize)]
struct HashtagEntity {
    text: String,
}

#[derive(Deserialize)]
struct TextDoc {
    text: String,
    lang: String,
}

impl Record {
    /// Parses one prepared line (see [`trim_line`]).
    pub fn parse(line: &[u8], extraction: Extraction) -> Result<Record, RecordError> {
        match extraction {
            Extraction::Entities => {
                let row: Row<EntitiesDoc> = serde_json::from_slice(line)?;
                Ok(Record {
                    text: row.doc.text,
                    lang: row.doc.lang,
                    hashtags: row
                        .doc
                        .entities
                        .hashtags
                        .into_iter()
                        .map(|h| h.text)
                        .collect(),
                })
            }
            Extraction::Text => {
                let row: Row<TextDoc> = serde_json::from_slice(line)?;
                let hashtags = hashtags_in(&row.doc.text);
                Ok(Record {
                    text: row.doc.text,
                    lang: row.doc.lang,
                    hashtags,
                })
            }
        }
    }
}

pub fn hashtags_in(text: &str) -> Vec<String> {
    HASHTAG_PATTERN
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Hashtags compare case-insensitively.
pub fn normalize_hashtag(raw: &str) -> String {
    raw.to_lowercase()
}

/// Strips the line terminator, surrounding whitespace and the trailing comma
/// rows carry inside a JSON array dump.
pub fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.trim_ascii();
    line.strip_suffix(b",").unwrap_or(line).trim_ascii_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entities() {
        let line = br##"{"id":"1","doc":{"text":"hi #Rust","lang":"en","entities":{"hashtags":[{"text":"Rust","indices":[3,8]},{"text":"MPI"}]}}}"##;
        let record = Record::parse(line, Extraction::Entities).unwrap();

        assert_eq!(record.lang, "en");
        assert_eq!(record.hashtags, vec!["Rust", "MPI"]);
        assert_eq!(record.text, "hi #Rust");
    }

    #[test]
    fn test_parse_entities_without_text() {
        let line = br#"{"doc":{"lang":"fr","entities":{"hashtags":[]}}}"#;
        let record = Record::parse(line, Extraction::Entities).unwrap();

        assert_eq!(record.lang, "fr");
        assert!(record.hashtags.is_empty());
    }

    #[test]
    fn test_parse_text_pattern() {
        let line = br##"{"doc":{"text":"#Melbourne rain again #auspol, #2020!","lang":"en"}}"##;
        let record = Record::parse(line, Extraction::Text).unwrap();

        assert_eq!(record.hashtags, vec!["Melbourne", "auspol", "2020"]);
    }

    #[test]
    fn test_malformed_and_shape_errors() {
        assert!(matches!(
            Record::parse(b"{\"doc\": ", Extraction::Entities),
            Err(RecordError::Malformed(_))
        ));
        assert!(matches!(
            Record::parse(b"not json", Extraction::Text),
            Err(RecordError::Malformed(_))
        ));
        assert!(matches!(
            Record::parse(br#"{"doc":{"lang":"en"}}"#, Extraction::Entities),
            Err(RecordError::Shape(_))
        ));
        assert!(matches!(
            Record::parse(br#"{"doc":{"text":"x","lang":7}}"#, Extraction::Text),
            Err(RecordError::Shape(_))
        ));
        assert!(matches!(
            Record::parse(&[0xff, 0xfe], Extraction::Text),
            Err(RecordError::Malformed(_))
        ));
    }

    #[test]
    fn test_trim_line() {
        assert_eq!(trim_line(b"{\"a\":1},\n"), b"{\"a\":1}");
        assert_eq!(trim_line(b"{\"a\":1}\r\n"), b"{\"a\":1}");
        assert_eq!(trim_line(b"  \n"), b"");
        assert_eq!(trim_line(b"]}"), b"]}");
    }

    #[test]
    fn test_normalize_hashtag() {
        assert_eq!(normalize_hashtag("Foo"), "foo");
        assert_eq!(normalize_hashtag("ÉTÉ"), "été");
    }
}
