//! Metadata block: `Key: value` lines mapped onto named fields.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use super::{FormatError, FormatErrorKind, Line};

/// Date formats accepted in the `Date` header, tried in order.
pub const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

/// Header keys that map onto record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKey {
    Title,
    Author,
    Editor,
    Date,
    Publisher,
    Copyright,
    Theme,
    Size,
}

impl MetadataKey {
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key.trim().to_ascii_lowercase().as_str() {
            "title" => MetadataKey::Title,
            "author" => MetadataKey::Author,
            "editor" => MetadataKey::Editor,
            "date" => MetadataKey::Date,
            "publisher" => MetadataKey::Publisher,
            "copyright" => MetadataKey::Copyright,
            "theme" => MetadataKey::Theme,
            "size" => MetadataKey::Size,
            _ => return None,
        })
    }
}

/// Parsed header. Unrecognized keys land in `ignored_keys` instead of
/// disappearing, so a misspelled `Autor:` is visible in the dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub editor: Option<String>,
    pub date: Option<String>,
    pub publisher: Option<String>,
    pub copyright: Option<String>,
    pub theme: Option<String>,
    pub size: Option<String>,
    pub ignored_keys: BTreeSet<String>,
    pub repeated_keys: Vec<String>,
}

impl Metadata {
    pub(crate) fn parse(lines: &[Line<'_>]) -> Result<Self, FormatError> {
        let mut meta = Metadata::default();

        for line in lines {
            let (key, value) = line
                .text
                .split_once(':')
                .filter(|(k, _)| is_key(k))
                .ok_or_else(|| FormatError::new(FormatErrorKind::MalformedMetadata, line.number))?;
            let key = key.trim();
            let value = value.trim().to_string();

            let Some(known) = MetadataKey::from_key(key) else {
                meta.ignored_keys.insert(key.to_string());
                continue;
            };
            if meta.slot(known).replace(value).is_some() {
                meta.repeated_keys.push(key.to_string());
            }
        }

        Ok(meta)
    }

    fn slot(&mut self, key: MetadataKey) -> &mut Option<String> {
        match key {
            MetadataKey::Title => &mut self.title,
            MetadataKey::Author => &mut self.author,
            MetadataKey::Editor => &mut self.editor,
            MetadataKey::Date => &mut self.date,
            MetadataKey::Publisher => &mut self.publisher,
            MetadataKey::Copyright => &mut self.copyright,
            MetadataKey::Theme => &mut self.theme,
            MetadataKey::Size => &mut self.size,
        }
    }
}

/// Whether a line is shaped like `Key: value`.
pub fn looks_like_metadata(line: &str) -> bool {
    line.split_once(':').is_some_and(|(k, _)| is_key(k))
}

fn is_key(key: &str) -> bool {
    let key = key.trim();
    key.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
}

/// Parse a header date with the first matching format.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}
