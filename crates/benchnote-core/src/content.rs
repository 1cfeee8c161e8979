//! Comment payloads and content-kind classification.
//!
//! Every comment revision stores the kind it was classified as at write
//! time, so historical revisions keep their classification even if the
//! heuristic changes later. The wire codes are therefore stable:
//!
//! | kind     | code |
//! |----------|------|
//! | markdown | 1    |
//! | plain    | 2    |
//! | jpg      | 4    |
//! | png      | 5    |
//! | table    | 6    |
//!
//! Code 3 belonged to a retired kind and must never be reused.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Text payloads longer than this many characters are never treated as
/// a candidate file location. This is a disambiguation heuristic
/// between "long free text" and "path to a file", not a content
/// sniffer; do not change the threshold without flagging it as a
/// behavior change.
pub const LOCATION_CANDIDATE_MAX: usize = 256;

/// The closed set of content kinds a comment revision can classify as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ContentKind {
    Markdown,
    Plain,
    Jpg,
    Png,
    Table,
}

impl ContentKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Plain => "plain",
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Table => "table",
        }
    }

    /// Stable persisted code for this kind.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Markdown => 1,
            Self::Plain => 2,
            Self::Jpg => 4,
            Self::Png => 5,
            Self::Table => 6,
        }
    }

    /// Returns `true` for kinds whose content is a reference to an
    /// image file rather than inline text.
    #[must_use]
    pub const fn is_image(self) -> bool {
        matches!(self, Self::Jpg | Self::Png)
    }
}

impl From<ContentKind> for u8 {
    fn from(kind: ContentKind) -> Self {
        kind.code()
    }
}

/// Error returned when decoding an unknown content-kind code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown content-kind code: {0}")]
pub struct UnknownKindCode(pub u8);

impl TryFrom<u8> for ContentKind {
    type Error = UnknownKindCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Markdown),
            2 => Ok(Self::Plain),
            4 => Ok(Self::Jpg),
            5 => Ok(Self::Png),
            6 => Ok(Self::Table),
            other => Err(UnknownKindCode(other)),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured tabular payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// The payload of one comment revision: free text (possibly naming a
/// file location) or a structured table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommentContent {
    Text(String),
    Table(Table),
}

impl CommentContent {
    /// The textual form of the payload, if it has one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Table(_) => None,
        }
    }
}

impl From<&str> for CommentContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CommentContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Table> for CommentContent {
    fn from(t: Table) -> Self {
        Self::Table(t)
    }
}

/// Classify a comment payload into a [`ContentKind`].
///
/// Tables always classify as [`ContentKind::Table`]. Text longer than
/// [`LOCATION_CANDIDATE_MAX`] characters classifies as plain outright,
/// which avoids treating long prose as a path. Shorter text is treated
/// as a candidate location and classified by extension.
#[must_use]
pub fn classify(content: &CommentContent) -> ContentKind {
    match content {
        CommentContent::Table(_) => ContentKind::Table,
        CommentContent::Text(text) => {
            // Characters, not bytes: a short multibyte payload is still
            // a location candidate.
            if text.chars().count() > LOCATION_CANDIDATE_MAX {
                return ContentKind::Plain;
            }
            classify_location(Path::new(text))
        }
    }
}

/// Classify a payload already known to be a file location.
///
/// Unlike [`classify`], no length check applies: recognized extensions
/// (`md`, `jpg`/`jpeg`, `png`) map to their kinds, anything else falls
/// back to plain.
#[must_use]
pub fn classify_location(location: &Path) -> ContentKind {
    match location.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => match ext.to_ascii_lowercase().as_str() {
            "md" => ContentKind::Markdown,
            "jpg" | "jpeg" => ContentKind::Jpg,
            "png" => ContentKind::Png,
            _ => ContentKind::Plain,
        },
        None => ContentKind::Plain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn table_payload_classifies_as_table() {
        let table = Table {
            columns: vec!["t".into(), "v".into()],
            rows: vec![vec!["0".into(), "1.2".into()]],
        };
        assert_eq!(classify(&table.into()), ContentKind::Table);
    }

    #[test]
    fn long_text_is_plain_even_with_known_suffix() {
        let long = format!("{}.png", "a".repeat(300));
        assert_eq!(classify(&long.into()), ContentKind::Plain);
    }

    #[test]
    fn threshold_counts_characters_not_bytes() {
        // 200 characters but 600+ bytes: still a location candidate.
        let multibyte = format!("{}.png", "µ".repeat(196));
        assert!(multibyte.len() > LOCATION_CANDIDATE_MAX);
        assert_eq!(classify(&multibyte.into()), ContentKind::Png);
    }

    #[test]
    fn short_text_classifies_by_extension() {
        assert_eq!(
            classify(&"data/trace.png".into()),
            ContentKind::Png
        );
        assert_eq!(classify(&"notes.md".into()), ContentKind::Markdown);
        assert_eq!(classify(&"scan.jpg".into()), ContentKind::Jpg);
    }

    #[test]
    fn unknown_or_missing_extension_falls_back_to_plain() {
        assert_eq!(classify(&"data/trace.xyz".into()), ContentKind::Plain);
        assert_eq!(classify(&"just a sentence".into()), ContentKind::Plain);
        assert_eq!(classify(&String::new().into()), ContentKind::Plain);
    }

    #[test]
    fn location_classification_skips_length_check() {
        let deep = format!("{}/plot.png", "sub/".repeat(100));
        assert_eq!(
            classify_location(Path::new(&deep)),
            ContentKind::Png
        );
    }

    #[test]
    fn wire_codes_are_stable() {
        assert_eq!(ContentKind::Markdown.code(), 1);
        assert_eq!(ContentKind::Plain.code(), 2);
        assert_eq!(ContentKind::Jpg.code(), 4);
        assert_eq!(ContentKind::Png.code(), 5);
        assert_eq!(ContentKind::Table.code(), 6);
    }

    #[test]
    fn code_3_stays_retired() {
        assert_eq!(ContentKind::try_from(3), Err(UnknownKindCode(3)));
    }

    #[test]
    fn kind_roundtrips_through_code() {
        for kind in [
            ContentKind::Markdown,
            ContentKind::Plain,
            ContentKind::Jpg,
            ContentKind::Png,
            ContentKind::Table,
        ] {
            assert_eq!(ContentKind::try_from(kind.code()), Ok(kind));
        }
    }

    #[test]
    fn image_kinds() {
        assert!(ContentKind::Jpg.is_image());
        assert!(ContentKind::Png.is_image());
        assert!(!ContentKind::Markdown.is_image());
        assert!(!ContentKind::Table.is_image());
    }

    proptest! {
        #[test]
        fn any_text_over_threshold_is_plain(
            body in ".{257,400}",
            ext in prop::sample::select(vec!["md", "png", "jpg", "xyz"]),
        ) {
            prop_assume!(body.chars().count() > LOCATION_CANDIDATE_MAX);
            let payload = format!("{body}.{ext}");
            prop_assert_eq!(classify(&payload.into()), ContentKind::Plain);
        }
    }
}
