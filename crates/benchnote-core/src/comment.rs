//! Versioned comment logs.
//!
//! A [`CommentLog`] is the full history of one logical comment: an
//! append-only sequence of [`Revision`] records. Revisions are never
//! removed; "deleting" a comment only flips the `deleted` flag so the
//! history survives. The current version is resolved by timestamp, not
//! by append position — see [`CommentLog::latest`].

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::clock::{parse_stamp, Clock};
use crate::content::{classify, CommentContent, ContentKind};

/// One timestamped, authored version of a comment's content.
///
/// The kind recorded here is the classification at write time; it is
/// persisted alongside the content so historical revisions keep their
/// classification even if the heuristic changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub content: CommentContent,
    pub kind: ContentKind,
    pub author: String,
    pub timestamp: String,
}

/// Two revisions in one log share an identical timestamp.
///
/// A single comment cannot be edited at the exact instant it was
/// created, so a duplicate stamp means two distinct comments were
/// merged into one log — a data-integrity error, never resolved
/// silently in favor of either revision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("comment {comment_id} has multiple revisions stamped {timestamp}")]
pub struct DuplicateTimestamp {
    pub comment_id: Uuid,
    pub timestamp: String,
}

/// The append-only history of one logical comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentLog {
    pub id: Uuid,
    pub creation_user: String,
    pub created_at: String,
    pub deleted: bool,
    pub revisions: Vec<Revision>,
}

impl CommentLog {
    /// Create a log with a single classified revision. Always succeeds.
    #[must_use]
    pub fn create(content: CommentContent, author: &str, clock: &Clock) -> Self {
        let kind = classify(&content);
        let stamp = clock.now_stamp();
        Self {
            id: Uuid::new_v4(),
            creation_user: author.to_string(),
            created_at: stamp.clone(),
            deleted: false,
            revisions: vec![Revision {
                content,
                kind,
                author: author.to_string(),
                timestamp: stamp,
            }],
        }
    }

    /// Append a new revision with a fresh stamp and re-classified kind,
    /// unless both the content and the author match the most recently
    /// appended revision — identical resubmission is a silent no-op, so
    /// retried requests cannot duplicate history.
    pub fn modify(&mut self, content: CommentContent, author: &str, clock: &Clock) {
        if let Some(last) = self.revisions.last() {
            if last.content == content && last.author == author {
                return;
            }
        }
        let kind = classify(&content);
        self.revisions.push(Revision {
            content,
            kind,
            author: author.to_string(),
            timestamp: clock.now_stamp(),
        });
    }

    /// The revision with the maximum timestamp.
    ///
    /// In normal operation this coincides with the last-appended
    /// revision, but resolution always goes through every stored stamp:
    /// logs reconstructed from files may carry revisions out of append
    /// order. Malformed stamps are skipped with a warning; if no stamp
    /// parses, the first revision wins.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateTimestamp`] if any two revisions share a raw
    /// timestamp string.
    pub fn latest(&self) -> Result<&Revision, DuplicateTimestamp> {
        Ok(&self.revisions[self.latest_index()?])
    }

    /// Index of the revision [`latest`](Self::latest) resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateTimestamp`] if any two revisions share a raw
    /// timestamp string.
    pub fn latest_index(&self) -> Result<usize, DuplicateTimestamp> {
        let mut seen = std::collections::HashSet::new();
        for revision in &self.revisions {
            if !seen.insert(revision.timestamp.as_str()) {
                return Err(DuplicateTimestamp {
                    comment_id: self.id,
                    timestamp: revision.timestamp.clone(),
                });
            }
        }

        let mut best_index = 0;
        let mut best_time = None;
        for (index, revision) in self.revisions.iter().enumerate() {
            match parse_stamp(&revision.timestamp) {
                Some(time) if best_time.is_none() || Some(time) > best_time => {
                    best_time = Some(time);
                    best_index = index;
                }
                Some(_) => {}
                None => {
                    warn!(
                        comment_id = %self.id,
                        stamp = %revision.timestamp,
                        "skipping revision with malformed timestamp"
                    );
                }
            }
        }
        Ok(best_index)
    }

    /// Flip the soft-delete flag. Revisions are untouched.
    pub fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Table;

    fn log_with_stamps(stamps: &[&str]) -> CommentLog {
        CommentLog {
            id: Uuid::new_v4(),
            creation_user: "ada".into(),
            created_at: stamps[0].to_string(),
            deleted: false,
            revisions: stamps
                .iter()
                .enumerate()
                .map(|(i, stamp)| Revision {
                    content: CommentContent::Text(format!("rev {i}")),
                    kind: ContentKind::Plain,
                    author: "ada".into(),
                    timestamp: (*stamp).to_string(),
                })
                .collect(),
        }
    }

    // -----------------------------------------------------------------------
    // create / modify
    // -----------------------------------------------------------------------

    #[test]
    fn create_stores_one_classified_revision() {
        let clock = Clock::new();
        let log = CommentLog::create("plot.png".into(), "ada", &clock);

        assert_eq!(log.revisions.len(), 1);
        assert_eq!(log.revisions[0].kind, ContentKind::Png);
        assert_eq!(log.revisions[0].author, "ada");
        assert_eq!(log.creation_user, "ada");
        assert_eq!(log.created_at, log.revisions[0].timestamp);
        assert!(!log.deleted);
    }

    #[test]
    fn identical_resubmission_is_a_no_op() {
        let clock = Clock::new();
        let mut log = CommentLog::create("measured 4.2 K".into(), "ada", &clock);

        log.modify("measured 4.2 K".into(), "ada", &clock);
        log.modify("measured 4.2 K".into(), "ada", &clock);
        assert_eq!(log.revisions.len(), 1);
    }

    #[test]
    fn changed_content_appends_a_revision() {
        let clock = Clock::new();
        let mut log = CommentLog::create("first draft".into(), "ada", &clock);

        log.modify("second draft".into(), "ada", &clock);
        assert_eq!(log.revisions.len(), 2);
        assert!(log.revisions[1].timestamp > log.revisions[0].timestamp);
    }

    #[test]
    fn changed_author_appends_even_with_same_content() {
        let clock = Clock::new();
        let mut log = CommentLog::create("shared note".into(), "ada", &clock);

        log.modify("shared note".into(), "grace", &clock);
        assert_eq!(log.revisions.len(), 2);
        assert_eq!(log.revisions[1].author, "grace");
    }

    #[test]
    fn modify_reclassifies_content() {
        let clock = Clock::new();
        let mut log = CommentLog::create("free text".into(), "ada", &clock);
        assert_eq!(log.revisions[0].kind, ContentKind::Plain);

        log.modify("results.md".into(), "ada", &clock);
        assert_eq!(log.revisions[1].kind, ContentKind::Markdown);

        let table = Table {
            columns: vec!["f".into()],
            rows: vec![vec!["7".into()]],
        };
        log.modify(table.into(), "ada", &clock);
        assert_eq!(log.revisions[2].kind, ContentKind::Table);
    }

    // -----------------------------------------------------------------------
    // latest
    // -----------------------------------------------------------------------

    #[test]
    fn latest_resolves_by_timestamp_not_append_order() {
        let log = log_with_stamps(&[
            "2024-03-01T10:00:00.000000Z",
            "2024-03-01T12:00:00.000000Z",
            "2024-03-01T11:00:00.000000Z",
        ]);
        let latest = log.latest().expect("no duplicates");
        assert_eq!(latest.content, CommentContent::Text("rev 1".into()));
    }

    #[test]
    fn duplicate_timestamps_are_an_integrity_error() {
        let log = log_with_stamps(&[
            "2024-03-01T10:00:00.000000Z",
            "2024-03-01T10:00:00.000000Z",
        ]);
        let err = log.latest().expect_err("duplicates must fail");
        assert_eq!(err.comment_id, log.id);
        assert_eq!(err.timestamp, "2024-03-01T10:00:00.000000Z");
    }

    #[test]
    fn malformed_stamps_are_skipped() {
        let log = log_with_stamps(&[
            "2024-03-01T10:00:00.000000Z",
            "garbage",
            "2024-03-01T09:00:00.000000Z",
        ]);
        let latest = log.latest().expect("no duplicates");
        assert_eq!(latest.content, CommentContent::Text("rev 0".into()));
    }

    #[test]
    fn all_malformed_falls_back_to_first_revision() {
        let log = log_with_stamps(&["bogus-a", "bogus-b"]);
        let latest = log.latest().expect("distinct raw stamps");
        assert_eq!(latest.content, CommentContent::Text("rev 0".into()));
    }

    // -----------------------------------------------------------------------
    // equality / soft delete
    // -----------------------------------------------------------------------

    #[test]
    fn equality_is_structural_over_full_history() {
        let clock = Clock::new();
        let mut a = CommentLog::create("v1".into(), "ada", &clock);
        let b = a.clone();
        assert_eq!(a, b);

        a.modify("v2".into(), "ada", &clock);
        assert_ne!(a, b);
    }

    #[test]
    fn soft_delete_keeps_revisions() {
        let clock = Clock::new();
        let mut log = CommentLog::create("keep me".into(), "ada", &clock);
        log.set_deleted(true);
        assert!(log.deleted);
        assert_eq!(log.revisions.len(), 1);
        log.set_deleted(false);
        assert!(!log.deleted);
    }

    // -----------------------------------------------------------------------
    // serialization
    // -----------------------------------------------------------------------

    #[test]
    fn log_roundtrips_through_toml() {
        let clock = Clock::new();
        let mut log = CommentLog::create("notes.md".into(), "ada", &clock);
        log.modify(
            Table {
                columns: vec!["t".into(), "v".into()],
                rows: vec![vec!["0".into(), "1".into()], vec!["1".into(), "2".into()]],
            }
            .into(),
            "grace",
            &clock,
        );

        #[derive(Serialize, Deserialize)]
        struct Doc {
            log: CommentLog,
        }

        let encoded = toml::to_string(&Doc { log: log.clone() }).expect("encode");
        let decoded: Doc = toml::from_str(&encoded).expect("decode");
        assert_eq!(decoded.log, log);
    }

    #[test]
    fn persisted_kind_codes_survive_decode() {
        let clock = Clock::new();
        let log = CommentLog::create("plot.png".into(), "ada", &clock);

        #[derive(Serialize, Deserialize)]
        struct Doc {
            log: CommentLog,
        }

        let encoded = toml::to_string(&Doc { log }).expect("encode");
        assert!(encoded.contains("kind = 5"), "png code in file: {encoded}");
    }
}
