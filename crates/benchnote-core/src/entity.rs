//! Notebook entities: the nodes of the tree.
//!
//! An entity addresses its parent and children by stable identifier in
//! memory. At rest those links are storage locations; the translation
//! in both directions belongs to the store, not to this type.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::comment::CommentLog;

/// The three kinds of notebook entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Project,
    Task,
    Step,
}

impl EntityKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Task => "task",
            Self::Step => "step",
        }
    }

    /// Whether entities of this kind may hold children. Steps are
    /// leaves; only projects and tasks parent other entities.
    #[must_use]
    pub const fn can_hold_children(self) -> bool {
        matches!(self, Self::Project | Self::Task)
    }

    /// Every kind, in display order.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Project, Self::Task, Self::Step]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an entity kind from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity kind: '{0}'")]
pub struct ParseKindError(pub String);

impl FromStr for EntityKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "project" => Ok(Self::Project),
            "task" => Ok(Self::Task),
            "step" => Ok(Self::Step),
            _ => Err(ParseKindError(s.to_string())),
        }
    }
}

/// One node in the notebook tree.
///
/// `comments` is ordered: insertion order is display order and must be
/// preserved across reloads. `children` is likewise ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
    pub kind: EntityKind,
    pub parent: Option<Uuid>,
    pub children: Vec<Uuid>,
    pub owner_user: String,
    pub comments: Vec<CommentLog>,
}

impl Entity {
    /// Create a fresh entity with no children and no comments.
    #[must_use]
    pub fn new(name: &str, kind: EntityKind, parent: Option<Uuid>, owner_user: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind,
            parent,
            children: Vec::new(),
            owner_user: owner_user.to_string(),
            comments: Vec::new(),
        }
    }

    /// Append a comment log, preserving display order.
    pub fn add_comment(&mut self, log: CommentLog) {
        self.comments.push(log);
    }

    /// Look up a comment log by identifier.
    #[must_use]
    pub fn comment(&self, comment_id: Uuid) -> Option<&CommentLog> {
        self.comments.iter().find(|log| log.id == comment_id)
    }

    /// Mutable variant of [`comment`](Self::comment).
    pub fn comment_mut(&mut self, comment_id: Uuid) -> Option<&mut CommentLog> {
        self.comments.iter_mut().find(|log| log.id == comment_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;

    #[test]
    fn kind_display_parse_roundtrips() {
        for kind in EntityKind::all() {
            let rendered = kind.to_string();
            let reparsed = EntityKind::from_str(&rendered).expect("parse back");
            assert_eq!(kind, reparsed);
        }
    }

    #[test]
    fn kind_parse_rejects_unknown_values() {
        assert!(EntityKind::from_str("experiment").is_err());
        assert!(EntityKind::from_str("").is_err());
    }

    #[test]
    fn kind_parse_is_case_insensitive() {
        assert_eq!(EntityKind::from_str("Project"), Ok(EntityKind::Project));
        assert_eq!(EntityKind::from_str(" TASK "), Ok(EntityKind::Task));
    }

    #[test]
    fn only_projects_and_tasks_hold_children() {
        assert!(EntityKind::Project.can_hold_children());
        assert!(EntityKind::Task.can_hold_children());
        assert!(!EntityKind::Step.can_hold_children());
    }

    #[test]
    fn new_entity_starts_empty() {
        let entity = Entity::new("Cooldown", EntityKind::Task, None, "ada");
        assert!(entity.children.is_empty());
        assert!(entity.comments.is_empty());
        assert_eq!(entity.owner_user, "ada");
        assert!(entity.parent.is_none());
    }

    #[test]
    fn comment_lookup_by_id() {
        let clock = Clock::new();
        let mut entity = Entity::new("Cooldown", EntityKind::Task, None, "ada");
        let log = CommentLog::create("reached base temperature".into(), "ada", &clock);
        let id = log.id;
        entity.add_comment(log);

        assert!(entity.comment(id).is_some());
        assert!(entity.comment(Uuid::new_v4()).is_none());

        entity
            .comment_mut(id)
            .expect("must exist")
            .set_deleted(true);
        assert!(entity.comment(id).expect("must exist").deleted);
    }

    #[test]
    fn comment_order_is_insertion_order() {
        let clock = Clock::new();
        let mut entity = Entity::new("Cooldown", EntityKind::Task, None, "ada");
        for i in 0..5 {
            entity.add_comment(CommentLog::create(format!("note {i}").into(), "ada", &clock));
        }
        let texts: Vec<_> = entity
            .comments
            .iter()
            .map(|log| log.revisions[0].content.clone())
            .collect();
        for (i, text) in texts.iter().enumerate() {
            assert_eq!(
                text,
                &crate::content::CommentContent::Text(format!("note {i}"))
            );
        }
    }
}
