//! The entity file codec.
//!
//! One TOML file per entity. In memory an [`Entity`] links to its
//! parent and children by identifier; at rest those links are storage
//! locations, so the same tree can be reassembled without a central
//! identifier database. [`EntityRecord`] is the at-rest shape, and the
//! translation in both directions goes through the store's indices.
//!
//! Round-trip law: writing a record and reading it back yields a record
//! that resolves to an entity structurally equal to the one it came
//! from, modulo the link representation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

use benchnote_core::comment::CommentLog;
use benchnote_core::entity::{Entity, EntityKind};

use crate::error::StoreError;

/// The persisted form of one entity: identifier links swapped for
/// storage locations, comment logs inline with all revision fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: Uuid,
    pub name: String,
    pub kind: EntityKind,
    pub owner_user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<PathBuf>,
    #[serde(default)]
    pub children: Vec<PathBuf>,
    #[serde(default)]
    pub comments: Vec<CommentLog>,
}

impl EntityRecord {
    /// Translate an in-memory entity into its at-rest form. `locate`
    /// maps an identifier to its storage location (the store's reverse
    /// index); a link with no known location is an index-integrity
    /// failure and aborts the translation.
    ///
    /// # Errors
    ///
    /// Propagates whatever `locate` returns for an unknown identifier.
    pub fn from_entity(
        entity: &Entity,
        locate: impl Fn(Uuid) -> Result<PathBuf, StoreError>,
    ) -> Result<Self, StoreError> {
        let parent = entity.parent.map(&locate).transpose()?;
        let children = entity
            .children
            .iter()
            .map(|child| locate(*child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: entity.id,
            name: entity.name.clone(),
            kind: entity.kind,
            owner_user: entity.owner_user.clone(),
            parent,
            children,
            comments: entity.comments.clone(),
        })
    }

    /// Translate this record into an in-memory entity. `resolve_link`
    /// maps a normalized location back to an identifier; links that do
    /// not resolve (files outside the indexed tree, or not yet loaded)
    /// are dropped with a warning rather than failing the load, which
    /// keeps a partially indexed tree usable.
    #[must_use]
    pub fn resolve(
        self,
        location: &Path,
        resolve_link: impl Fn(&Path) -> Option<Uuid>,
    ) -> Entity {
        let parent = self.parent.as_ref().and_then(|link| {
            let normalized = normalize_link(location, link);
            let resolved = resolve_link(&normalized);
            if resolved.is_none() {
                warn!(
                    entity = %self.id,
                    link = %link.display(),
                    "parent location is not indexed, dropping link"
                );
            }
            resolved
        });

        let children = self
            .children
            .iter()
            .filter_map(|link| {
                let normalized = normalize_link(location, link);
                let resolved = resolve_link(&normalized);
                if resolved.is_none() {
                    warn!(
                        entity = %self.id,
                        link = %link.display(),
                        "child location is not indexed, skipping"
                    );
                }
                resolved
            })
            .collect();

        Entity {
            id: self.id,
            name: self.name,
            kind: self.kind,
            parent,
            children,
            owner_user: self.owner_user,
            comments: self.comments,
        }
    }

    /// Read a record from its file.
    ///
    /// # Errors
    ///
    /// [`StoreError::Read`] on I/O failure, [`StoreError::Parse`] on
    /// malformed TOML.
    pub fn read(path: &Path) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write this record to `path`, creating parent directories as
    /// needed. One file per entity; callers decide write order when an
    /// operation touches more than one file.
    ///
    /// # Errors
    ///
    /// [`StoreError::Encode`] if serialization fails,
    /// [`StoreError::Write`] on I/O failure.
    pub fn write(&self, path: &Path) -> Result<(), StoreError> {
        let encoded = toml::to_string_pretty(self).map_err(|source| StoreError::Encode {
            id: self.id,
            source,
        })?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| StoreError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, encoded).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolve a link found inside the file at `base` against that file's
/// directory. Absolute links pass through untouched.
#[must_use]
pub fn normalize_link(base: &Path, link: &Path) -> PathBuf {
    if link.is_absolute() {
        link.to_path_buf()
    } else {
        base.parent().unwrap_or_else(|| Path::new("")).join(link)
    }
}
