//! The graph store: process-wide indices over a forest of entity files.
//!
//! [`GraphStore`] owns every index table explicitly — identifier to
//! entity, location to identifier and back, identifier to owner, the
//! derived user/kind sets, and the image index — and mediates every
//! mutation that must be reflected back to persisted files. The index
//! is a cache over the authoritative file tree: lookups that miss
//! trigger one full reload from the root before reporting not-found.
//!
//! # Loading is two-pass
//!
//! Files address their parent and children by location; live entities
//! address them by identifier. The rewrite from locations to
//! identifiers is deferred until the whole subtree has been read and
//! indexed, because a node's parent may be indexed later than the node
//! itself. A single-pass rewrite fails on exactly those topologies.
//!
//! # Writes are sequential, not transactional
//!
//! Single-writer model. `add_entity` touches two files with no
//! multi-file transaction; the child is written before the parent so a
//! crash in between leaves an unreachable orphan file rather than a
//! dangling child reference. Everything else touches at most one file.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use benchnote_core::clock::Clock;
use benchnote_core::comment::CommentLog;
use benchnote_core::content::{CommentContent, ContentKind, Table};
use benchnote_core::entity::{Entity, EntityKind};

use crate::error::StoreError;
use crate::record::{normalize_link, EntityRecord};

/// Nested identifier/name/kind view of a loaded subtree, returned by
/// [`GraphStore::load_tree`]. Child order matches file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySummary {
    pub id: Uuid,
    pub name: String,
    pub kind: EntityKind,
    pub children: Vec<EntitySummary>,
}

/// The resolved current version of one comment, as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentSnapshot {
    pub content: CommentView,
    pub kind: ContentKind,
    pub author: String,
    pub timestamp: String,
}

/// How a comment's content is handed to callers: image kinds resolve to
/// a file reference, everything else to inline text or a table.
#[derive(Debug, Clone, PartialEq)]
pub enum CommentView {
    Text(String),
    File(PathBuf),
    Table(Table),
}

/// One candidate parent for a new entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentOption {
    pub id: Uuid,
    pub name: String,
    pub kind: EntityKind,
}

/// Owns the entity tree's indices and file-level persistence.
#[derive(Debug)]
pub struct GraphStore {
    root: PathBuf,
    clock: Clock,
    entities: HashMap<Uuid, Entity>,
    id_by_location: HashMap<PathBuf, Uuid>,
    location_by_id: HashMap<Uuid, PathBuf>,
    owner_by_id: HashMap<Uuid, String>,
    users: BTreeSet<String>,
    kinds: BTreeSet<EntityKind>,
    // Keyed "{entity_id}--{file_name}" so the same image name can
    // appear under different entities.
    images: BTreeMap<String, PathBuf>,
}

impl GraphStore {
    /// A store rooted at the given entity file. Nothing is read until
    /// [`load_tree`](Self::load_tree) or a lazy-filling lookup runs.
    pub fn new(root_location: impl Into<PathBuf>) -> Self {
        Self {
            root: root_location.into(),
            clock: Clock::new(),
            entities: HashMap::new(),
            id_by_location: HashMap::new(),
            location_by_id: HashMap::new(),
            owner_by_id: HashMap::new(),
            users: BTreeSet::new(),
            kinds: BTreeSet::new(),
            images: BTreeMap::new(),
        }
    }

    /// The root entity file this store loads from.
    #[must_use]
    pub fn root_location(&self) -> &Path {
        &self.root
    }

    /// Clear every index table. Exclusive access (`&mut self`) means no
    /// reader can observe a half-cleared index.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.id_by_location.clear();
        self.location_by_id.clear();
        self.owner_by_id.clear();
        self.users.clear();
        self.kinds.clear();
        self.images.clear();
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Write a fresh root entity file at the configured root location
    /// and index it. The starting point for an empty notebook.
    ///
    /// # Errors
    ///
    /// Validation errors for missing fields or an unknown kind tag;
    /// write errors from the file system.
    pub fn init_root(&mut self, name: &str, kind: &str, user: &str) -> Result<Uuid, StoreError> {
        let (name, kind, user) = validate_new_entity(name, kind, user)?;
        let entity = Entity::new(name, kind, None, user);
        let record = EntityRecord {
            id: entity.id,
            name: entity.name.clone(),
            kind: entity.kind,
            owner_user: entity.owner_user.clone(),
            parent: None,
            children: Vec::new(),
            comments: Vec::new(),
        };
        record.write(&self.root)?;

        let id = entity.id;
        let location = self.root.clone();
        self.index_entity(entity, location);
        info!(%id, name, "initialized notebook root");
        Ok(id)
    }

    /// Recursively load the whole tree from the root location,
    /// rebuilding every index, and return the nested summary.
    ///
    /// Pass one reads each file depth-first, records its location in
    /// the location indices, and builds the summary without touching
    /// links. Pass two resolves every parent/children location into an
    /// identifier — only possible once the full subtree is indexed.
    ///
    /// # Errors
    ///
    /// Read/parse errors from any entity file in the tree.
    pub fn load_tree(&mut self) -> Result<EntitySummary, StoreError> {
        self.reset();

        let root = self.root.clone();
        let mut records = Vec::new();
        let summary = self.read_subtree(&root, &mut records)?;

        for (location, record) in records {
            let entity = record.resolve(&location, |link| {
                self.id_by_location.get(link).copied()
            });
            self.index_entity(entity, location);
        }

        debug!(entities = self.entities.len(), "loaded tree");
        Ok(summary)
    }

    /// Pass one: read the file at `location`, index its location, and
    /// recurse into each child location in file order.
    fn read_subtree(
        &mut self,
        location: &Path,
        records: &mut Vec<(PathBuf, EntityRecord)>,
    ) -> Result<EntitySummary, StoreError> {
        let record = EntityRecord::read(location)?;
        self.id_by_location
            .insert(location.to_path_buf(), record.id);
        self.location_by_id
            .insert(record.id, location.to_path_buf());

        let mut children = Vec::new();
        for child in &record.children {
            let child_location = normalize_link(location, child);
            children.push(self.read_subtree(&child_location, records)?);
        }

        let summary = EntitySummary {
            id: record.id,
            name: record.name.clone(),
            kind: record.kind,
            children,
        };
        records.push((location.to_path_buf(), record));
        Ok(summary)
    }

    /// Insert a resolved entity into the entity index and refresh every
    /// derived table (owner, users, kinds, images).
    fn index_entity(&mut self, entity: Entity, location: PathBuf) {
        self.id_by_location.insert(location.clone(), entity.id);
        self.location_by_id.insert(entity.id, location);
        self.owner_by_id
            .insert(entity.id, entity.owner_user.clone());
        self.users.insert(entity.owner_user.clone());
        self.kinds.insert(entity.kind);
        for log in &entity.comments {
            for revision in &log.revisions {
                self.users.insert(revision.author.clone());
            }
        }
        self.index_images(&entity);
        self.entities.insert(entity.id, entity);
    }

    /// Record every image-kind revision of `entity` in the image index.
    fn index_images(&mut self, entity: &Entity) {
        for log in &entity.comments {
            for revision in &log.revisions {
                if !revision.kind.is_image() {
                    continue;
                }
                let Some(text) = revision.content.as_text() else {
                    continue;
                };
                let path = PathBuf::from(text);
                if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
                    self.images
                        .insert(image_key(entity.id, file_name), path.clone());
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Look up an entity by identifier. On an index miss the store
    /// reloads the full tree from the root once — the index is a cache
    /// over the files — and only then reports not-found.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] if the identifier is unknown even
    /// after a reload; read errors if the reload itself fails.
    pub fn get_entity(&mut self, id: Uuid) -> Result<&Entity, StoreError> {
        if !self.entities.contains_key(&id) {
            debug!(%id, "entity not indexed, reloading from root");
            self.load_tree()?;
        }
        self.entities
            .get(&id)
            .ok_or(StoreError::EntityNotFound(id))
    }

    /// Resolve a comment's current version.
    ///
    /// # Errors
    ///
    /// Not-found errors for the entity or comment; an integrity error
    /// if the log carries duplicate revision timestamps.
    pub fn get_comment(
        &mut self,
        entity_id: Uuid,
        comment_id: Uuid,
    ) -> Result<CommentSnapshot, StoreError> {
        let entity = self.get_entity(entity_id)?;
        let log = entity
            .comment(comment_id)
            .ok_or(StoreError::CommentNotFound {
                entity_id,
                comment_id,
            })?;
        let revision = log.latest()?;

        let content = match &revision.content {
            CommentContent::Text(text) if revision.kind.is_image() => {
                CommentView::File(PathBuf::from(text))
            }
            CommentContent::Text(text) => CommentView::Text(text.clone()),
            CommentContent::Table(table) => CommentView::Table(table.clone()),
        };

        Ok(CommentSnapshot {
            content,
            kind: revision.kind,
            author: revision.author.clone(),
            timestamp: revision.timestamp.clone(),
        })
    }

    /// Look up an indexed image by entity and file name.
    ///
    /// # Errors
    ///
    /// [`StoreError::ImageNotFound`] with the composed key on a miss.
    pub fn get_image(&self, entity_id: Uuid, file_name: &str) -> Result<&Path, StoreError> {
        let key = image_key(entity_id, file_name);
        self.images
            .get(&key)
            .map(PathBuf::as_path)
            .ok_or(StoreError::ImageNotFound(key))
    }

    /// Longest downward chain (in edges) and total reachable descendant
    /// count below an entity, computed purely over the in-memory index.
    /// Child identifiers absent from the index are skipped, so a
    /// partially indexed tree degrades instead of failing.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] if the entity itself is not
    /// indexed.
    pub fn rank_and_count(&self, entity_id: Uuid) -> Result<(usize, usize), StoreError> {
        if !self.entities.contains_key(&entity_id) {
            return Err(StoreError::EntityNotFound(entity_id));
        }
        let mut visited = HashSet::new();
        Ok(self.walk_descendants(entity_id, &mut visited))
    }

    fn walk_descendants(&self, id: Uuid, visited: &mut HashSet<Uuid>) -> (usize, usize) {
        if !visited.insert(id) {
            return (0, 0); // cycle guard
        }
        let Some(entity) = self.entities.get(&id) else {
            return (0, 0);
        };
        let mut rank = 0;
        let mut count = 0;
        for child in &entity.children {
            if !self.entities.contains_key(child) {
                continue; // orphan reference — tolerated, not counted
            }
            let (child_rank, child_count) = self.walk_descendants(*child, visited);
            rank = rank.max(1 + child_rank);
            count += 1 + child_count;
        }
        (rank, count)
    }

    /// Every user seen so far: entity owners and revision authors.
    #[must_use]
    pub fn list_users(&self) -> Vec<String> {
        self.users.iter().cloned().collect()
    }

    /// Every entity kind present in the indexed tree.
    #[must_use]
    pub fn list_kinds(&self) -> Vec<EntityKind> {
        self.kinds.iter().copied().collect()
    }

    /// Every indexed entity whose kind may hold children, sorted by
    /// name.
    #[must_use]
    pub fn list_possible_parents(&self) -> Vec<ParentOption> {
        let mut parents: Vec<ParentOption> = self
            .entities
            .values()
            .filter(|entity| entity.kind.can_hold_children())
            .map(|entity| ParentOption {
                id: entity.id,
                name: entity.name.clone(),
                kind: entity.kind,
            })
            .collect();
        parents.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        parents
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Append a new comment log to an entity and persist that one
    /// entity's file. The author defaults to the entity's owner.
    /// Returns the new log's identifier.
    ///
    /// # Errors
    ///
    /// [`StoreError::EntityNotFound`] for an unknown entity; write
    /// errors from persisting the file.
    pub fn add_comment(
        &mut self,
        entity_id: Uuid,
        content: CommentContent,
        author: Option<&str>,
    ) -> Result<Uuid, StoreError> {
        let owner = self.get_entity(entity_id)?.owner_user.clone();
        let author = author.map_or(owner, str::to_string);

        let log = CommentLog::create(content, &author, &self.clock);
        let log_id = log.id;
        let entity = self
            .entities
            .get_mut(&entity_id)
            .ok_or(StoreError::EntityNotFound(entity_id))?;
        entity.add_comment(log);

        self.users.insert(author);
        self.refresh_images(entity_id);
        self.persist(entity_id)?;
        debug!(%entity_id, comment = %log_id, "added comment");
        Ok(log_id)
    }

    /// Append a revision to an existing comment log (no-op if content
    /// and author both match its latest revision) and persist the one
    /// entity's file.
    ///
    /// # Errors
    ///
    /// Not-found errors for the entity or comment; write errors from
    /// persisting the file.
    pub fn modify_comment(
        &mut self,
        entity_id: Uuid,
        comment_id: Uuid,
        content: CommentContent,
        author: &str,
    ) -> Result<(), StoreError> {
        self.get_entity(entity_id)?;
        let entity = self
            .entities
            .get_mut(&entity_id)
            .ok_or(StoreError::EntityNotFound(entity_id))?;
        let log = entity
            .comment_mut(comment_id)
            .ok_or(StoreError::CommentNotFound {
                entity_id,
                comment_id,
            })?;
        log.modify(content, author, &self.clock);

        self.users.insert(author.to_string());
        self.refresh_images(entity_id);
        self.persist(entity_id)?;
        Ok(())
    }

    /// Flip a comment log's soft-delete flag and persist the one
    /// entity's file. Revision history is untouched.
    ///
    /// # Errors
    ///
    /// Not-found errors for the entity or comment; write errors from
    /// persisting the file.
    pub fn set_comment_deleted(
        &mut self,
        entity_id: Uuid,
        comment_id: Uuid,
        deleted: bool,
    ) -> Result<(), StoreError> {
        self.get_entity(entity_id)?;
        let entity = self
            .entities
            .get_mut(&entity_id)
            .ok_or(StoreError::EntityNotFound(entity_id))?;
        let log = entity
            .comment_mut(comment_id)
            .ok_or(StoreError::CommentNotFound {
                entity_id,
                comment_id,
            })?;
        log.set_deleted(deleted);
        self.persist(entity_id)?;
        Ok(())
    }

    /// Create a new entity under `parent_id` and persist both affected
    /// files: the new child's, then the parent's updated children list.
    /// All validation happens before any file or index is touched.
    ///
    /// The child location is derived from the parent's location and the
    /// new name: a parent at `<dir>/<stem>.toml` gets its children
    /// under `<dir>/<stem>/`.
    ///
    /// # Errors
    ///
    /// Validation errors for missing fields, an unknown kind tag, or a
    /// parent whose kind cannot hold children;
    /// [`StoreError::EntityNotFound`] for an unknown parent;
    /// [`StoreError::LocationOccupied`] when a sibling already owns the
    /// derived location; write errors from either file.
    pub fn add_entity(
        &mut self,
        name: &str,
        kind: &str,
        parent_id: Uuid,
        user: &str,
    ) -> Result<Uuid, StoreError> {
        let (name, kind, user) = validate_new_entity(name, kind, user)?;
        let parent_kind = self.get_entity(parent_id)?.kind;
        if !parent_kind.can_hold_children() {
            return Err(StoreError::CannotHoldChildren {
                id: parent_id,
                kind: parent_kind,
            });
        }
        let parent_location = self
            .location_by_id
            .get(&parent_id)
            .ok_or(StoreError::LocationMissing(parent_id))?
            .clone();
        let location = child_location(&parent_location, name);
        if self.id_by_location.contains_key(&location) || location.exists() {
            return Err(StoreError::LocationOccupied(location));
        }

        let entity = Entity::new(name, kind, Some(parent_id), user);
        let id = entity.id;

        // Child file first: a crash before the parent write leaves an
        // unreachable orphan file, never a dangling child reference.
        let record = EntityRecord {
            id,
            name: entity.name.clone(),
            kind,
            owner_user: entity.owner_user.clone(),
            parent: Some(parent_location),
            children: Vec::new(),
            comments: Vec::new(),
        };
        record.write(&location)?;

        self.index_entity(entity, location);
        let parent = self
            .entities
            .get_mut(&parent_id)
            .ok_or(StoreError::EntityNotFound(parent_id))?;
        parent.children.push(id);
        self.persist(parent_id)?;

        info!(%id, name, %kind, %parent_id, "added entity");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Write one entity's file, translating its identifier links back
    /// into storage locations through the reverse index.
    fn persist(&self, id: Uuid) -> Result<(), StoreError> {
        let entity = self
            .entities
            .get(&id)
            .ok_or(StoreError::EntityNotFound(id))?;
        let location = self
            .location_by_id
            .get(&id)
            .ok_or(StoreError::LocationMissing(id))?;
        let record = EntityRecord::from_entity(entity, |link| {
            self.location_by_id
                .get(&link)
                .cloned()
                .ok_or(StoreError::LocationMissing(link))
        })?;
        record.write(location)?;
        debug!(%id, location = %location.display(), "persisted entity");
        Ok(())
    }

    /// Re-scan one entity's comments into the image index (after a
    /// comment mutation may have added image revisions).
    fn refresh_images(&mut self, entity_id: Uuid) {
        if let Some(entity) = self.entities.remove(&entity_id) {
            self.index_images(&entity);
            self.entities.insert(entity_id, entity);
        }
    }
}

/// Reject empty creation fields and unknown kind tags before any
/// mutation is attempted.
fn validate_new_entity<'a>(
    name: &'a str,
    kind: &str,
    user: &'a str,
) -> Result<(&'a str, EntityKind, &'a str), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::MissingField("name"));
    }
    if kind.trim().is_empty() {
        return Err(StoreError::MissingField("kind"));
    }
    if user.trim().is_empty() {
        return Err(StoreError::MissingField("user"));
    }
    let kind: EntityKind = kind.parse()?;
    Ok((name, kind, user))
}

/// Derive a child's storage location from its parent's location and the
/// child's name.
fn child_location(parent_location: &Path, name: &str) -> PathBuf {
    let dir = parent_location.parent().unwrap_or_else(|| Path::new(""));
    let stem = parent_location
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("root");
    dir.join(stem).join(format!("{name}.toml"))
}

/// Image-index key: the entity identifier and the bare file name.
fn image_key(entity_id: Uuid, file_name: &str) -> String {
    format!("{entity_id}--{file_name}")
}
