//! Store error taxonomy.
//!
//! Three families, all surfaced to the caller as typed failures with no
//! automatic retries:
//!
//! - **not found** — unknown entity, comment, or image key;
//! - **validation** — rejected before any mutation is attempted;
//! - **integrity** — duplicate revision timestamps inside one log;
//!
//! plus the file I/O and codec failures of the read/write paths.

use std::path::PathBuf;
use uuid::Uuid;

use benchnote_core::comment::DuplicateTimestamp;
use benchnote_core::entity::{EntityKind, ParseKindError};

/// Every failure the graph store can surface.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("entity not found: {0}")]
    EntityNotFound(Uuid),

    #[error("comment {comment_id} not found on entity {entity_id}")]
    CommentNotFound { entity_id: Uuid, comment_id: Uuid },

    #[error("image not found: '{0}'")]
    ImageNotFound(String),

    /// The entity is indexed but has no recorded storage location. The
    /// location index must never drift from the entity index, so this
    /// indicates a corrupted index, not a user error.
    #[error("no recorded location for entity {0}")]
    LocationMissing(Uuid),

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error(transparent)]
    UnknownKind(#[from] ParseKindError),

    #[error("entity {id} of kind '{kind}' cannot hold children")]
    CannotHoldChildren { id: Uuid, kind: EntityKind },

    /// The derived storage location for a new entity is already taken,
    /// either by an indexed sibling of the same name or by a stray file
    /// on disk. Writing anyway would overwrite the occupant.
    #[error("an entity file already exists at {0}")]
    LocationOccupied(PathBuf),

    #[error(transparent)]
    Integrity(#[from] DuplicateTimestamp),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to encode entity {id}: {source}")]
    Encode {
        id: Uuid,
        #[source]
        source: toml::ser::Error,
    },
}
