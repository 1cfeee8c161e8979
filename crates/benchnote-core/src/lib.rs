//! benchnote-core: the notebook data model.
//!
//! A notebook is a rooted tree of [`entity::Entity`] nodes (Project,
//! Task, Step), each carrying an ordered list of [`comment::CommentLog`]
//! values — append-only histories of one logical comment. Persistence
//! and indexing live in `benchnote-store`; this crate is pure data.
//!
//! # Conventions
//!
//! - **Errors**: typed per-module error structs/enums via `thiserror`.
//! - **Logging**: `tracing` macros (`warn!` on skipped malformed data).
//! - **Time**: RFC 3339 UTC stamps with microsecond precision from
//!   [`clock::Clock`], strictly monotonic within one process.

pub mod clock;
pub mod comment;
pub mod content;
pub mod entity;

pub use clock::Clock;
pub use comment::{CommentLog, Revision};
pub use content::{classify, CommentContent, ContentKind, Table};
pub use entity::{Entity, EntityKind};
