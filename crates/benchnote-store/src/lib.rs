//! benchnote-store: persistence core for the notebook tree.
//!
//! Entities live one-per-file; files address their parent and children
//! by storage location while in-memory entities address them by stable
//! identifier. [`GraphStore`] owns the indices that translate between
//! the two, reconstructs the tree from the file forest, and mediates
//! every mutation that must reach disk. The route layer above this
//! crate consumes plain data only — no framework types cross the
//! boundary.
//!
//! # Conventions
//!
//! - **Errors**: every failure is a typed [`error::StoreError`] (or
//!   [`registry::RegistryError`]); nothing retries automatically.
//! - **Logging**: `tracing` macros on load/persist boundaries and on
//!   skipped malformed data.

pub mod error;
pub mod record;
pub mod registry;
pub mod store;

pub use error::StoreError;
pub use record::EntityRecord;
pub use registry::{Registry, RegistryError, User};
pub use store::{CommentSnapshot, CommentView, EntitySummary, GraphStore, ParentOption};
