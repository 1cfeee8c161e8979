//! The flat user registry.
//!
//! One `registry.toml` per notebook directory, separate from the entity
//! tree: a meta block (identifier, creation stamp, one modification
//! stamp appended per save) and a list of users keyed by email. Every
//! mutation rewrites the whole file — it is small and human-editable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use benchnote_core::clock::Clock;

/// File name of the registry inside its notebook directory.
pub const REGISTRY_FILE: &str = "registry.toml";

/// One registered user. Email is the unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub profile_color: String,
}

/// Registry failures. Validation errors reject the operation before
/// any state changes.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("user with email '{0}' already exists")]
    DuplicateUser(String),

    #[error("no user with email '{0}'")]
    UnknownUser(String),

    #[error("registry directory not found: {0}")]
    MissingDirectory(PathBuf),

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

    #[error("failed to encode registry: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// The at-rest shape of the registry file.
#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    id: Uuid,
    created_at: String,
    #[serde(default)]
    modified_at: Vec<String>,
    #[serde(default)]
    users: Vec<User>,
}

/// File-backed registry of known users.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    clock: Clock,
    id: Uuid,
    created_at: String,
    modified_at: Vec<String>,
    users: BTreeMap<String, User>,
}

impl Registry {
    /// Open the registry in `dir`, loading `registry.toml` if present
    /// or writing a fresh one if not. The directory itself must exist;
    /// a missing directory means the notebook was never set up.
    ///
    /// # Errors
    ///
    /// [`RegistryError::MissingDirectory`] if `dir` does not exist;
    /// read, parse, or write errors on the file.
    pub fn open(dir: &Path) -> Result<Self, RegistryError> {
        if !dir.is_dir() {
            return Err(RegistryError::MissingDirectory(dir.to_path_buf()));
        }
        let path = dir.join(REGISTRY_FILE);
        let clock = Clock::new();

        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| RegistryError::Read {
                path: path.clone(),
                source,
            })?;
            let file: RegistryFile =
                toml::from_str(&content).map_err(|source| RegistryError::Parse {
                    path: path.clone(),
                    source,
                })?;
            Ok(Self {
                path,
                clock,
                id: file.id,
                created_at: file.created_at,
                modified_at: file.modified_at,
                users: file
                    .users
                    .into_iter()
                    .map(|user| (user.email.clone(), user))
                    .collect(),
            })
        } else {
            let created_at = clock.now_stamp();
            let mut registry = Self {
                path,
                clock,
                id: Uuid::new_v4(),
                created_at,
                modified_at: Vec::new(),
                users: BTreeMap::new(),
            };
            registry.save()?;
            info!(id = %registry.id, "started fresh registry");
            Ok(registry)
        }
    }

    /// Register a user.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateUser`] if the email is already taken
    /// (checked before any state changes); write errors on save.
    pub fn add_user(
        &mut self,
        email: &str,
        name: &str,
        profile_color: &str,
    ) -> Result<(), RegistryError> {
        if self.users.contains_key(email) {
            return Err(RegistryError::DuplicateUser(email.to_string()));
        }
        self.users.insert(
            email.to_string(),
            User {
                email: email.to_string(),
                name: name.to_string(),
                profile_color: profile_color.to_string(),
            },
        );
        self.save()
    }

    /// Remove a user.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownUser`] if no user has that email; write
    /// errors on save.
    pub fn remove_user(&mut self, email: &str) -> Result<(), RegistryError> {
        if self.users.remove(email).is_none() {
            return Err(RegistryError::UnknownUser(email.to_string()));
        }
        self.save()
    }

    /// Change a user's profile color.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownUser`] if no user has that email; write
    /// errors on save.
    pub fn set_user_color(&mut self, email: &str, color: &str) -> Result<(), RegistryError> {
        let user = self
            .users
            .get_mut(email)
            .ok_or_else(|| RegistryError::UnknownUser(email.to_string()))?;
        user.profile_color = color.to_string();
        self.save()
    }

    /// Look up one user by email.
    #[must_use]
    pub fn user(&self, email: &str) -> Option<&User> {
        self.users.get(email)
    }

    /// All users, ordered by email.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Rewrite the file, appending a modification stamp.
    fn save(&mut self) -> Result<(), RegistryError> {
        self.modified_at.push(self.clock.now_stamp());
        let file = RegistryFile {
            id: self.id,
            created_at: self.created_at.clone(),
            modified_at: self.modified_at.clone(),
            users: self.users.values().cloned().collect(),
        };
        let encoded = toml::to_string_pretty(&file)?;
        fs::write(&self.path, encoded).map_err(|source| RegistryError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
