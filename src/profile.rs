//! User profile persistence
//!
//! Key-value storage of the user's preferences record. The analysis core only
//! reads `default_jurisdiction_id` from it, for the extraction prompt.

use crate::error::AnalysisError;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{error, warn};
use uuid::Uuid;

pub const STORAGE_KEY: &str = "cb_user_profile";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UserRole {
    SelfRepresented,
    Lawyer,
    LegalAssistant,
    Student,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub notifications: bool,
    pub high_contrast: bool,
    pub auto_redaction: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub default_jurisdiction_id: String,
    pub preferences: UserPreferences,
    pub last_active: DateTime<Utc>,
}

impl UserProfile {
    pub fn default_profile() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            email: String::new(),
            role: UserRole::SelfRepresented,
            default_jurisdiction_id: "ontario".to_string(),
            preferences: UserPreferences {
                notifications: true,
                high_contrast: false,
                auto_redaction: true,
            },
            last_active: Utc::now(),
        }
    }

    /// Jurisdiction for prompt context, if one is set.
    pub fn jurisdiction(&self) -> Option<&str> {
        let id = self.default_jurisdiction_id.trim();
        (!id.is_empty()).then_some(id)
    }
}

/// Trait for profile persistence
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load(&self) -> Result<Option<UserProfile>>;
    /// Persists the profile with `last_active` stamped to now and returns it.
    async fn save(&self, profile: &UserProfile) -> Result<UserProfile>;
}

fn stamped(profile: &UserProfile) -> UserProfile {
    UserProfile {
        last_active: Utc::now(),
        ..profile.clone()
    }
}

/// In-memory profile store for development
pub struct InMemoryProfileStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load(&self) -> Result<Option<UserProfile>> {
        let entries = self.entries.read().await;
        match entries.get(STORAGE_KEY) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, profile: &UserProfile) -> Result<UserProfile> {
        let updated = stamped(profile);
        let raw = serde_json::to_string(&updated)?;
        self.entries.write().await.insert(STORAGE_KEY.to_string(), raw);
        Ok(updated)
    }
}

/// JSON file holding a key → record object.
///
/// An unreadable or corrupt record loads as `None` instead of failing, so a
/// damaged file never blocks analysis.
pub struct FileProfileStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    async fn read_entries(&self) -> Result<HashMap<String, serde_json::Value>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                AnalysisError::Profile(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn load(&self) -> Result<Option<UserProfile>> {
        let _guard = self.lock.read().await;

        let entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to load user profile: {}", e);
                return Ok(None);
            }
        };

        match entries.get(STORAGE_KEY) {
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(profile) => Ok(Some(profile)),
                Err(e) => {
                    warn!("Ignoring malformed user profile: {}", e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn save(&self, profile: &UserProfile) -> Result<UserProfile> {
        let _guard = self.lock.write().await;

        // keep other keys; a corrupt file is replaced
        let mut entries = self.read_entries().await.unwrap_or_default();
        let updated = stamped(profile);
        entries.insert(STORAGE_KEY.to_string(), serde_json::to_value(&updated)?);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&entries)?).await?;

        Ok(updated)
    }
}
