//! Participant profiles collected at onboarding.
//!
//! The pairing core only reads them: completeness gates the queue, and the
//! nickname is what partners see.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{domain::UserId, errors::Error, utils::write_json_atomic, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => f.write_str("Male"),
            Gender::Female => f.write_str("Female"),
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" | "еркек" => Ok(Gender::Male),
            "female" | "f" | "әйел" => Ok(Gender::Female),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub gender: Option<Gender>,
    /// 0 until registered.
    pub age: u32,
    /// `lat,lon`, five decimals.
    pub geo: Option<String>,
    pub avatar_file_id: Option<String>,
}

impl Profile {
    /// Bare profile created on first contact.
    pub fn new(
        user_id: UserId,
        username: Option<String>,
        first_name: impl Into<String>,
        last_name: Option<String>,
    ) -> Self {
        Self {
            user_id,
            username,
            first_name: first_name.into(),
            last_name,
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        let present = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.nickname)
            && self.gender.is_some()
            && self.age > 0
            && present(&self.geo)
            && present(&self.avatar_file_id)
    }

    /// Name shown to partners, without a leading `@`.
    pub fn display_name(&self) -> String {
        self.nickname
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.username.as_deref().filter(|u| !u.is_empty()))
            .map(str::to_string)
            .unwrap_or_else(|| self.user_id.to_string())
    }

    /// Label for a candidate button.
    pub fn candidate_label(&self) -> String {
        let mut label = self.display_name();
        if let Some(g) = self.gender {
            label.push_str(&format!(" · {g}"));
        }
        if self.age > 0 {
            label.push_str(&format!(" · {}", self.age));
        }
        label
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn user_exists(&self, id: UserId) -> Result<bool>;
    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>>;
    async fn upsert_profile(&self, profile: Profile) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<UserId, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn user_exists(&self, id: UserId) -> Result<bool> {
        Ok(self.profiles.read().await.contains_key(&id))
    }

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>> {
        Ok(self.profiles.read().await.get(&id).cloned())
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<()> {
        self.profiles.write().await.insert(profile.user_id, profile);
        Ok(())
    }
}

/// All profiles in one JSON array, rewritten on every upsert.
pub struct JsonFileProfileStore {
    path: PathBuf,
    profiles: RwLock<HashMap<UserId, Profile>>,
}

impl JsonFileProfileStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let profiles = match tokio::fs::read_to_string(&path).await {
            Ok(txt) if txt.trim().is_empty() => HashMap::new(),
            Ok(txt) => {
                let list: Vec<Profile> = serde_json::from_str(&txt)
                    .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
                list.into_iter().map(|p| (p.user_id, p)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(path = %path.display(), count = profiles.len(), "profiles loaded");
        Ok(Self {
            path,
            profiles: RwLock::new(profiles),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProfileStore for JsonFileProfileStore {
    async fn user_exists(&self, id: UserId) -> Result<bool> {
        Ok(self.profiles.read().await.contains_key(&id))
    }

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>> {
        Ok(self.profiles.read().await.get(&id).cloned())
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<()> {
        let mut map = self.profiles.write().await;
        let mut next = map.clone();
        next.insert(profile.user_id, profile);

        let mut list: Vec<&Profile> = next.values().collect();
        list.sort_by_key(|p| p.user_id);
        write_json_atomic(&self.path, &list).await?;

        *map = next;
        Ok(())
    }
}
