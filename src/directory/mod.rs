use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{Role, UserProfile};

/// Read-only view of the external identity store.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn profile(&self, id: Uuid) -> Option<UserProfile>;

    async fn couriers(&self) -> Vec<UserProfile>;
}

#[derive(Default)]
pub struct InMemoryDirectory {
    users: DashMap<Uuid, UserProfile>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: UserProfile) {
        self.users.insert(profile.id, profile);
    }

    /// Loads a JSON array of profiles.
    pub async fn from_seed_file(path: &Path) -> Result<Self, AppError> {
        let raw = tokio::fs::read(path).await.map_err(|err| {
            AppError::Internal(format!("failed to read {}: {err}", path.display()))
        })?;
        let profiles: Vec<UserProfile> = serde_json::from_slice(&raw).map_err(|err| {
            AppError::Internal(format!("invalid directory seed {}: {err}", path.display()))
        })?;

        let directory = Self::new();
        for profile in profiles {
            directory.insert(profile);
        }
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn profile(&self, id: Uuid) -> Option<UserProfile> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    async fn couriers(&self) -> Vec<UserProfile> {
        let mut couriers: Vec<UserProfile> = self
            .users
            .iter()
            .filter(|entry| entry.value().role == Role::Courier)
            .map(|entry| entry.value().clone())
            .collect();
        couriers.sort_by(|a, b| a.name.cmp(&b.name));
        couriers
    }
}
