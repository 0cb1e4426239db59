//! Identity store and therapy catalog consumed by the scheduling core.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::Role;
use shared_models::directory::{Therapy, UserRecord};

use crate::supabase::SupabaseClient;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn list_by_role(&self, role: Role) -> Result<Vec<UserRecord>>;

    async fn set_assigned_practitioner(&self, patient_id: Uuid, practitioner_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait TherapyCatalog: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Therapy>>;
}

// ==============================================================================
// IN-MEMORY IMPLEMENTATIONS
// ==============================================================================

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().map(|u| (u.id, u)).collect()),
        }
    }

    pub async fn upsert(&self, user: UserRecord) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn remove(&self, id: Uuid) -> Option<UserRecord> {
        self.users.write().await.remove(&id)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn set_assigned_practitioner(&self, patient_id: Uuid, practitioner_id: Uuid) -> Result<()> {
        let mut users = self.users.write().await;
        let patient = users
            .get_mut(&patient_id)
            .ok_or_else(|| anyhow!("User {} not found", patient_id))?;
        patient.assigned_practitioner_id = Some(practitioner_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTherapyCatalog {
    therapies: RwLock<HashMap<Uuid, Therapy>>,
}

impl InMemoryTherapyCatalog {
    pub fn with_therapies(therapies: impl IntoIterator<Item = Therapy>) -> Self {
        Self {
            therapies: RwLock::new(therapies.into_iter().map(|t| (t.id, t)).collect()),
        }
    }

    pub async fn upsert(&self, therapy: Therapy) {
        self.therapies.write().await.insert(therapy.id, therapy);
    }
}

#[async_trait]
impl TherapyCatalog for InMemoryTherapyCatalog {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Therapy>> {
        Ok(self.therapies.read().await.get(&id).cloned())
    }
}

// ==============================================================================
// SUPABASE IMPLEMENTATIONS
// ==============================================================================

pub struct SupabaseUserDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseUserDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<UserRecord>> {
        let rows: Vec<Value> = self.supabase.service_request(Method::GET, path, None, false).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| anyhow!("Failed to parse user: {}", e)))
            .collect()
    }
}

#[async_trait]
impl UserDirectory for SupabaseUserDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        debug!("Looking up user {}", id);
        let path = format!("/rest/v1/users?id=eq.{}&limit=1", id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let path = format!("/rest/v1/users?email=eq.{}&limit=1", urlencoding::encode(email));
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<UserRecord>> {
        let path = format!("/rest/v1/users?role=eq.{}&order=name.asc", role);
        self.fetch(&path).await
    }

    async fn set_assigned_practitioner(&self, patient_id: Uuid, practitioner_id: Uuid) -> Result<()> {
        let path = format!("/rest/v1/users?id=eq.{}", patient_id);
        self.supabase
            .service_execute(
                Method::PATCH,
                &path,
                Some(json!({ "assigned_practitioner_id": practitioner_id })),
            )
            .await
    }
}

pub struct SupabaseTherapyCatalog {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseTherapyCatalog {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl TherapyCatalog for SupabaseTherapyCatalog {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Therapy>> {
        let path = format!("/rest/v1/therapies?id=eq.{}&limit=1", id);
        let rows: Vec<Value> = self.supabase.service_request(Method::GET, &path, None, false).await?;

        rows.into_iter()
            .next()
            .map(|row| serde_json::from_value(row).map_err(|e| anyhow!("Failed to parse therapy: {}", e)))
            .transpose()
    }
}
