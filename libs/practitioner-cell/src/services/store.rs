use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::{SupabaseApiError, SupabaseClient};

use crate::models::{AssignmentRequest, AssignmentStatus, PractitionerError, TimeBlock};

#[async_trait]
pub trait TimeBlockStore: Send + Sync {
    async fn insert(&self, block: &TimeBlock) -> Result<(), PractitionerError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TimeBlock>, PractitionerError>;

    /// Blocks whose start lies within `[from, to]`, ascending by start.
    async fn list_for_practitioner(
        &self,
        practitioner_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeBlock>, PractitionerError>;

    /// Blocks sharing at least one instant with the half-open window `[start, end)`.
    async fn find_overlapping(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeBlock>, PractitionerError>;

    async fn delete(&self, id: Uuid) -> Result<(), PractitionerError>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Fails with `Conflict` when the pair already has a pending request.
    async fn insert(&self, request: &AssignmentRequest) -> Result<(), PractitionerError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AssignmentRequest>, PractitionerError>;

    async fn list_pending(&self) -> Result<Vec<AssignmentRequest>, PractitionerError>;

    /// Moves a pending request to `status`. Returns `None` when it was no longer pending.
    async fn resolve(
        &self,
        id: Uuid,
        status: AssignmentStatus,
    ) -> Result<Option<AssignmentRequest>, PractitionerError>;
}

// ==============================================================================
// IN-MEMORY IMPLEMENTATIONS
// ==============================================================================

#[derive(Default)]
pub struct InMemoryTimeBlockStore {
    blocks: RwLock<HashMap<Uuid, TimeBlock>>,
}

impl InMemoryTimeBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TimeBlockStore for InMemoryTimeBlockStore {
    async fn insert(&self, block: &TimeBlock) -> Result<(), PractitionerError> {
        self.blocks.write().await.insert(block.id, block.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TimeBlock>, PractitionerError> {
        Ok(self.blocks.read().await.get(&id).cloned())
    }

    async fn list_for_practitioner(
        &self,
        practitioner_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeBlock>, PractitionerError> {
        let mut blocks: Vec<TimeBlock> = self
            .blocks
            .read()
            .await
            .values()
            .filter(|b| b.practitioner_id == practitioner_id)
            .filter(|b| from.map_or(true, |from| b.start_time >= from))
            .filter(|b| to.map_or(true, |to| b.start_time <= to))
            .cloned()
            .collect();
        blocks.sort_by_key(|b| b.start_time);
        Ok(blocks)
    }

    async fn find_overlapping(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeBlock>, PractitionerError> {
        Ok(self
            .blocks
            .read()
            .await
            .values()
            .filter(|b| b.practitioner_id == practitioner_id && b.start_time < end && start < b.end_time)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<(), PractitionerError> {
        self.blocks
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(PractitionerError::NotFound("Time block"))
    }
}

#[derive(Default)]
pub struct InMemoryAssignmentStore {
    requests: RwLock<HashMap<Uuid, AssignmentRequest>>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn insert(&self, request: &AssignmentRequest) -> Result<(), PractitionerError> {
        let mut requests = self.requests.write().await;
        let duplicate = requests.values().any(|r| {
            r.status == AssignmentStatus::Pending
                && r.patient_id == request.patient_id
                && r.practitioner_id == request.practitioner_id
        });
        if duplicate {
            return Err(PractitionerError::Conflict(
                "You already have a pending request for this practitioner".to_string(),
            ));
        }

        requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AssignmentRequest>, PractitionerError> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn list_pending(&self) -> Result<Vec<AssignmentRequest>, PractitionerError> {
        let mut pending: Vec<AssignmentRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| r.status == AssignmentStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    async fn resolve(
        &self,
        id: Uuid,
        status: AssignmentStatus,
    ) -> Result<Option<AssignmentRequest>, PractitionerError> {
        let mut requests = self.requests.write().await;
        match requests.get_mut(&id) {
            Some(request) if request.status == AssignmentStatus::Pending => {
                request.status = status;
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }
}

// ==============================================================================
// SUPABASE IMPLEMENTATIONS
// ==============================================================================

fn timestamp(ts: DateTime<Utc>) -> String {
    urlencoding::encode(&ts.to_rfc3339()).into_owned()
}

fn parse_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, PractitionerError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| PractitionerError::Store(format!("Failed to parse row: {}", e)))
        })
        .collect()
}

pub struct SupabaseTimeBlockStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseTimeBlockStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<TimeBlock>, PractitionerError> {
        let rows: Vec<Value> = self.supabase.service_request(Method::GET, path, None, false).await?;
        parse_rows(rows)
    }
}

#[async_trait]
impl TimeBlockStore for SupabaseTimeBlockStore {
    async fn insert(&self, block: &TimeBlock) -> Result<(), PractitionerError> {
        debug!("Inserting time block {} for practitioner {}", block.id, block.practitioner_id);
        let body = serde_json::to_value(block).map_err(|e| PractitionerError::Store(e.to_string()))?;
        self.supabase
            .service_execute(Method::POST, "/rest/v1/time_blocks", Some(body))
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TimeBlock>, PractitionerError> {
        let path = format!("/rest/v1/time_blocks?id=eq.{}&limit=1", id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn list_for_practitioner(
        &self,
        practitioner_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeBlock>, PractitionerError> {
        let mut path = format!(
            "/rest/v1/time_blocks?practitioner_id=eq.{}&order=start_time.asc",
            practitioner_id
        );
        if let Some(from) = from {
            path.push_str(&format!("&start_time=gte.{}", timestamp(from)));
        }
        if let Some(to) = to {
            path.push_str(&format!("&start_time=lte.{}", timestamp(to)));
        }
        self.fetch(&path).await
    }

    async fn find_overlapping(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeBlock>, PractitionerError> {
        let path = format!(
            "/rest/v1/time_blocks?practitioner_id=eq.{}&start_time=lt.{}&end_time=gt.{}",
            practitioner_id,
            timestamp(end),
            timestamp(start)
        );
        self.fetch(&path).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), PractitionerError> {
        let path = format!("/rest/v1/time_blocks?id=eq.{}", id);
        self.supabase.service_execute(Method::DELETE, &path, None).await?;
        Ok(())
    }
}

pub struct SupabaseAssignmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAssignmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl AssignmentStore for SupabaseAssignmentStore {
    async fn insert(&self, request: &AssignmentRequest) -> Result<(), PractitionerError> {
        let body = serde_json::to_value(request).map_err(|e| PractitionerError::Store(e.to_string()))?;
        match self
            .supabase
            .service_execute(Method::POST, "/rest/v1/assignment_requests", Some(body))
            .await
        {
            Ok(()) => Ok(()),
            // Unique partial index on pending pairs
            Err(e) if SupabaseApiError::status_of(&e) == Some(StatusCode::CONFLICT) => Err(
                PractitionerError::Conflict("You already have a pending request for this practitioner".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AssignmentRequest>, PractitionerError> {
        let path = format!("/rest/v1/assignment_requests?id=eq.{}&limit=1", id);
        let rows: Vec<Value> = self.supabase.service_request(Method::GET, &path, None, false).await?;
        Ok(parse_rows(rows)?.into_iter().next())
    }

    async fn list_pending(&self) -> Result<Vec<AssignmentRequest>, PractitionerError> {
        let rows: Vec<Value> = self
            .supabase
            .service_request(
                Method::GET,
                "/rest/v1/assignment_requests?status=eq.pending&order=created_at.desc",
                None,
                false,
            )
            .await?;
        parse_rows(rows)
    }

    async fn resolve(
        &self,
        id: Uuid,
        status: AssignmentStatus,
    ) -> Result<Option<AssignmentRequest>, PractitionerError> {
        // The status filter makes this a compare-and-set
        let path = format!("/rest/v1/assignment_requests?id=eq.{}&status=eq.pending", id);
        let rows: Vec<Value> = self
            .supabase
            .service_request(Method::PATCH, &path, Some(json!({ "status": status })), true)
            .await?;
        Ok(parse_rows(rows)?.into_iter().next())
    }
}
