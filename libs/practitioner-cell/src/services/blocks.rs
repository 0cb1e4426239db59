use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::UserDirectory;
use shared_models::auth::{Caller, Role};
use shared_utils::policy::{authorize, Operation, Ownership};
use shared_utils::time::parse_iso_timestamp;

use crate::models::{CreateTimeBlockRequest, PractitionerError, TimeBlock, TimeBlockQuery};
use crate::services::store::TimeBlockStore;
use crate::services::timeline::TimelineLocks;

/// Sole writer of time blocks.
pub struct TimeBlockRegistry {
    store: Arc<dyn TimeBlockStore>,
    directory: Arc<dyn UserDirectory>,
    locks: TimelineLocks,
}

impl TimeBlockRegistry {
    pub fn new(store: Arc<dyn TimeBlockStore>, directory: Arc<dyn UserDirectory>, locks: TimelineLocks) -> Self {
        Self { store, directory, locks }
    }

    #[instrument(skip(self, request), fields(caller_id = %caller.id))]
    pub async fn create(
        &self,
        caller: &Caller,
        request: CreateTimeBlockRequest,
    ) -> Result<TimeBlock, PractitionerError> {
        let practitioner_id = match (request.practitioner_id, caller.role) {
            (Some(id), _) => id,
            (None, Role::Practitioner) => caller.id,
            (None, _) => {
                return Err(PractitionerError::InvalidInput("practitioner_id is required".to_string()))
            }
        };

        authorize(Operation::ManageTimeBlock, caller, &Ownership::practitioner(practitioner_id))
            .map_err(|denial| {
                warn!("Time block creation rejected: {}", denial);
                PractitionerError::from(denial)
            })?;

        let start = parse_iso_timestamp(&request.start)
            .ok_or_else(|| PractitionerError::InvalidInput("Invalid start time".to_string()))?;
        let end = parse_iso_timestamp(&request.end)
            .ok_or_else(|| PractitionerError::InvalidInput("Invalid end time".to_string()))?;
        if start >= end {
            return Err(PractitionerError::InvalidInput("Start time must be before end time".to_string()));
        }

        self.ensure_practitioner(practitioner_id).await?;

        let block = TimeBlock::new(practitioner_id, start, end, request.reason, caller.id);

        let _guard = self.locks.acquire(practitioner_id).await;
        self.store.insert(&block).await?;

        info!("Blocked {} - {} for practitioner {}", block.start_time, block.end_time, practitioner_id);
        Ok(block)
    }

    /// Any authenticated caller may read blocks. Without a practitioner id the caller's own are listed.
    pub async fn list(&self, caller: &Caller, query: TimeBlockQuery) -> Result<Vec<TimeBlock>, PractitionerError> {
        let practitioner_id = query.practitioner_id.unwrap_or(caller.id);
        authorize(Operation::ViewTimeBlocks, caller, &Ownership::practitioner(practitioner_id))?;

        let from = parse_bound(query.from.as_deref(), "from")?;
        let to = parse_bound(query.to.as_deref(), "to")?;

        debug!("Listing time blocks for practitioner {}", practitioner_id);
        self.store.list_for_practitioner(practitioner_id, from, to).await
    }

    #[instrument(skip(self), fields(caller_id = %caller.id))]
    pub async fn delete(&self, caller: &Caller, block_id: Uuid) -> Result<TimeBlock, PractitionerError> {
        let block = self
            .store
            .find_by_id(block_id)
            .await?
            .ok_or(PractitionerError::NotFound("Time block"))?;

        authorize(Operation::ManageTimeBlock, caller, &Ownership::practitioner(block.practitioner_id))?;

        let _guard = self.locks.acquire(block.practitioner_id).await;
        self.store.delete(block_id).await?;

        info!("Removed time block {} of practitioner {}", block_id, block.practitioner_id);
        Ok(block)
    }

    /// Read-only view used by the overlap checker.
    pub async fn overlapping(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeBlock>, PractitionerError> {
        self.store.find_overlapping(practitioner_id, start, end).await
    }

    async fn ensure_practitioner(&self, practitioner_id: Uuid) -> Result<(), PractitionerError> {
        match self.directory.find_by_id(practitioner_id).await? {
            Some(user) if user.role == Role::Practitioner => Ok(()),
            _ => Err(PractitionerError::NotFound("Practitioner")),
        }
    }
}

fn parse_bound(raw: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>, PractitionerError> {
    raw.map(|value| {
        parse_iso_timestamp(value)
            .ok_or_else(|| PractitionerError::InvalidInput(format!("Invalid '{}' timestamp", name)))
    })
    .transpose()
}
