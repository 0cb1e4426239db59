use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::error::ReminderError;
use crate::models::ReminderJob;

const DEFAULT_KEY_PREFIX: &str = "reminder_queue";

/// Durable delayed-job queue for reminders.
#[async_trait]
pub trait ReminderQueue: Send + Sync {
    async fn schedule(&self, job: &ReminderJob) -> Result<(), ReminderError>;

    /// Removes and returns up to `limit` jobs due at or before `now`, earliest first.
    /// A job is handed to exactly one caller.
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReminderJob>, ReminderError>;

    async fn pending_count(&self) -> Result<usize, ReminderError>;
}

/// Job payloads live in a hash, job ids in a sorted set scored by fire time (epoch seconds).
pub struct RedisReminderQueue {
    pool: Pool,
    scheduled_key: String,
    jobs_key: String,
}

impl RedisReminderQueue {
    pub async fn new(config: &AppConfig) -> Result<Self, ReminderError> {
        let redis_url = config
            .redis_url
            .clone()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());
        Self::connect(&redis_url, DEFAULT_KEY_PREFIX).await
    }

    pub async fn connect(redis_url: &str, key_prefix: &str) -> Result<Self, ReminderError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ReminderError::PoolError(format!("Failed to create Redis pool: {}", e)))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| ReminderError::PoolError(format!("Failed to connect to Redis: {}", e)))?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis reminder queue initialized with prefix '{}'", key_prefix);

        Ok(Self {
            pool,
            scheduled_key: format!("{}:scheduled", key_prefix),
            jobs_key: format!("{}:jobs", key_prefix),
        })
    }

    async fn get_connection(&self) -> Result<Connection, ReminderError> {
        self.pool
            .get()
            .await
            .map_err(|e| ReminderError::PoolError(e.to_string()))
    }
}

#[async_trait]
impl ReminderQueue for RedisReminderQueue {
    async fn schedule(&self, job: &ReminderJob) -> Result<(), ReminderError> {
        let mut conn = self.get_connection().await?;
        let job_id = job.id.to_string();

        let _: () = conn.hset(&self.jobs_key, &job_id, serde_json::to_string(job)?).await?;
        let _: () = conn.zadd(&self.scheduled_key, &job_id, job.fire_at.timestamp()).await?;

        debug!("Reminder {} scheduled for {}", job.id, job.fire_at);
        Ok(())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReminderJob>, ReminderError> {
        let mut conn = self.get_connection().await?;

        let due: Vec<String> = conn
            .zrangebyscore_limit(&self.scheduled_key, "-inf", now.timestamp(), 0, limit as isize)
            .await?;

        let mut claimed = Vec::with_capacity(due.len());
        for job_id in due {
            // Whoever removes the id owns the job
            let removed: i64 = conn.zrem(&self.scheduled_key, &job_id).await?;
            if removed == 0 {
                continue;
            }

            let payload: Option<String> = conn.hget(&self.jobs_key, &job_id).await?;
            let _: () = conn.hdel(&self.jobs_key, &job_id).await?;

            match payload {
                Some(data) => claimed.push(serde_json::from_str(&data)?),
                None => debug!("Reminder {} had no payload, dropping", job_id),
            }
        }

        Ok(claimed)
    }

    async fn pending_count(&self) -> Result<usize, ReminderError> {
        let mut conn = self.get_connection().await?;
        let count: usize = conn.zcard(&self.scheduled_key).await?;
        Ok(count)
    }
}

/// Process-local queue for development and tests. Jobs do not survive a restart.
#[derive(Default)]
pub struct InMemoryReminderQueue {
    jobs: Mutex<Vec<ReminderJob>>,
}

impl InMemoryReminderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn scheduled(&self) -> Vec<ReminderJob> {
        self.jobs.lock().await.clone()
    }
}

#[async_trait]
impl ReminderQueue for InMemoryReminderQueue {
    async fn schedule(&self, job: &ReminderJob) -> Result<(), ReminderError> {
        self.jobs.lock().await.push(job.clone());
        Ok(())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReminderJob>, ReminderError> {
        let mut jobs = self.jobs.lock().await;
        jobs.sort_by_key(|job| job.fire_at);

        let due = jobs.iter().take_while(|job| job.fire_at <= now).count().min(limit);
        Ok(jobs.drain(..due).collect())
    }

    async fn pending_count(&self) -> Result<usize, ReminderError> {
        Ok(self.jobs.lock().await.len())
    }
}
