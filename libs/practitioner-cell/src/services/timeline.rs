use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

/// One async mutex per practitioner timeline. Anything that validates and then writes
/// appointments or time blocks of a practitioner holds that practitioner's guard for the
/// whole read-validate-write sequence.
#[derive(Clone, Default)]
pub struct TimelineLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

/// Released on drop.
pub struct TimelineGuard {
    practitioner_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl TimelineGuard {
    pub fn practitioner_id(&self) -> Uuid {
        self.practitioner_id
    }
}

impl TimelineLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, practitioner_id: Uuid) -> TimelineGuard {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(practitioner_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let guard = lock.lock_owned().await;
        debug!("Acquired timeline lock for practitioner {}", practitioner_id);

        TimelineGuard {
            practitioner_id,
            _guard: guard,
        }
    }

    pub async fn tracked_timelines(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn test_same_practitioner_is_serialized() {
        let locks = TimelineLocks::new();
        let practitioner_id = Uuid::new_v4();
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(practitioner_id).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.tracked_timelines().await, 1);
    }

    #[tokio::test]
    async fn test_different_practitioners_do_not_block() {
        let locks = TimelineLocks::new();
        let first = locks.acquire(Uuid::new_v4()).await;

        let second = timeout(Duration::from_millis(100), locks.acquire(Uuid::new_v4())).await;
        assert!(second.is_ok());
        drop(first);
    }
}
