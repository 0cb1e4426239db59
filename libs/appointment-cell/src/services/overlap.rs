use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use practitioner_cell::TimeBlockRegistry;

use crate::models::AppointmentError;
use crate::services::store::AppointmentStore;

/// Half-open intervals `[s1, e1)` and `[s2, e2)` share an instant iff `s1 < e2 && s2 < e1`.
pub fn intervals_overlap(
    s1: DateTime<Utc>,
    e1: DateTime<Utc>,
    s2: DateTime<Utc>,
    e2: DateTime<Utc>,
) -> bool {
    s1 < e2 && s2 < e1
}

/// Decides whether a practitioner's timeline is free for a window. Reads appointments
/// and, when configured, time blocks; never writes.
pub struct OverlapChecker {
    appointments: Arc<dyn AppointmentStore>,
    blocks: Arc<TimeBlockRegistry>,
    blocks_affect_availability: bool,
}

impl OverlapChecker {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        blocks: Arc<TimeBlockRegistry>,
        blocks_affect_availability: bool,
    ) -> Self {
        Self {
            appointments,
            blocks,
            blocks_affect_availability,
        }
    }

    pub fn blocks_affect_availability(&self) -> bool {
        self.blocks_affect_availability
    }

    /// `exclude_appointment_id` lets a reschedule ignore the booking being moved.
    pub async fn is_free(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        if start >= end {
            return Err(AppointmentError::InvalidInput("Start time must be before end time".to_string()));
        }

        let clashing = self
            .appointments
            .find_overlapping_scheduled(practitioner_id, start, end, exclude_appointment_id)
            .await?;
        let clashing = clashing
            .iter()
            .filter(|a| intervals_overlap(start, end, a.start_time, a.end_time))
            .count();
        if clashing > 0 {
            debug!("{} scheduled appointments overlap {} - {}", clashing, start, end);
            return Ok(false);
        }

        if self.blocks_affect_availability {
            let blocked = self.blocks.overlapping(practitioner_id, start, end).await?;
            if blocked.iter().any(|b| intervals_overlap(start, end, b.start_time, b.end_time)) {
                debug!("Window {} - {} hits a time block", start, end);
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 15, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_partial_overlap() {
        assert!(intervals_overlap(at(10, 0), at(11, 0), at(10, 30), at(11, 30)));
        assert!(intervals_overlap(at(10, 30), at(11, 30), at(10, 0), at(11, 0)));
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        assert!(!intervals_overlap(at(10, 0), at(11, 0), at(11, 0), at(12, 0)));
        assert!(!intervals_overlap(at(11, 0), at(12, 0), at(10, 0), at(11, 0)));
    }

    #[test]
    fn test_containment_and_identity() {
        assert!(intervals_overlap(at(9, 0), at(12, 0), at(10, 0), at(10, 15)));
        assert!(intervals_overlap(at(10, 0), at(11, 0), at(10, 0), at(11, 0)));
        let start = at(10, 0);
        assert!(!intervals_overlap(start, start + Duration::hours(1), start - Duration::hours(2), start - Duration::hours(1)));
    }
}
