use std::collections::HashMap;
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::{
    DisabledEmailSender, EmailSender, HttpEmailSender, InMemoryNotificationStore, NotificationService,
    RealtimeHub,
};
use reminder_cell::*;
use shared_database::InMemoryUserDirectory;
use shared_models::auth::Role;
use shared_models::directory::UserRecord;

#[derive(Default)]
struct StatusProbe {
    scheduled: RwLock<HashMap<Uuid, bool>>,
}

impl StatusProbe {
    async fn set(&self, appointment_id: Uuid, scheduled: bool) {
        self.scheduled.write().await.insert(appointment_id, scheduled);
    }
}

#[async_trait]
impl AppointmentProbe for StatusProbe {
    async fn is_scheduled(&self, appointment_id: Uuid) -> Result<bool, ReminderError> {
        Ok(self.scheduled.read().await.get(&appointment_id).copied().unwrap_or(false))
    }
}

struct Fixture {
    scheduler: ReminderScheduler,
    worker: ReminderWorker,
    queue: Arc<InMemoryReminderQueue>,
    probe: Arc<StatusProbe>,
    hub: RealtimeHub,
    inbox: Arc<InMemoryNotificationStore>,
    patient: UserRecord,
}

fn fixture(email: Arc<dyn EmailSender>) -> Fixture {
    let patient = UserRecord::new("Asha", "asha@example.com", Role::Patient);
    let directory = Arc::new(InMemoryUserDirectory::with_users(vec![patient.clone()]));
    let queue = Arc::new(InMemoryReminderQueue::new());
    let probe = Arc::new(StatusProbe::default());
    let inbox = Arc::new(InMemoryNotificationStore::new());
    let hub = RealtimeHub::new();
    let notifications = NotificationService::new(inbox.clone(), hub.clone());

    Fixture {
        scheduler: ReminderScheduler::new(queue.clone(), Duration::hours(2)),
        worker: ReminderWorker::new(
            ReminderWorkerConfig::default(),
            queue.clone(),
            probe.clone(),
            directory,
            notifications,
            email,
        ),
        queue,
        probe,
        hub,
        inbox,
        patient,
    }
}

#[tokio::test]
async fn test_due_reminder_is_persisted_and_pushed() {
    let f = fixture(Arc::new(DisabledEmailSender));
    let now = Utc::now();
    let appointment_id = Uuid::new_v4();
    let start = now + Duration::hours(3);
    f.probe.set(appointment_id, true).await;
    let job = f.scheduler.arm(appointment_id, f.patient.id, start, now).await.unwrap().unwrap();
    let _socket = f.hub.subscribe(f.patient.id).await;

    // Not yet due
    assert_eq!(f.worker.run_due(now).await.unwrap(), 0);

    let outcome = f.worker.process(&job).await.unwrap();
    assert_eq!(outcome, ReminderOutcome::Delivered { persisted: true, pushed: true, emailed: true });

    let inbox = f.inbox.all().await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].title, "Reminder");
    assert_eq!(
        inbox[0].message,
        format!("Reminder: please fast 2 hours before your session at {}", start.to_rfc3339())
    );
}

#[tokio::test]
async fn test_run_due_claims_each_job_once() {
    let f = fixture(Arc::new(DisabledEmailSender));
    let now = Utc::now();
    let appointment_id = Uuid::new_v4();
    f.probe.set(appointment_id, true).await;
    f.scheduler
        .arm(appointment_id, f.patient.id, now + Duration::hours(3), now)
        .await
        .unwrap();

    let fire_time = now + Duration::hours(1) + Duration::seconds(1);
    assert_eq!(f.worker.run_due(fire_time).await.unwrap(), 1);
    assert_eq!(f.worker.run_due(fire_time).await.unwrap(), 0);
    assert_eq!(f.queue.pending_count().await.unwrap(), 0);
    assert_eq!(f.inbox.all().await.len(), 1);
}

#[tokio::test]
async fn test_cancelled_appointment_is_not_reminded() {
    let f = fixture(Arc::new(DisabledEmailSender));
    let now = Utc::now();
    let appointment_id = Uuid::new_v4();
    f.probe.set(appointment_id, false).await;
    let job = f
        .scheduler
        .arm(appointment_id, f.patient.id, now + Duration::hours(3), now)
        .await
        .unwrap()
        .unwrap();

    assert_matches!(f.worker.process(&job).await, Ok(ReminderOutcome::AppointmentInactive));
    assert!(f.inbox.all().await.is_empty());
}

#[tokio::test]
async fn test_missing_patient_is_skipped() {
    let f = fixture(Arc::new(DisabledEmailSender));
    let now = Utc::now();
    let appointment_id = Uuid::new_v4();
    f.probe.set(appointment_id, true).await;
    let job = ReminderJob::new(appointment_id, Uuid::new_v4(), now + Duration::hours(2), now);

    assert_matches!(f.worker.process(&job).await, Ok(ReminderOutcome::PatientMissing));
    assert!(f.inbox.all().await.is_empty());
}

#[tokio::test]
async fn test_email_failure_does_not_fail_reminder() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let f = fixture(Arc::new(HttpEmailSender::new(&mock_server.uri(), "key", "clinic@example.com")));
    let now = Utc::now();
    let appointment_id = Uuid::new_v4();
    f.probe.set(appointment_id, true).await;
    let job = ReminderJob::new(appointment_id, f.patient.id, now + Duration::hours(2), now);

    let outcome = f.worker.process(&job).await.unwrap();
    assert_eq!(outcome, ReminderOutcome::Delivered { persisted: true, pushed: false, emailed: false });
    assert_eq!(f.inbox.all().await.len(), 1);
}

#[tokio::test]
async fn test_shutdown_stops_loop() {
    let f = fixture(Arc::new(DisabledEmailSender));
    let worker = Arc::new(f.worker);

    worker.shutdown().await;
    tokio::time::timeout(std::time::Duration::from_secs(1), worker.start())
        .await
        .expect("worker should exit after shutdown");
}
