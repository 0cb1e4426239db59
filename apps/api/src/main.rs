use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{
    AppointmentBookingService, AppointmentState, AppointmentStore, InMemoryAppointmentStore,
    OverlapChecker, StoreAppointmentProbe, SupabaseAppointmentStore,
};
use notification_cell::{
    DisabledEmailSender, EmailSender, HttpEmailSender, InMemoryNotificationStore, NotificationService,
    NotificationState, NotificationStore, RealtimeHub, SupabaseNotificationStore,
};
use practitioner_cell::{
    AssignmentService, AssignmentStore, InMemoryAssignmentStore, InMemoryTimeBlockStore, PractitionerState,
    SupabaseAssignmentStore, SupabaseTimeBlockStore, TimeBlockRegistry, TimeBlockStore, TimelineLocks,
};
use reminder_cell::{
    InMemoryReminderQueue, RedisReminderQueue, ReminderQueue, ReminderScheduler, ReminderWorker,
    ReminderWorkerConfig,
};
use shared_config::AppConfig;
use shared_database::{
    InMemoryTherapyCatalog, InMemoryUserDirectory, SupabaseClient, SupabaseTherapyCatalog,
    SupabaseUserDirectory, TherapyCatalog, UserDirectory,
};

struct Stores {
    directory: Arc<dyn UserDirectory>,
    therapies: Arc<dyn TherapyCatalog>,
    appointments: Arc<dyn AppointmentStore>,
    blocks: Arc<dyn TimeBlockStore>,
    assignments: Arc<dyn AssignmentStore>,
    notifications: Arc<dyn NotificationStore>,
}

fn build_stores(config: &AppConfig) -> Stores {
    if config.is_supabase_store_configured() {
        info!("Using Supabase-backed stores at {}", config.supabase_url);
        let supabase = Arc::new(SupabaseClient::new(config));
        Stores {
            directory: Arc::new(SupabaseUserDirectory::new(supabase.clone())),
            therapies: Arc::new(SupabaseTherapyCatalog::new(supabase.clone())),
            appointments: Arc::new(SupabaseAppointmentStore::new(supabase.clone())),
            blocks: Arc::new(SupabaseTimeBlockStore::new(supabase.clone())),
            assignments: Arc::new(SupabaseAssignmentStore::new(supabase.clone())),
            notifications: Arc::new(SupabaseNotificationStore::new(supabase)),
        }
    } else {
        warn!("Supabase not configured, using in-memory stores");
        Stores {
            directory: Arc::new(InMemoryUserDirectory::new()),
            therapies: Arc::new(InMemoryTherapyCatalog::with_therapies(Vec::new())),
            appointments: Arc::new(InMemoryAppointmentStore::new()),
            blocks: Arc::new(InMemoryTimeBlockStore::new()),
            assignments: Arc::new(InMemoryAssignmentStore::new()),
            notifications: Arc::new(InMemoryNotificationStore::new()),
        }
    }
}

async fn build_queue(config: &AppConfig) -> anyhow::Result<Arc<dyn ReminderQueue>> {
    match config.redis_url {
        Some(_) => {
            let queue = RedisReminderQueue::new(config)
                .await
                .context("Failed to initialize Redis reminder queue")?;
            Ok(Arc::new(queue))
        }
        None => Ok(Arc::new(InMemoryReminderQueue::new())),
    }
}

fn build_email_sender(config: &AppConfig) -> Arc<dyn EmailSender> {
    match HttpEmailSender::from_config(config) {
        Some(sender) => Arc::new(sender),
        None => Arc::new(DisabledEmailSender),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Amae Clinic scheduling API server");

    let config = Arc::new(AppConfig::from_env());
    let stores = build_stores(&config);
    let queue = build_queue(&config).await?;

    let locks = TimelineLocks::new();
    let notifications = NotificationService::new(stores.notifications.clone(), RealtimeHub::new());
    let blocks = Arc::new(TimeBlockRegistry::new(stores.blocks.clone(), stores.directory.clone(), locks.clone()));

    if !config.blocks_affect_availability {
        warn!("Time blocks do not affect availability; blocked slots remain bookable");
    }

    let booking = AppointmentBookingService::new(
        stores.appointments.clone(),
        stores.directory.clone(),
        stores.therapies.clone(),
        OverlapChecker::new(stores.appointments.clone(), blocks.clone(), config.blocks_affect_availability),
        locks,
        notifications.clone(),
        ReminderScheduler::from_config(queue.clone(), &config),
    );

    let worker = Arc::new(ReminderWorker::new(
        ReminderWorkerConfig {
            poll_interval_secs: config.reminder_poll_interval_secs,
            ..ReminderWorkerConfig::default()
        },
        queue,
        Arc::new(StoreAppointmentProbe::new(stores.appointments.clone())),
        stores.directory.clone(),
        notifications.clone(),
        build_email_sender(&config),
    ));
    let worker_task = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.start().await })
    };

    let states = router::CellStates {
        appointments: Arc::new(AppointmentState {
            config: config.clone(),
            booking: Arc::new(booking),
        }),
        practitioners: Arc::new(PractitionerState {
            config: config.clone(),
            blocks,
            assignments: AssignmentService::new(stores.assignments, stores.directory, notifications.clone()),
        }),
        notifications: Arc::new(NotificationState {
            config: config.clone(),
            notifications,
        }),
    };

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(states)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    worker.shutdown().await;
    let _ = worker_task.await;

    Ok(())
}
