use std::sync::Arc;

use tracing::{info, warn};

use appointment_cell::handlers::AppointmentState;
use appointment_cell::services::{
    AppointmentRepository, BookingCoordinator, InMemoryAppointmentRepository, LifecycleNotifier,
    SupabaseAppointmentRepository,
};
use maintenance_cell::handlers::MaintenanceState;
use maintenance_cell::services::{JobSettings, ScheduledJobRunner};
use notification_cell::handlers::NotificationState;
use notification_cell::services::{
    transport_from_config, ContactDirectory, InMemoryContactDirectory, InMemoryNotificationRepository,
    NotificationDispatcher, NotificationRepository, SupabaseContactDirectory, SupabaseNotificationRepository,
};
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_utils::access::{AccessPolicy, RoleBasedAccessPolicy};
use slot_cell::handlers::SlotState;
use slot_cell::services::{InMemorySlotRepository, SlotRepository, SlotStore, SupabaseSlotRepository};

/// Per-cell router state, all sharing one set of services.
#[derive(Clone)]
pub struct CellStates {
    pub slots: SlotState,
    pub appointments: AppointmentState,
    pub notifications: NotificationState,
    pub maintenance: MaintenanceState,
}

struct Repositories {
    slots: Arc<dyn SlotRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    notifications: Arc<dyn NotificationRepository>,
    contacts: Arc<dyn ContactDirectory>,
}

fn repositories(config: &AppConfig) -> Repositories {
    if config.is_database_configured() {
        info!("Using Supabase storage at {}", config.supabase_url);
        let client = Arc::new(SupabaseClient::new(config));
        Repositories {
            slots: Arc::new(SupabaseSlotRepository::new(client.clone())),
            appointments: Arc::new(SupabaseAppointmentRepository::new(client.clone())),
            notifications: Arc::new(SupabaseNotificationRepository::new(client.clone())),
            contacts: Arc::new(SupabaseContactDirectory::new(client)),
        }
    } else {
        warn!("Database not configured, state is kept in memory and lost on restart");
        Repositories {
            slots: Arc::new(InMemorySlotRepository::new()),
            appointments: Arc::new(InMemoryAppointmentRepository::new()),
            notifications: Arc::new(InMemoryNotificationRepository::new()),
            contacts: Arc::new(InMemoryContactDirectory::new()),
        }
    }
}

impl CellStates {
    pub fn from_config(config: &AppConfig) -> Self {
        let repos = repositories(config);
        let policy: Arc<dyn AccessPolicy> = Arc::new(RoleBasedAccessPolicy);

        let store = SlotStore::new(repos.slots);
        let dispatcher = NotificationDispatcher::new(repos.notifications, transport_from_config(config));
        let notifier = LifecycleNotifier::new(dispatcher.clone(), repos.contacts);
        let coordinator = Arc::new(BookingCoordinator::new(store.clone(), repos.appointments, notifier));
        let runner = ScheduledJobRunner::new(
            coordinator.clone(),
            store.clone(),
            dispatcher.clone(),
            JobSettings::from_config(config),
        );

        Self {
            slots: SlotState {
                store,
                policy: policy.clone(),
            },
            appointments: AppointmentState {
                coordinator,
                policy: policy.clone(),
            },
            notifications: NotificationState {
                dispatcher,
                policy: policy.clone(),
            },
            maintenance: MaintenanceState {
                runner: Arc::new(runner),
                policy,
            },
        }
    }
}
