pub mod booking;
pub mod lifecycle;
pub mod notifier;
pub mod repository;

pub use booking::{BookingCoordinator, ReminderOutcome};
pub use lifecycle::AppointmentStateMachine;
pub use notifier::LifecycleNotifier;
pub use repository::{
    AppointmentRepository, InMemoryAppointmentRepository, SupabaseAppointmentRepository,
};
