pub mod contacts;
pub mod dispatcher;
pub mod repository;
pub mod templates;
pub mod transport;

pub use contacts::{ContactDirectory, InMemoryContactDirectory, SupabaseContactDirectory};
pub use dispatcher::NotificationDispatcher;
pub use repository::{
    InMemoryNotificationRepository, NotificationRepository, SupabaseNotificationRepository,
};
pub use transport::{transport_from_config, DeliveryTransport, HttpEmailTransport, TracingTransport};
