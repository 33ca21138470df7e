pub mod conflict;
pub mod pattern;
pub mod repository;
pub mod store;

pub use conflict::ConflictDetector;
pub use pattern::generate_candidates;
pub use repository::{InMemorySlotRepository, SlotRepository, SupabaseSlotRepository};
pub use store::SlotStore;
