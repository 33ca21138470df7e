pub mod jobs;

pub use jobs::{JobSettings, ScheduledJobRunner};
