mod scheduler;

pub use scheduler::{CronScheduler, CronSettings};
