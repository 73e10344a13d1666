mod batch;
mod locks;
mod orchestrator;
mod scheduler;

#[cfg(test)]
pub(crate) mod fixtures;

pub use batch::BatchController;
pub use orchestrator::{Orchestrator, RunSettings};
pub use scheduler::{ScheduleSettings, Scheduler, SchedulerHandle};
