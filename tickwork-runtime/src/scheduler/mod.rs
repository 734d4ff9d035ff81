mod builder;
mod execution;
mod scheduler;
mod shutdown;

pub use builder::SchedulerBuilder;
pub use execution::ExecutionOutcome;
pub use scheduler::BackgroundScheduler;
