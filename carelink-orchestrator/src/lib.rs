pub mod budget;
pub mod orchestrator;
pub mod responses;

pub use budget::DeadlineBudget;
pub use orchestrator::Orchestrator;
pub use responses::Phrase;
