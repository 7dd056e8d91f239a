mod collector;
mod diagnosis;
pub mod evaluator;
mod executor;
pub mod scope;
pub mod sequencer;

pub use collector::Collector;
pub use diagnosis::Diagnoser;
pub use executor::{ConfirmStep, Executor};
pub use scope::Scope;
pub use sequencer::MergedPlan;
