mod apiservice;
mod blocker;
mod events;
mod inventory;
mod namespace;
mod remediation;
mod report;
mod webhook;

pub use apiservice::*;
pub use blocker::*;
pub use events::*;
pub use inventory::*;
pub use namespace::*;
pub use remediation::*;
pub use report::*;
pub use webhook::*;
