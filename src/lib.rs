pub mod clients;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod eventbus;
pub mod models;

pub use config::AppConfig;
pub use controller::Runner;
pub use error::{NsDoctorError, Result};
