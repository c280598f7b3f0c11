pub mod alarm;
pub mod api;
pub mod audio;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod render;
pub mod state;

pub use config::Config;
pub use error::{DashboardError, Result};
pub use poller::{Dashboard, PollSettings, Poller};
