pub mod cli;
pub mod config;
pub mod database;
pub mod filters;
pub mod integrations;
pub mod logging;
pub mod models;
pub mod ordering;
pub mod review;
pub mod service;
pub mod standup;
pub mod state;
pub mod tui;
pub mod utils;
pub mod writer;

pub use config::Config;
pub use database::Database;
pub use models::{Project, StateSnapshot, Tag, Task};
pub use state::AppState;
pub use utils::Profile;
