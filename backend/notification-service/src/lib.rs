pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod realtime;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
pub use realtime::RealtimeHub;
pub use services::{NotificationDispatcher, SocialActivityService};
pub use state::AppState;
