pub mod api;
pub mod builder;
pub mod config;

pub use api::{AppState, router};
pub use builder::{App, BuildError, build_app};
pub use config::DaemonConfig;
