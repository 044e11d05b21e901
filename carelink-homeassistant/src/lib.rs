//! Home-Assistant smart-home adapter for the Carelink dispatch layer.
//!
//! Implements [`SmartHomeAdapter`](carelink_adapter::SmartHomeAdapter)
//! against the Home Assistant REST API: each whitelisted device id maps to
//! an entity id and each action to a service call.

pub mod adapter;
pub mod config;
pub mod error;

pub use adapter::HomeAssistantAdapter;
pub use config::HomeAssistantConfig;
pub use error::HomeAssistantError;
