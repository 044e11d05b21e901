pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod resolver;
pub mod schema;

pub use client::IntentClient;
pub use config::IntentClientConfig;
pub use error::IntentError;
pub use http::HttpIntentResolver;
pub use mock::{FailingIntentResolver, MockIntentResolver, SlowIntentResolver};
pub use resolver::{IntentRequest, IntentResolver};
pub use schema::parse_intent;
