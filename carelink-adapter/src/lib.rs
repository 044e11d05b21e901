pub mod error;
pub mod executor;
pub mod recording;
pub mod registry;
pub mod retry;
pub mod traits;

pub use error::AdapterError;
pub use executor::JobExecutor;
pub use recording::RecordingAdapters;
pub use registry::AdapterRegistry;
pub use retry::Backoff;
pub use traits::{
    CallAdapter, CallPlacement, NotifyAdapter, SmartHomeAdapter, TtsAdapter, VideoAdapter,
    VideoCapabilities,
};
