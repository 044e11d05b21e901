//! SIP gateway voice-call adapter.
//!
//! Places escalation calls through a SIP gateway's HTTP API. Callee
//! acknowledgements (answer, DTMF key, operator token) come back through
//! the gateway's status callback, which the control surface receives and
//! routes to the emergency dispatcher.

pub mod adapter;
pub mod config;
pub mod error;

pub use adapter::SipCallAdapter;
pub use config::SipConfig;
pub use error::SipError;
