pub mod ack;
pub mod dispatcher;
pub mod error;
pub mod incident;

pub use ack::{AckRouter, AckStatus, CallAck};
pub use dispatcher::{AcceptOutcome, EmergencyDispatcher};
pub use error::EmergencyError;
pub use incident::{Incident, IncidentState};
