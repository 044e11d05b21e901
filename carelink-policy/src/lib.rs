pub mod doc;
pub mod error;
pub mod geo;
pub mod snapshot;
pub mod store;
pub mod testing;

pub use doc::PolicyDoc;
pub use error::PolicyError;
pub use geo::{Point, Zone, locate};
pub use snapshot::{
    CompiledPattern, ConcurrencyCaps, ConfirmPolicy, Deadlines, DeviceFence, EmergencyPolicy,
    GuardPolicy, LadderRung, PolicySnapshot, RateLimitParams, RetryParams, SosSet,
};
pub use store::PolicyStore;
