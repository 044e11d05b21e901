pub mod context;
pub mod manager;

pub use context::{ConsentFlags, PendingConfirm, SessionContext, SessionView};
pub use manager::SessionManager;
