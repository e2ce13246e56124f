pub mod event;
pub mod tenant;

pub use event::{ImpersonationAction, ImpersonationEvent};
pub use tenant::Tenant;
