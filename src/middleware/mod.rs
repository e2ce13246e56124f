pub mod auth;
pub mod context;
pub mod credential_gate;
