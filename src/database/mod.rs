pub mod manager;
pub mod models;
pub mod registry;
pub mod scoped;
pub mod unscoped;

pub use scoped::ScopedDb;
pub use unscoped::UnscopedDb;
