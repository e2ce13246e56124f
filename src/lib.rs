pub mod auth;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod session;
pub mod state;
