pub mod api;
pub mod auth;
pub mod collection;
pub mod config;
pub mod error;
pub mod facilities;
pub mod notify;
pub mod resolver;
pub mod schemas;
pub mod session;
pub mod views;

#[cfg(test)]
mod testing;
