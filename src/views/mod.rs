//! Headless controllers for each dashboard screen.
//!
//! A controller owns the screen's local state and its toast queue, and talks
//! to the API only through [`crate::api::ApiClient`].

pub mod dues;
pub mod hostels;
pub mod inventory;
pub mod managers;
pub mod reels;
pub mod rent;
pub mod visits;
pub mod wizard;
