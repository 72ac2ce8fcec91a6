//! Brave Search API (web vertical).
mod client;
pub mod types;

pub use client::{BRAVE_MAX_COUNT, BraveSearch};
