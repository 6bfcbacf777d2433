//! Terminal client for Google Tasks.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod google_api;
pub mod logging;
pub mod loopback;
pub mod tui;

#[cfg(test)]
mod testing;
