//! HTTP server for the gatehouse auth and content API.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
