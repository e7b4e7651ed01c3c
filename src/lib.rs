// Shared infrastructure
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod telemetry;

// Domain layer
pub mod announcer;
pub mod queue;
pub mod store;

// Application layer
pub mod api;
pub mod server;
