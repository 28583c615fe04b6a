pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;

// Layered boundaries for application ports and infrastructure adapters
pub mod app;
pub mod infra;

// Domain data shapes shared across layers
pub mod domain;
