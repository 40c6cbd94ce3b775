pub mod analytics;
pub mod config;
pub mod delay;
pub mod departure;
pub mod error;
pub mod fetch;
pub mod infra;
pub mod ingest;
pub mod output;
pub mod parser;
pub mod poller;
pub mod services;
pub mod store;
