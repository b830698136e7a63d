pub mod config;
pub mod registry;
pub mod scanner;

// Log pipeline
pub mod ingest;
pub mod interleaver;
pub mod log_buffer;
pub mod log_entry;
pub mod log_view;

// Service health and alerts
pub mod alerts;
pub mod health;
pub mod status;

// Project lifecycle classification
pub mod project_state;
