//! VisionCore Gateway Library
//!
//! This library exports the core modules used by the server binary and the
//! integration test suite.

pub mod capabilities;
pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod imaging;
pub mod models;
pub mod ops;
pub mod routes;
pub mod security;
pub mod services;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::AppSettings;
pub use error::ApiError;
