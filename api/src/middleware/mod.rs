//! Middleware for the API.

pub mod cors;

pub use cors::cors_layer;
