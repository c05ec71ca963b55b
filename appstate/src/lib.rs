//! Application state for the try-on server.
//!
//! `AppState` owns the pipeline resources and implements
//! [`common::AppStateProvider`], so every transport drives the same backend.
//!
//! ```text
//! Transport Layer (api, native-messaging)
//!          ↓
//!     appstate (this crate)
//!          ↓
//! Infrastructure (pipeline, model-cache, artifacts, validation)
//! ```
//!
//! Requests run on Tokio's blocking pool. A semaphore sized by
//! `AppStateConfig::workers` bounds how many run at once.

pub mod state;

pub use state::{AppState, AppStateConfig, Backends, REQUEST_ID_LEN};
