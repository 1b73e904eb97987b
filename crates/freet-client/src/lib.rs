//! Typed client for the Freets REST API, plus the self-clearing alert
//! queue the UI uses to surface failed requests.

pub mod alerts;
pub mod client;
pub mod error;

pub use alerts::{Alert, AlertKind, Alerts};
pub use client::{FreetsClient, UpvoteFilter};
pub use error::ClientError;
