//! Data Transfer Objects
//!
//! Request and response structures for the API.

pub mod anomaly;
pub mod copilot;

pub use anomaly::*;
pub use copilot::*;
