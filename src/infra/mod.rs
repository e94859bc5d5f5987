//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod remote;
pub mod session;
pub mod telemetry;
