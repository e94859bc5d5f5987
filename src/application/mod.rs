//! Application services: document lookup, remote rendering and error mapping.

pub mod document;
pub mod error;
pub mod render;
