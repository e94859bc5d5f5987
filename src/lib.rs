//! Markdown preview server backed by the GitHub Markdown API.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
