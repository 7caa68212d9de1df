//! # Configuration Module
//!
//! This module provides run configuration and viewport profiles for page comparisons.

pub mod config;
pub mod viewport;

pub use config::{CompareConfig, normalize_url};
pub use viewport::{ViewportKind, ViewportProfile};
