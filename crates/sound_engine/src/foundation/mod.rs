//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Fixed-capacity collections
//! - Logging utilities

pub mod collections;
pub mod logging;
