//! Shared utilities for the cloud saver.

pub mod error;
