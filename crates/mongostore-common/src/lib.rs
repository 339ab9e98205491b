//! Common utilities for mongostore
//!
//! This crate provides the error type shared by the store library and the CLI.

pub mod error;

pub use error::{Result, StoreError};
