//! # mediacat common library
//!
//! Catalog bootstrap shared by the mediacat binaries:
//! - Configuration loading
//! - MySQL connection provider and schema reconciliation
//! - Catalog store, natural-key resolver and bulk importer
//! - Startup orchestration

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod import;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{Error, Result};
