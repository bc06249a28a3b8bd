//! # chatlink-core
//!
//! Core crate for chatlink. Contains the layered configuration schema and
//! the unified error system shared by the realtime client, the CLI, and the
//! listener binary.
//!
//! This crate has **no** internal dependencies on other chatlink crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
