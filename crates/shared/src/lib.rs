//! Shared types, errors, and configuration for Tally.
//!
//! This crate provides common types used across all other crates:
//! - Currency codes and base-currency conversion
//! - Typed IDs for type-safe entity references
//! - Pagination types for list operations
//! - Tenant context for data isolation
//! - Application-wide error types
//! - Configuration management and tracing bootstrap

pub mod config;
pub mod error;
pub mod telemetry;
pub mod tenant;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use tenant::{TenantContext, TenantContextError};
